//! services/api/src/bot/replies.rs
//!
//! The scripted reply texts for every step of the storefront conversation.
//! Everything the bot says without consulting the completion API comes from
//! here, so the deterministic fallback surface is visible in one place.

use study_shelf_core::domain::{CatalogItem, Category};

pub fn greeting(name: &str) -> String {
    format!(
        "Hi {name}! I can help you find study materials for your NCLEX prep.\n\
         Browse the catalog below, or just tell me what you're looking for.",
    )
}

/// The numbered category menu. Codes are 1-based and follow the fixed
/// category order.
pub fn category_menu() -> String {
    let mut text = String::from("Which area would you like to study?\n");
    for category in Category::ALL {
        text.push_str(&format!("  {}. {}\n", category.code(), category.label()));
    }
    text.push_str("\nReply with a number or a category name. Type \"cancel\" to stop.");
    text
}

pub fn category_reprompt() -> String {
    format!(
        "Sorry, I didn't catch that category.\n\n{}",
        category_menu()
    )
}

pub fn no_materials(category: Category) -> String {
    format!(
        "I don't have any materials for {} right now. Try another category:\n\n{}",
        category.label(),
        category_menu()
    )
}

/// The numbered candidate list shown at material selection.
pub fn material_list(candidates: &[CatalogItem]) -> String {
    let mut text = String::from("Here's what I found:\n");
    for (i, item) in candidates.iter().enumerate() {
        text.push_str(&format!("  {}. {} — {}\n", i + 1, item.title, item.price));
    }
    text.push_str("\nReply with the number of the one you want, or \"back\" for categories.");
    text
}

pub fn material_reprompt(len: usize) -> String {
    format!(
        "Please pick a number between 1 and {len}, or type \"back\" to see the categories again."
    )
}

pub fn confirmation(item: &CatalogItem, code: &str) -> String {
    format!(
        "You picked: {}\nPrice: {}\nOrder code: {}\n\n\
         Type \"download\" to receive the file, or \"back\" to choose something else.",
        item.title, item.price, code
    )
}

pub fn confirmation_reprompt() -> &'static str {
    "Just type \"download\" to get your file, or \"back\" to pick a different one."
}

pub fn delivery_caption(item: &CatalogItem) -> String {
    format!("{} ({}) — happy studying!", item.title, item.price)
}

pub fn downloading_in_progress() -> &'static str {
    "Hang tight, your file is on its way."
}

pub fn retry_apology() -> &'static str {
    "Sorry, something went wrong on my side. Please try again in a moment."
}

pub fn file_missing() -> &'static str {
    "Sorry, that file seems to be missing from our shelf. Please pick another material."
}

pub fn too_large() -> &'static str {
    "That file is too large to send over chat. Please contact support and we'll \
     get it to you another way."
}

pub fn cancelled() -> &'static str {
    "No problem, I've cancelled that. Type \"browse\" whenever you want to look again."
}

pub fn nothing_to_resume() -> &'static str {
    "You don't have an order in progress, so let's start fresh."
}

pub fn free_form_fallback() -> &'static str {
    "I'm best at helping you find study materials. Type \"browse\" to see the catalog, \
     or \"practice\" for a practice question."
}

/// Served when the completion API cannot produce a practice question.
pub fn practice_fallback() -> &'static str {
    "Practice question: A client is prescribed digoxin. Which finding should the nurse \
     report before administering the dose?\n\
     A. Heart rate 52/min\n\
     B. Blood pressure 128/76\n\
     C. Respiratory rate 16/min\n\
     D. Temperature 37.1 C\n\n\
     (Answer: A — bradycardia is a reason to hold digoxin and notify the provider.)"
}
