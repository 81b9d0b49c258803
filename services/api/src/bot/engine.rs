//! services/api/src/bot/engine.rs
//!
//! The entry point for every inbound chat message. Looks up the sender's
//! session, dispatches to the matching flow handler, and otherwise routes
//! the message through the intent keywords and the free-form composer.

use crate::bot::{composer, flow, replies};
use crate::web::state::AppState;
use study_shelf_core::domain::{ComposerReply, FlowDirective};
use study_shelf_core::ports::{ChatChannel, PortResult};
use tracing::{error, info, warn};

/// Handles one inbound message from `external_id`.
///
/// A failure inside a flow step clears the session and apologizes to the
/// user; the flow never retains a state it cannot resume. Errors from the
/// user store itself (we cannot even register the sender) propagate to the
/// transport.
pub async fn handle_message(
    state: &AppState,
    channel: &dyn ChatChannel,
    external_id: i64,
    name: &str,
    text: &str,
) -> PortResult<()> {
    // Creates the record on first contact and refreshes last-active.
    state.users.get_or_create(external_id, name).await?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let lower = trimmed.to_lowercase();

    // An active session routes straight to its step handler.
    if let Some(session) = state.sessions.get(external_id) {
        if lower == "cancel" || lower == "/cancel" {
            state.sessions.clear(external_id);
            return channel.send_text(replies::cancelled()).await;
        }
        if let Err(e) = flow::handle_step(state, channel, session, trimmed).await {
            error!(
                "Purchase flow step failed for user {}: {:?}; clearing session",
                external_id, e
            );
            state.sessions.clear(external_id);
            if let Err(send_err) = channel.send_text(replies::retry_apology()).await {
                warn!("Failed to send retry apology to user {}: {:?}", external_id, send_err);
            }
        }
        return Ok(());
    }

    // No session: resume, purchase intent, practice, then free-form.
    if lower == "resume" || lower == "/resume" {
        channel.send_text(replies::nothing_to_resume()).await?;
        return start_browse(state, channel, external_id).await;
    }

    if is_purchase_intent(&lower) {
        if lower == "/start" {
            channel.send_text(&replies::greeting(name)).await?;
        }
        return start_browse(state, channel, external_id).await;
    }

    if is_practice_intent(&lower) {
        let question = composer::practice_question(state.textgen.as_deref()).await;
        return channel.send_text(&question).await;
    }

    match composer::compose_reply(state.textgen.as_deref(), name, trimmed).await {
        ComposerReply::Directive(FlowDirective::StartBrowse) => {
            info!("Composer directed user {} into the browse flow", external_id);
            start_browse(state, channel, external_id).await
        }
        ComposerReply::Directive(FlowDirective::StartPractice) => {
            let question = composer::practice_question(state.textgen.as_deref()).await;
            channel.send_text(&question).await
        }
        ComposerReply::PlainText(reply) => channel.send_text(&reply).await,
    }
}

/// Opens a fresh session at category selection and shows the menu.
async fn start_browse(
    state: &AppState,
    channel: &dyn ChatChannel,
    external_id: i64,
) -> PortResult<()> {
    state.sessions.begin(external_id);
    channel.send_text(&replies::category_menu()).await
}

fn is_purchase_intent(lower: &str) -> bool {
    matches!(lower, "/start" | "/browse" | "/buy")
        || lower.contains("buy")
        || lower.contains("browse")
        || lower.contains("material")
        || lower.contains("catalog")
        || lower.contains("download")
}

fn is_practice_intent(lower: &str) -> bool {
    lower == "/practice"
        || lower.contains("practice")
        || lower.contains("quiz")
        || lower.contains("question")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_intent_keywords() {
        assert!(is_purchase_intent("/start"));
        assert!(is_purchase_intent("i want to buy a guide"));
        assert!(is_purchase_intent("show me your materials"));
        assert!(!is_purchase_intent("what is pharmacology"));
    }

    #[test]
    fn practice_intent_keywords() {
        assert!(is_practice_intent("/practice"));
        assert!(is_practice_intent("give me a quiz"));
        assert!(is_practice_intent("ask me a question"));
        assert!(!is_practice_intent("hello there"));
    }
}
