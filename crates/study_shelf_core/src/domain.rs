//! crates/study_shelf_core/src/domain.rs
//!
//! Defines the pure, core data structures for the storefront.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Categories
//=========================================================================================

/// The fixed set of study domains a catalog item belongs to.
///
/// The numeric codes shown to chat users are 1-based and follow declaration
/// order, so `"3"` always selects `PsychosocialIntegrity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SafeEffectiveCare,
    HealthPromotion,
    PsychosocialIntegrity,
    PhysiologicalIntegrity,
}

/// Error returned when a string does not name a known category.
#[derive(Debug, thiserror::Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 4] = [
        Category::SafeEffectiveCare,
        Category::HealthPromotion,
        Category::PsychosocialIntegrity,
        Category::PhysiologicalIntegrity,
    ];

    /// The human-readable name shown in menus and stored in the database.
    pub fn label(&self) -> &'static str {
        match self {
            Category::SafeEffectiveCare => "Safe & Effective Care Environment",
            Category::HealthPromotion => "Health Promotion & Maintenance",
            Category::PsychosocialIntegrity => "Psychosocial Integrity",
            Category::PhysiologicalIntegrity => "Physiological Integrity",
        }
    }

    /// The 1-based menu code for this category.
    pub fn code(&self) -> u8 {
        Category::ALL
            .iter()
            .position(|c| c == self)
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }

    pub fn from_code(code: u8) -> Option<Category> {
        if code == 0 {
            return None;
        }
        Category::ALL.get(code as usize - 1).copied()
    }

    /// Matches free-text chat input against the category menu.
    ///
    /// Accepts a numeric menu code, or a case-insensitive fuzzy match against
    /// the first ~20 characters or the first word of a category name.
    pub fn match_input(input: &str) -> Option<Category> {
        let trimmed = input.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Category::from_code(code);
        }
        let needle = trimmed.to_lowercase();
        if needle.len() < 3 {
            return None;
        }
        Category::ALL.iter().copied().find(|c| {
            let label = c.label().to_lowercase();
            let head: String = label.chars().take(20).collect();
            let first_word = label.split_whitespace().next().unwrap_or_default();
            head.contains(&needle) || needle.contains(first_word)
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = UnknownCategory;

    /// Parses the exact label (case-insensitive) or a numeric code.
    /// Used by the admin API to validate upload/edit metadata.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Category::from_code(code).ok_or_else(|| UnknownCategory(s.to_string()));
        }
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

//=========================================================================================
// Prices
//=========================================================================================

/// A catalog item's price: the literal "Free" or a non-negative decimal
/// kept in its original string form for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Price {
    Free,
    Paid(String),
}

/// Error returned when a price string is neither "Free" nor a non-negative decimal.
#[derive(Debug, thiserror::Error)]
#[error("Invalid price: {0}")]
pub struct InvalidPrice(pub String);

impl Price {
    pub fn parse(raw: &str) -> Result<Price, InvalidPrice> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("free") {
            return Ok(Price::Free);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(Price::Paid(trimmed.to_string())),
            _ => Err(InvalidPrice(raw.to_string())),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Price::Free)
    }

    /// The numeric amount of a paid price. `None` for free items or when the
    /// stored string no longer parses (revenue is then skipped at delivery).
    pub fn amount(&self) -> Option<f64> {
        match self {
            Price::Free => None,
            Price::Paid(s) => s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Free => f.write_str("Free"),
            Price::Paid(s) => f.write_str(s),
        }
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

/// A purchasable document's metadata record.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub id: Uuid,
    pub title: String,
    pub topics: Vec<String>,
    pub category: Category,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub price: Price,
    /// Opaque reference into the binary content store. Required.
    pub content_ref: Uuid,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub mime_type: String,
    pub downloads: i64,
    pub purchases: i64,
    pub revenue: f64,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a catalog record. The binary content must be
/// written first so `content_ref` points at a stored file.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub title: String,
    pub topics: Vec<String>,
    pub category: Category,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub price: Price,
    pub content_ref: Uuid,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub mime_type: String,
}

/// Administrative edit. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CatalogPatch {
    pub title: Option<String>,
    pub topics: Option<Vec<String>>,
    pub category: Option<Category>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub price: Option<Price>,
}

/// Listing filter for the admin catalog endpoint.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub topic: Option<String>,
    pub category: Option<Category>,
    pub search: Option<String>,
}

/// Metadata of a file held by the binary content store.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

//=========================================================================================
// Users
//=========================================================================================

/// One record per chat-platform identity.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    /// The chat platform's stable numeric identifier for this person. Unique.
    pub external_id: i64,
    pub name: String,
    pub level: Option<String>,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Append-only download log. Populated on single-user fetches; empty in
    /// bulk listings.
    pub download_history: Vec<DownloadEntry>,
}

/// One entry in a user's download history.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub content_id: Uuid,
    pub title: String,
    pub category: Category,
    pub price: Price,
    pub downloaded_at: DateTime<Utc>,
}

//=========================================================================================
// Search and composer results
//=========================================================================================

/// A catalog item annotated with its relevance to a query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub item: CatalogItem,
    pub relevance_score: i64,
    pub matched_tokens: Vec<String>,
}

/// A structured next step the composer can hand back to the engine instead
/// of plain reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirective {
    /// Start the category-driven browse flow for this user.
    StartBrowse,
    /// Send the user a practice question.
    StartPractice,
}

/// What the response composer produced for a free-form message: either a
/// directive the engine acts on, or text to send as-is.
#[derive(Debug, Clone)]
pub enum ComposerReply {
    Directive(FlowDirective),
    PlainText(String),
}

//=========================================================================================
// Analytics
//=========================================================================================

/// Inclusive time window for trend queries. Open ends mean "no bound".
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CatalogSummary {
    pub total_materials: i64,
    pub free_materials: i64,
    pub paid_materials: i64,
    pub total_downloads: i64,
    pub total_purchases: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone)]
pub struct TopicTrend {
    pub topic: String,
    pub materials: i64,
    pub downloads: i64,
}

#[derive(Debug, Clone)]
pub struct CategoryTrend {
    pub category: Category,
    pub materials: i64,
    pub downloads: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone)]
pub struct UserStats {
    pub total_users: i64,
    pub active_last_week: i64,
    pub total_downloads: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_are_one_based_and_ordered() {
        assert_eq!(Category::from_code(1), Some(Category::SafeEffectiveCare));
        assert_eq!(Category::from_code(3), Some(Category::PsychosocialIntegrity));
        assert_eq!(Category::from_code(4), Some(Category::PhysiologicalIntegrity));
        assert_eq!(Category::from_code(0), None);
        assert_eq!(Category::from_code(5), None);
        assert_eq!(Category::PsychosocialIntegrity.code(), 3);
    }

    #[test]
    fn category_matches_numeric_menu_input() {
        assert_eq!(Category::match_input("3"), Some(Category::PsychosocialIntegrity));
        assert_eq!(Category::match_input(" 1 "), Some(Category::SafeEffectiveCare));
        assert_eq!(Category::match_input("9"), None);
    }

    #[test]
    fn category_matches_fuzzy_text_input() {
        assert_eq!(
            Category::match_input("psychosocial"),
            Some(Category::PsychosocialIntegrity)
        );
        assert_eq!(
            Category::match_input("Health Promotion"),
            Some(Category::HealthPromotion)
        );
        // Matches the first word of the label even with trailing chatter.
        assert_eq!(
            Category::match_input("physiological stuff please"),
            Some(Category::PhysiologicalIntegrity)
        );
        assert_eq!(Category::match_input("astrophysics"), None);
        assert_eq!(Category::match_input("ps"), None);
    }

    #[test]
    fn price_parses_free_and_decimals() {
        assert_eq!(Price::parse("Free").unwrap(), Price::Free);
        assert_eq!(Price::parse("FREE").unwrap(), Price::Free);
        let p = Price::parse("19.99").unwrap();
        assert_eq!(p, Price::Paid("19.99".to_string()));
        assert_eq!(p.amount(), Some(19.99));
        assert_eq!(p.to_string(), "19.99");
        assert!(Price::parse("-1").is_err());
        assert!(Price::parse("ten dollars").is_err());
        assert!(Price::parse("NaN").is_err());
    }

    #[test]
    fn free_price_has_no_amount() {
        assert!(Price::Free.amount().is_none());
        assert!(Price::Free.is_free());
        assert_eq!(Price::Free.to_string(), "Free");
    }
}
