//! crates/study_shelf_core/src/search.rs
//!
//! Relevance search over the catalog: free-text tokenization, a per-category
//! keyword-phrase table, field-weighted scoring, and the search entry point
//! that all frontends (chat flow, admin API) delegate to.
//!
//! The algorithm operates entirely through the [`CatalogStore`] trait, with
//! no database dependency. The weights are data-driven so the scoring policy
//! is testable in isolation.

use crate::domain::{CatalogItem, Category, SearchHit};
use crate::ports::{CatalogStore, PortResult};

//=========================================================================================
// Scoring policy
//=========================================================================================

/// Field weights for relevance scoring.
///
/// The defaults are the canonical policy; construct a custom table only in
/// tests or experiments.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Added once when the item's category equals the requested category.
    pub category_filter: i64,
    /// Per token found in the title.
    pub title: i64,
    /// Per token found in the category label.
    pub category: i64,
    /// Per token, multiplied by the number of topic entries it appears in.
    pub topic: i64,
    /// Per token found in the keyword set.
    pub keyword: i64,
    /// Per token found in the description.
    pub description: i64,
    /// Combination bonus applied per field hit once more than one distinct
    /// token matched.
    pub combo_per_match: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            category_filter: 8,
            title: 5,
            category: 6,
            topic: 4,
            keyword: 4,
            description: 2,
            combo_per_match: 2,
        }
    }
}

//=========================================================================================
// Tokenization
//=========================================================================================

/// Generic English stop words plus storefront terms that carry no signal
/// ("exam", "material", "study" and friends). Tokens of length <= 2 are
/// dropped before this list is consulted.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "nor", "but", "with", "about", "from", "into", "onto", "over",
    "under", "this", "that", "these", "those", "there", "here", "what", "which", "who",
    "whom", "how", "when", "where", "why", "not", "yes", "any", "some", "all", "are",
    "was", "were", "been", "being", "have", "has", "had", "does", "did", "can", "could",
    "will", "would", "should", "may", "might", "must", "you", "your", "yours", "mine",
    "our", "ours", "its", "please", "need", "want", "give", "get", "send", "show",
    "looking", "find", "me", "hello", "thanks", "thank",
    // Storefront terms every query contains and no title is distinguished by.
    "exam", "exams", "material", "materials", "study", "studying", "nclex", "test",
    "tests", "question", "questions", "prep", "practice", "help", "guide", "guides",
];

/// Keyword phrases tested against the raw query when a category is supplied.
/// A matched phrase is queued ahead of the generic words and suppresses any
/// generic word it overlaps with, so the same term is never counted twice.
pub fn category_phrases(category: Category) -> &'static [&'static str] {
    match category {
        Category::SafeEffectiveCare => &[
            "infection control",
            "delegation",
            "prioritization",
            "triage",
            "care coordination",
            "safety",
        ],
        Category::HealthPromotion => &[
            "growth and development",
            "maternity",
            "newborn",
            "pediatrics",
            "prenatal",
            "immunization",
        ],
        Category::PsychosocialIntegrity => &[
            "therapeutic communication",
            "mental health",
            "coping",
            "grief",
            "substance abuse",
            "crisis intervention",
        ],
        Category::PhysiologicalIntegrity => &[
            "fluid and electrolyte",
            "dosage calculation",
            "pharmacology",
            "cardiac",
            "respiratory",
            "lab values",
            "pain management",
        ],
    }
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extracts normalized search tokens from free text.
///
/// Lower-cases and splits on whitespace/punctuation, drops short tokens and
/// stop words. With a category, matched keyword phrases from that category's
/// table come first and overlapping generic words are excluded.
pub fn tokenize(query: &str, category: Option<Category>) -> Vec<String> {
    let normalized = query.trim().to_lowercase();

    let mut generic: Vec<String> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2 && !is_stop_word(t))
        .map(|t| t.to_string())
        .collect();
    generic.dedup();

    let mut tokens: Vec<String> = Vec::new();
    if let Some(cat) = category {
        for phrase in category_phrases(cat) {
            if normalized.contains(phrase) {
                tokens.push(phrase.to_string());
                generic.retain(|w| !phrase.contains(w.as_str()) && !w.contains(phrase));
            }
        }
    }

    for word in generic {
        if !tokens.contains(&word) {
            tokens.push(word);
        }
    }
    tokens
}

//=========================================================================================
// Scoring
//=========================================================================================

/// Scores one candidate against the token list. Returns the score and the
/// matched tokens, or `None` when nothing matched.
pub fn score_item(
    item: &CatalogItem,
    tokens: &[String],
    category: Option<Category>,
    weights: &ScoreWeights,
) -> Option<(i64, Vec<String>)> {
    let title = item.title.to_lowercase();
    let label = item.category.label().to_lowercase();
    let description = item.description.as_deref().unwrap_or("").to_lowercase();

    let mut score: i64 = 0;
    let mut total_matches: i64 = 0;
    let mut matched: Vec<String> = Vec::new();

    if category == Some(item.category) {
        score += weights.category_filter;
    }

    for token in tokens {
        let mut hit = false;

        if title.contains(token.as_str()) {
            score += weights.title;
            total_matches += 1;
            hit = true;
        }
        if label.contains(token.as_str()) {
            score += weights.category;
            total_matches += 1;
            hit = true;
        }
        let topic_hits = item
            .topics
            .iter()
            .filter(|t| t.to_lowercase().contains(token.as_str()))
            .count() as i64;
        if topic_hits > 0 {
            score += weights.topic * topic_hits;
            total_matches += topic_hits;
            hit = true;
        }
        if item
            .keywords
            .iter()
            .any(|k| k.to_lowercase().contains(token.as_str()))
        {
            score += weights.keyword;
            total_matches += 1;
            hit = true;
        }
        if !description.is_empty() && description.contains(token.as_str()) {
            score += weights.description;
            total_matches += 1;
            hit = true;
        }

        if hit {
            matched.push(token.clone());
        }
    }

    if matched.len() > 1 {
        score += weights.combo_per_match * total_matches;
    }

    if score > 0 {
        Some((score, matched))
    } else {
        None
    }
}

//=========================================================================================
// Search entry point
//=========================================================================================

/// Runs a relevance search against the catalog.
///
/// Queries that reduce to zero tokens fall back to the most recently created
/// items (optionally category-scoped). A strict match pass that finds nothing
/// is retried with a loose substring pattern before giving up. Equal scores
/// keep the store's insertion order; the sort is stable and never
/// re-randomized between calls for the same input.
pub async fn search(
    catalog: &dyn CatalogStore,
    query: &str,
    category: Option<Category>,
    limit: usize,
    weights: &ScoreWeights,
) -> PortResult<Vec<SearchHit>> {
    let tokens = tokenize(query, category);

    if tokens.is_empty() {
        let items = catalog.list_recent(category, limit as i64).await?;
        return Ok(items
            .into_iter()
            .map(|item| SearchHit {
                item,
                relevance_score: 0,
                matched_tokens: Vec::new(),
            })
            .collect());
    }

    let mut candidates = catalog.find_matching(&tokens, category, false).await?;
    if candidates.is_empty() {
        candidates = catalog.find_matching(&tokens, category, true).await?;
    }

    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .filter_map(|item| {
            score_item(&item, &tokens, category, weights).map(|(score, matched)| SearchHit {
                item,
                relevance_score: score,
                matched_tokens: matched,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    hits.truncate(limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CatalogFilter, CatalogItem, CatalogPatch, CatalogSummary, CategoryTrend, DateRange,
        NewCatalogItem, Price, TopicTrend,
    };
    use crate::ports::PortError;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use uuid::Uuid;

    fn item(title: &str, category: Category, topics: &[&str], keywords: &[&str]) -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            title: title.to_string(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
            category,
            description: None,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            price: Price::Free,
            content_ref: Uuid::new_v4(),
            file_name: "file.pdf".to_string(),
            file_size_bytes: 1024,
            mime_type: "application/pdf".to_string(),
            downloads: 0,
            purchases: 0,
            revenue: 0.0,
            created_at: chrono::Utc::now(),
        }
    }

    /// Canned store: `find_matching` returns `strict` then `loose`,
    /// `list_recent` returns `recent`.
    struct FakeCatalog {
        strict: Vec<CatalogItem>,
        loose: Vec<CatalogItem>,
        recent: Vec<CatalogItem>,
    }

    #[async_trait]
    impl CatalogStore for FakeCatalog {
        async fn insert(&self, _item: NewCatalogItem) -> PortResult<CatalogItem> {
            Err(PortError::Unexpected("not used".into()))
        }
        async fn find_by_id(&self, id: Uuid) -> PortResult<CatalogItem> {
            Err(PortError::NotFound(id.to_string()))
        }
        async fn list(&self, _filter: CatalogFilter) -> PortResult<Vec<CatalogItem>> {
            Ok(Vec::new())
        }
        async fn list_recent(
            &self,
            _category: Option<Category>,
            limit: i64,
        ) -> PortResult<Vec<CatalogItem>> {
            Ok(self.recent.iter().take(limit as usize).cloned().collect())
        }
        async fn find_matching(
            &self,
            _tokens: &[String],
            _category: Option<Category>,
            loose: bool,
        ) -> PortResult<Vec<CatalogItem>> {
            Ok(if loose {
                self.loose.clone()
            } else {
                self.strict.clone()
            })
        }
        async fn update(&self, id: Uuid, _patch: CatalogPatch) -> PortResult<CatalogItem> {
            Err(PortError::NotFound(id.to_string()))
        }
        async fn delete(&self, id: Uuid) -> PortResult<CatalogItem> {
            Err(PortError::NotFound(id.to_string()))
        }
        async fn increment_download(&self, _id: Uuid) -> PortResult<()> {
            Ok(())
        }
        async fn record_purchase(&self, _id: Uuid, _amount: f64) -> PortResult<()> {
            Ok(())
        }
        async fn analytics_summary(&self) -> PortResult<CatalogSummary> {
            Err(PortError::Unexpected("not used".into()))
        }
        async fn topic_trends(&self, _range: DateRange) -> PortResult<Vec<TopicTrend>> {
            Ok(Vec::new())
        }
        async fn category_trends(&self, _range: DateRange) -> PortResult<Vec<CategoryTrend>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn tokenizer_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("I need some study material for my exam", None);
        assert!(tokens.is_empty());

        let tokens = tokenize("cardiac pharmacology", None);
        assert_eq!(tokens, vec!["cardiac".to_string(), "pharmacology".to_string()]);
    }

    #[test]
    fn tokenizer_prefers_category_phrases_and_drops_overlapping_words() {
        let tokens = tokenize(
            "fluid and electrolyte balance",
            Some(Category::PhysiologicalIntegrity),
        );
        // The phrase comes first; "fluid" and "electrolyte" are folded into it.
        assert_eq!(tokens[0], "fluid and electrolyte");
        assert!(!tokens.contains(&"fluid".to_string()));
        assert!(!tokens.contains(&"electrolyte".to_string()));
        assert!(tokens.contains(&"balance".to_string()));
    }

    #[test]
    fn single_word_phrase_is_counted_once() {
        let tokens = tokenize("cardiac meds", Some(Category::PhysiologicalIntegrity));
        assert_eq!(
            tokens.iter().filter(|t| t.as_str() == "cardiac").count(),
            1
        );
    }

    #[test]
    fn title_hits_with_combo_bonus_reach_the_expected_floor() {
        let weights = ScoreWeights::default();
        let candidate = item(
            "Cardiac Pharmacology Review",
            Category::PhysiologicalIntegrity,
            &["cardiology"],
            &[],
        );
        let tokens = tokenize("cardiac pharmacology", None);
        let (score, matched) = score_item(&candidate, &tokens, None, &weights).unwrap();
        // 5 (title) + 5 (title) + 2*2 (combo) = 14 before topic credit.
        assert!(score >= 14, "score was {score}");
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn more_distinct_matches_never_lower_the_score() {
        let weights = ScoreWeights::default();
        let candidate = item(
            "Cardiac Pharmacology Review",
            Category::PhysiologicalIntegrity,
            &["cardiology", "medications"],
            &["heart"],
        );
        let one = score_item(&candidate, &["cardiac".to_string()], None, &weights)
            .unwrap()
            .0;
        let two = score_item(
            &candidate,
            &["cardiac".to_string(), "pharmacology".to_string()],
            None,
            &weights,
        )
        .unwrap()
        .0;
        assert!(two >= one);
    }

    #[test]
    fn category_filter_match_adds_fixed_bonus() {
        let weights = ScoreWeights::default();
        let candidate = item(
            "Triage Basics",
            Category::SafeEffectiveCare,
            &["triage"],
            &[],
        );
        let tokens = vec!["triage".to_string()];
        let without = score_item(&candidate, &tokens, None, &weights).unwrap().0;
        let with = score_item(&candidate, &tokens, Some(Category::SafeEffectiveCare), &weights)
            .unwrap()
            .0;
        assert_eq!(with - without, weights.category_filter);
    }

    #[test]
    fn stop_word_query_falls_back_to_recent_items() {
        let store = FakeCatalog {
            strict: Vec::new(),
            loose: Vec::new(),
            recent: vec![item("Newest Guide", Category::HealthPromotion, &["peds"], &[])],
        };
        let hits = block_on(search(
            &store,
            "please send study material",
            None,
            5,
            &ScoreWeights::default(),
        ))
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relevance_score, 0);
        assert!(hits[0].matched_tokens.is_empty());
    }

    #[test]
    fn strict_miss_retries_loose_pass() {
        let store = FakeCatalog {
            strict: Vec::new(),
            loose: vec![item(
                "Pharmacodynamics Deep Dive",
                Category::PhysiologicalIntegrity,
                &["pharmacology"],
                &[],
            )],
            recent: Vec::new(),
        };
        let hits = block_on(search(
            &store,
            "pharmacodynamics",
            None,
            5,
            &ScoreWeights::default(),
        ))
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].relevance_score > 0);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let first = item("Coping Skills A", Category::PsychosocialIntegrity, &["coping"], &[]);
        let second = item("Coping Skills B", Category::PsychosocialIntegrity, &["coping"], &[]);
        let store = FakeCatalog {
            strict: vec![first.clone(), second.clone()],
            loose: Vec::new(),
            recent: Vec::new(),
        };
        let hits = block_on(search(&store, "coping", None, 5, &ScoreWeights::default())).unwrap();
        assert_eq!(hits[0].item.id, first.id);
        assert_eq!(hits[1].item.id, second.id);

        // Re-running the same input keeps the same order.
        let again = block_on(search(&store, "coping", None, 5, &ScoreWeights::default())).unwrap();
        assert_eq!(again[0].item.id, first.id);
    }

    #[test]
    fn results_truncate_to_limit() {
        let items: Vec<CatalogItem> = (0..6)
            .map(|i| {
                item(
                    &format!("Triage Volume {i}"),
                    Category::SafeEffectiveCare,
                    &["triage"],
                    &[],
                )
            })
            .collect();
        let store = FakeCatalog {
            strict: items,
            loose: Vec::new(),
            recent: Vec::new(),
        };
        let hits = block_on(search(&store, "triage", None, 4, &ScoreWeights::default())).unwrap();
        assert_eq!(hits.len(), 4);
    }
}
