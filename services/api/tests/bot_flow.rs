//! services/api/tests/bot_flow.rs
//!
//! End-to-end tests for the bot engine: the scripted purchase flow, its
//! error paths, and delivery bookkeeping, driven against in-memory
//! implementations of the storefront ports and a recording chat channel.

use api_lib::bot;
use api_lib::config::Config;
use api_lib::web::state::AppState;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_shelf_core::domain::{
    CatalogFilter, CatalogItem, CatalogPatch, CatalogSummary, Category, CategoryTrend, DateRange,
    DownloadEntry, NewCatalogItem, Price, StoredContent, TopicTrend, UserRecord, UserStats,
};
use study_shelf_core::ports::{
    CatalogStore, ChatChannel, ContentStore, ContentStream, PortError, PortResult, TextGeneration,
    UserStore,
};
use study_shelf_core::search::ScoreWeights;
use study_shelf_core::session::{FlowStep, SessionStore};
use uuid::Uuid;

//=========================================================================================
// In-memory port implementations
//=========================================================================================

#[derive(Default)]
struct MemCatalog {
    items: Mutex<Vec<CatalogItem>>,
}

fn token_matches(item: &CatalogItem, token: &str) -> bool {
    item.title.to_lowercase().contains(token)
        || item.category.label().to_lowercase().contains(token)
        || item.topics.iter().any(|t| t.to_lowercase().contains(token))
        || item.keywords.iter().any(|k| k.to_lowercase().contains(token))
        || item
            .description
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
            .contains(token)
}

#[async_trait]
impl CatalogStore for MemCatalog {
    async fn insert(&self, item: NewCatalogItem) -> PortResult<CatalogItem> {
        let full = CatalogItem {
            id: Uuid::new_v4(),
            title: item.title,
            topics: item.topics,
            category: item.category,
            description: item.description,
            keywords: item.keywords,
            price: item.price,
            content_ref: item.content_ref,
            file_name: item.file_name,
            file_size_bytes: item.file_size_bytes,
            mime_type: item.mime_type,
            downloads: 0,
            purchases: 0,
            revenue: 0.0,
            created_at: Utc::now(),
        };
        self.items.lock().unwrap().push(full.clone());
        Ok(full)
    }

    async fn find_by_id(&self, id: Uuid) -> PortResult<CatalogItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Material {id} not found")))
    }

    async fn list(&self, filter: CatalogFilter) -> PortResult<Vec<CatalogItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| filter.category.map_or(true, |c| i.category == c))
            .cloned()
            .collect())
    }

    async fn list_recent(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> PortResult<Vec<CatalogItem>> {
        // Newest first: reverse insertion order.
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|i| category.map_or(true, |c| i.category == c))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_matching(
        &self,
        tokens: &[String],
        category: Option<Category>,
        _loose: bool,
    ) -> PortResult<Vec<CatalogItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| category.map_or(true, |c| i.category == c))
            .filter(|i| tokens.iter().any(|t| token_matches(i, t)))
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, patch: CatalogPatch) -> PortResult<CatalogItem> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Material {id} not found")))?;
        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(price) = patch.price {
            item.price = price;
        }
        Ok(item.clone())
    }

    async fn delete(&self, id: Uuid) -> PortResult<CatalogItem> {
        let mut items = self.items.lock().unwrap();
        let pos = items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Material {id} not found")))?;
        Ok(items.remove(pos))
    }

    async fn increment_download(&self, id: Uuid) -> PortResult<()> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Material {id} not found")))?;
        item.downloads += 1;
        Ok(())
    }

    async fn record_purchase(&self, id: Uuid, amount: f64) -> PortResult<()> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Material {id} not found")))?;
        item.purchases += 1;
        item.revenue += amount;
        Ok(())
    }

    async fn analytics_summary(&self) -> PortResult<CatalogSummary> {
        let items = self.items.lock().unwrap();
        Ok(CatalogSummary {
            total_materials: items.len() as i64,
            free_materials: items.iter().filter(|i| i.price.is_free()).count() as i64,
            paid_materials: items.iter().filter(|i| !i.price.is_free()).count() as i64,
            total_downloads: items.iter().map(|i| i.downloads).sum(),
            total_purchases: items.iter().map(|i| i.purchases).sum(),
            total_revenue: items.iter().map(|i| i.revenue).sum(),
        })
    }

    async fn topic_trends(&self, _range: DateRange) -> PortResult<Vec<TopicTrend>> {
        Ok(Vec::new())
    }

    async fn category_trends(&self, _range: DateRange) -> PortResult<Vec<CategoryTrend>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct MemUsers {
    users: Mutex<HashMap<i64, UserRecord>>,
}

#[async_trait]
impl UserStore for MemUsers {
    async fn get_or_create(&self, external_id: i64, name: &str) -> PortResult<UserRecord> {
        let mut users = self.users.lock().unwrap();
        let user = users.entry(external_id).or_insert_with(|| UserRecord {
            id: Uuid::new_v4(),
            external_id,
            name: name.to_string(),
            level: None,
            last_active_at: Utc::now(),
            created_at: Utc::now(),
            download_history: Vec::new(),
        });
        user.last_active_at = Utc::now();
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> PortResult<UserRecord> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {id} not found")))
    }

    async fn list(&self) -> PortResult<Vec<UserRecord>> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }

    async fn append_download(&self, external_id: i64, entry: DownloadEntry) -> PortResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&external_id)
            .ok_or_else(|| PortError::NotFound(format!("User {external_id} not found")))?;
        user.download_history.push(entry);
        Ok(())
    }

    async fn stats_summary(&self) -> PortResult<UserStats> {
        let users = self.users.lock().unwrap();
        Ok(UserStats {
            total_users: users.len() as i64,
            active_last_week: users.len() as i64,
            total_downloads: users.values().map(|u| u.download_history.len() as i64).sum(),
        })
    }
}

#[derive(Default)]
struct MemContent {
    files: Mutex<HashMap<Uuid, (StoredContent, Bytes)>>,
}

#[async_trait]
impl ContentStore for MemContent {
    async fn put(&self, file_name: &str, mime_type: &str, data: Bytes) -> PortResult<StoredContent> {
        let stored = StoredContent {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes: data.len() as i64,
        };
        self.files
            .lock()
            .unwrap()
            .insert(stored.id, (stored.clone(), data));
        Ok(stored)
    }

    async fn open_read(&self, content_id: Uuid) -> PortResult<ContentStream> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(&content_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| PortError::NotFound(format!("Content {content_id} not found")))?;
        Ok(Box::pin(futures::stream::iter(vec![Ok(data)])))
    }

    async fn delete(&self, content_id: Uuid) -> PortResult<()> {
        self.files
            .lock()
            .unwrap()
            .remove(&content_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Content {content_id} not found")))
    }
}

//=========================================================================================
// Recording channel and scripted completion
//=========================================================================================

#[derive(Debug)]
enum Sent {
    Text(String),
    Document {
        file_name: String,
        caption: String,
        size: usize,
    },
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingChannel {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t.clone()),
                Sent::Document { .. } => None,
            })
            .collect()
    }

    fn last_text(&self) -> String {
        self.texts().last().cloned().unwrap_or_default()
    }

    fn documents(&self) -> Vec<(String, String, usize)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Document {
                    file_name,
                    caption,
                    size,
                } => Some((file_name.clone(), caption.clone(), *size)),
                Sent::Text(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn send_text(&self, text: &str) -> PortResult<()> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        file_name: &str,
        _mime_type: &str,
        caption: &str,
        data: Bytes,
    ) -> PortResult<()> {
        self.sent.lock().unwrap().push(Sent::Document {
            file_name: file_name.to_string(),
            caption: caption.to_string(),
            size: data.len(),
        });
        Ok(())
    }
}

struct ScriptedTextGen {
    reply: String,
}

#[async_trait]
impl TextGeneration for ScriptedTextGen {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> PortResult<String> {
        Ok(self.reply.clone())
    }
}

struct FailingTextGen;

#[async_trait]
impl TextGeneration for FailingTextGen {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> PortResult<String> {
        Err(PortError::Unavailable("completion API down".to_string()))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        log_level: tracing::Level::INFO,
        environment: "test".to_string(),
        chat_token: None,
        admin_token: None,
        openai_api_key: None,
        completion_model: "gpt-4o-mini".to_string(),
        webhook_url: None,
    }
}

struct Fixture {
    state: AppState,
    catalog: Arc<MemCatalog>,
    users: Arc<MemUsers>,
    content: Arc<MemContent>,
}

fn fixture(textgen: Option<Arc<dyn TextGeneration>>) -> Fixture {
    let catalog = Arc::new(MemCatalog::default());
    let users = Arc::new(MemUsers::default());
    let content = Arc::new(MemContent::default());
    let state = AppState {
        catalog: catalog.clone(),
        users: users.clone(),
        content: content.clone(),
        textgen,
        sessions: Arc::new(SessionStore::new()),
        weights: ScoreWeights::default(),
        config: Arc::new(test_config()),
    };
    Fixture {
        state,
        catalog,
        users,
        content,
    }
}

async fn seed_item(
    fx: &Fixture,
    title: &str,
    category: Category,
    topics: &[&str],
    price: &str,
    data: &[u8],
) -> CatalogItem {
    let stored = fx
        .content
        .put(&format!("{}.pdf", title.to_lowercase().replace(' ', "_")), "application/pdf", Bytes::copy_from_slice(data))
        .await
        .unwrap();
    fx.catalog
        .insert(NewCatalogItem {
            title: title.to_string(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
            category,
            description: None,
            keywords: Vec::new(),
            price: Price::parse(price).unwrap(),
            content_ref: stored.id,
            file_name: stored.file_name,
            file_size_bytes: stored.size_bytes,
            mime_type: stored.mime_type,
        })
        .await
        .unwrap()
}

const USER: i64 = 4242;

async fn say(fx: &Fixture, channel: &RecordingChannel, text: &str) {
    bot::handle_message(&fx.state, channel, USER, "Casey", text)
        .await
        .unwrap();
}

//=========================================================================================
// Scenarios
//=========================================================================================

#[tokio::test]
async fn full_purchase_flow_updates_counters_and_history() {
    let fx = fixture(None);
    let item = seed_item(
        &fx,
        "Cardiac Pharmacology Review",
        Category::PhysiologicalIntegrity,
        &["pharmacology", "cardiac"],
        "10.50",
        b"PDFDATA",
    )
    .await;
    let channel = RecordingChannel::default();

    say(&fx, &channel, "/start").await;
    assert!(channel.last_text().contains("1. Safe & Effective Care Environment"));

    say(&fx, &channel, "4").await;
    assert!(channel.last_text().contains("1. Cardiac Pharmacology Review"));

    say(&fx, &channel, "1").await;
    let confirmation = channel.last_text();
    assert!(confirmation.contains("You picked: Cardiac Pharmacology Review"));
    let code_line = confirmation
        .lines()
        .find(|l| l.starts_with("Order code:"))
        .expect("confirmation shows an order code");
    let code: u32 = code_line
        .trim_start_matches("Order code:")
        .trim()
        .parse()
        .expect("order code is numeric");
    assert!((100_000..=999_999).contains(&code));

    say(&fx, &channel, "download").await;
    let docs = channel.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].0, "cardiac_pharmacology_review.pdf");
    assert_eq!(docs[0].2, b"PDFDATA".len());

    let after = fx.catalog.find_by_id(item.id).await.unwrap();
    assert_eq!(after.downloads, 1);
    assert_eq!(after.purchases, 1);
    assert!((after.revenue - 10.50).abs() < f64::EPSILON);

    let user = fx.users.get_or_create(USER, "Casey").await.unwrap();
    assert_eq!(user.download_history.len(), 1);
    assert_eq!(user.download_history[0].title, "Cardiac Pharmacology Review");

    // Flow completed: the session is gone.
    assert!(fx.state.sessions.get(USER).is_none());
}

#[tokio::test]
async fn free_download_skips_purchase_counters() {
    let fx = fixture(None);
    let item = seed_item(
        &fx,
        "Infection Control Checklist",
        Category::SafeEffectiveCare,
        &["infection control"],
        "Free",
        b"CHECKLIST",
    )
    .await;
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "1").await;
    say(&fx, &channel, "1").await;
    say(&fx, &channel, "download").await;

    let after = fx.catalog.find_by_id(item.id).await.unwrap();
    assert_eq!(after.downloads, 1);
    assert_eq!(after.purchases, 0);
    assert_eq!(after.revenue, 0.0);
}

#[tokio::test]
async fn out_of_range_selection_reprompts_and_keeps_the_step() {
    let fx = fixture(None);
    for i in 1..=5 {
        seed_item(
            &fx,
            &format!("Delegation Volume {i}"),
            Category::SafeEffectiveCare,
            &["delegation"],
            "Free",
            b"X",
        )
        .await;
    }
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "1").await;
    let list_text = channel.last_text();
    assert_eq!(
        fx.state.sessions.get(USER).unwrap().step,
        FlowStep::MaterialSelection
    );

    say(&fx, &channel, "0").await;
    assert!(channel.last_text().contains("between 1 and 5"));
    say(&fx, &channel, "99").await;
    assert!(channel.last_text().contains("between 1 and 5"));
    say(&fx, &channel, "definitely").await;
    assert!(channel.last_text().contains("between 1 and 5"));
    assert_eq!(
        fx.state.sessions.get(USER).unwrap().step,
        FlowStep::MaterialSelection
    );

    // "3" selects the third entry of the displayed list (0-based index 2).
    let third_title = list_text
        .lines()
        .find_map(|l| l.trim().strip_prefix("3. "))
        .and_then(|rest| rest.split(" — ").next())
        .expect("list shows a third entry")
        .to_string();
    say(&fx, &channel, "3").await;
    let session = fx.state.sessions.get(USER).unwrap();
    assert_eq!(session.step, FlowStep::Confirmation);
    assert_eq!(session.selected.as_ref().unwrap().title, third_title);
}

#[tokio::test]
async fn back_from_confirmation_redisplays_the_candidate_list() {
    let fx = fixture(None);
    seed_item(
        &fx,
        "Grief and Loss Notes",
        Category::PsychosocialIntegrity,
        &["grief"],
        "Free",
        b"NOTES",
    )
    .await;
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "3").await;
    say(&fx, &channel, "1").await;
    assert_eq!(
        fx.state.sessions.get(USER).unwrap().step,
        FlowStep::Confirmation
    );

    say(&fx, &channel, "back").await;
    let session = fx.state.sessions.get(USER).unwrap();
    assert_eq!(session.step, FlowStep::MaterialSelection);
    assert!(session.selected.is_none());
    assert!(channel.last_text().contains("1. Grief and Loss Notes"));
}

#[tokio::test]
async fn confirmation_gibberish_reprompts_without_moving() {
    let fx = fixture(None);
    seed_item(
        &fx,
        "Prenatal Care Guide",
        Category::HealthPromotion,
        &["prenatal"],
        "Free",
        b"GUIDE",
    )
    .await;
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "2").await;
    say(&fx, &channel, "1").await;
    say(&fx, &channel, "yes please").await;
    assert!(channel.last_text().contains("\"download\""));
    assert_eq!(
        fx.state.sessions.get(USER).unwrap().step,
        FlowStep::Confirmation
    );
}

#[tokio::test]
async fn oversize_file_is_rejected_before_send() {
    let fx = fixture(None);
    let big = vec![0u8; 51 * 1024 * 1024];
    let item = seed_item(
        &fx,
        "Complete Video Course",
        Category::PhysiologicalIntegrity,
        &["pharmacology"],
        "25.00",
        &big,
    )
    .await;
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "4").await;
    say(&fx, &channel, "1").await;
    say(&fx, &channel, "download").await;

    assert!(channel.documents().is_empty());
    assert!(channel.last_text().contains("too large"));

    let after = fx.catalog.find_by_id(item.id).await.unwrap();
    assert_eq!(after.downloads, 0);
    assert_eq!(after.purchases, 0);
    assert!(fx.state.sessions.get(USER).is_none());
}

#[tokio::test]
async fn missing_content_reports_file_missing_and_clears_session() {
    let fx = fixture(None);
    let item = seed_item(
        &fx,
        "Coping Strategies",
        Category::PsychosocialIntegrity,
        &["coping"],
        "Free",
        b"DATA",
    )
    .await;
    // Bytes vanish between upload and delivery.
    fx.content.delete(item.content_ref).await.unwrap();
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "3").await;
    say(&fx, &channel, "1").await;
    say(&fx, &channel, "download").await;

    assert!(channel.documents().is_empty());
    assert!(channel.last_text().contains("missing"));
    let after = fx.catalog.find_by_id(item.id).await.unwrap();
    assert_eq!(after.downloads, 0);
    assert!(fx.state.sessions.get(USER).is_none());
}

#[tokio::test]
async fn unknown_category_input_reprompts_in_place() {
    let fx = fixture(None);
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "astrology").await;
    assert!(channel.last_text().contains("didn't catch that category"));
    assert_eq!(
        fx.state.sessions.get(USER).unwrap().step,
        FlowStep::CategorySelection
    );
}

#[tokio::test]
async fn empty_category_reports_no_materials_and_stays() {
    let fx = fixture(None);
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    say(&fx, &channel, "2").await;
    assert!(channel
        .last_text()
        .contains("don't have any materials for Health Promotion & Maintenance"));
    let session = fx.state.sessions.get(USER).unwrap();
    assert_eq!(session.step, FlowStep::CategorySelection);
    assert!(session.category.is_none());
}

#[tokio::test]
async fn cancel_clears_the_session() {
    let fx = fixture(None);
    let channel = RecordingChannel::default();

    say(&fx, &channel, "browse").await;
    assert!(fx.state.sessions.get(USER).is_some());
    say(&fx, &channel, "cancel").await;
    assert!(fx.state.sessions.get(USER).is_none());
    assert!(channel.last_text().contains("cancelled"));
}

#[tokio::test]
async fn free_form_without_completion_api_falls_back_to_template() {
    let fx = fixture(None);
    let channel = RecordingChannel::default();

    say(&fx, &channel, "what's the half-life of digoxin?").await;
    assert!(channel.last_text().contains("browse"));
    assert!(fx.state.sessions.get(USER).is_none());
}

#[tokio::test]
async fn failing_completion_api_falls_back_to_template() {
    let fx = fixture(Some(Arc::new(FailingTextGen)));
    let channel = RecordingChannel::default();

    say(&fx, &channel, "tell me about beta blockers").await;
    assert!(channel.last_text().contains("browse"));
}

#[tokio::test]
async fn composer_browse_directive_starts_a_session() {
    let fx = fixture(Some(Arc::new(ScriptedTextGen {
        reply: "Happy to help you shop!\nINTENT: BROWSE".to_string(),
    })));
    let channel = RecordingChannel::default();

    say(&fx, &channel, "I'd like something to read before the big day").await;
    assert!(channel.last_text().contains("Which area would you like to study?"));
    assert_eq!(
        fx.state.sessions.get(USER).unwrap().step,
        FlowStep::CategorySelection
    );
}

#[tokio::test]
async fn composer_plain_answer_is_sent_verbatim() {
    let fx = fixture(Some(Arc::new(ScriptedTextGen {
        reply: "Beta blockers lower heart rate.\nINTENT: NONE".to_string(),
    })));
    let channel = RecordingChannel::default();

    say(&fx, &channel, "what do beta blockers do?").await;
    assert_eq!(channel.last_text(), "Beta blockers lower heart rate.");
    assert!(fx.state.sessions.get(USER).is_none());
}

#[tokio::test]
async fn counter_increments_accumulate_exactly() {
    let fx = fixture(None);
    let item = seed_item(
        &fx,
        "Lab Values Cheat Sheet",
        Category::PhysiologicalIntegrity,
        &["lab values"],
        "5.00",
        b"SHEET",
    )
    .await;

    for _ in 0..3 {
        fx.catalog.increment_download(item.id).await.unwrap();
    }
    fx.catalog.record_purchase(item.id, 5.0).await.unwrap();
    for _ in 0..2 {
        fx.catalog.increment_download(item.id).await.unwrap();
    }

    let after = fx.catalog.find_by_id(item.id).await.unwrap();
    assert_eq!(after.downloads, 5);
    assert_eq!(after.purchases, 1);
    assert_eq!(after.revenue, 5.0);
}

#[tokio::test]
async fn every_message_refreshes_last_active() {
    let fx = fixture(None);
    let channel = RecordingChannel::default();

    say(&fx, &channel, "hello!").await;
    let first = fx.users.get_or_create(USER, "Casey").await.unwrap().created_at;
    say(&fx, &channel, "browse").await;
    let user = fx.users.get_or_create(USER, "Casey").await.unwrap();
    assert_eq!(user.created_at, first);
    assert!(user.last_active_at >= first);
}
