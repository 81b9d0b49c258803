pub mod domain;
pub mod ports;
pub mod search;
pub mod session;

pub use domain::{
    CatalogFilter, CatalogItem, CatalogPatch, CatalogSummary, Category, CategoryTrend,
    ComposerReply, DateRange, DownloadEntry, FlowDirective, NewCatalogItem, Price, SearchHit,
    StoredContent, TopicTrend, UserRecord, UserStats,
};
pub use ports::{
    CatalogStore, ChatChannel, ContentStore, ContentStream, PortError, PortResult,
    TextGeneration, UserStore,
};
pub use search::{search, ScoreWeights};
pub use session::{ConversationSession, FlowStep, SessionStore};
