pub mod completion_llm;
pub mod content;
pub mod db;

pub use completion_llm::OpenAiCompletionAdapter;
pub use content::PgContentStore;
pub use db::{PgCatalogStore, PgUserStore};
