//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_shelf_core::ports::{CatalogStore, ContentStore, TextGeneration, UserStore};
use study_shelf_core::search::ScoreWeights;
use study_shelf_core::session::SessionStore;

/// The shared application state, created once at startup and passed to all
/// handlers and to the bot engine.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserStore>,
    pub content: Arc<dyn ContentStore>,
    /// Absent when no completion API key is configured; the composer then
    /// uses its deterministic templates only.
    pub textgen: Option<Arc<dyn TextGeneration>>,
    /// The in-process conversation map, owned here so tests can construct
    /// isolated instances.
    pub sessions: Arc<SessionStore>,
    pub weights: ScoreWeights,
    pub config: Arc<Config>,
}
