//! crates/study_shelf_core/src/session.rs
//!
//! Ephemeral, process-local conversation state for the purchase flow, keyed
//! by the chat platform's external user id. Nothing here is persisted: a
//! restart simply drops everyone back to the no-session path.

use crate::domain::{CatalogItem, Category};
use std::collections::HashMap;
use std::sync::Mutex;

//=========================================================================================
// Flow steps
//=========================================================================================

/// Where a user currently is inside the multi-step purchase flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    CategorySelection,
    MaterialSelection,
    Confirmation,
    Downloading,
}

impl FlowStep {
    /// The legal forward and `back` edges of the flow. Handlers must never
    /// move a session along any other edge.
    pub fn can_transition_to(self, next: FlowStep) -> bool {
        use FlowStep::*;
        matches!(
            (self, next),
            (CategorySelection, MaterialSelection)
                | (MaterialSelection, Confirmation)
                | (MaterialSelection, CategorySelection)
                | (Confirmation, MaterialSelection)
                | (Confirmation, Downloading)
        )
    }
}

//=========================================================================================
// Session record
//=========================================================================================

/// The state of one user's trip through the purchase flow.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub external_id: i64,
    pub step: FlowStep,
    pub category: Option<Category>,
    /// The ranked candidates shown at material selection. Selection indexes
    /// always refer into this list.
    pub candidates: Vec<CatalogItem>,
    pub selected: Option<CatalogItem>,
    pub confirmation_code: Option<String>,
}

impl ConversationSession {
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            step: FlowStep::CategorySelection,
            category: None,
            candidates: Vec::new(),
            selected: None,
            confirmation_code: None,
        }
    }

    /// Moves to `next` if the edge is legal. Illegal edges are a programming
    /// error in a handler and are refused rather than applied.
    pub fn advance(&mut self, next: FlowStep) -> bool {
        if self.step.can_transition_to(next) {
            self.step = next;
            true
        } else {
            false
        }
    }

    /// Records the material picked at `MaterialSelection`, enforcing the
    /// invariant that a selection always comes from this session's own
    /// candidate list.
    pub fn select(&mut self, index: usize) -> Option<&CatalogItem> {
        let item = self.candidates.get(index)?.clone();
        self.selected = Some(item);
        self.selected.as_ref()
    }
}

//=========================================================================================
// Input helpers
//=========================================================================================

/// Parses a 1-based selection index against a candidate list of `len`
/// entries. Non-numeric and out-of-range input (including `"0"`) is `None`.
pub fn parse_selection(input: &str, len: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    if n >= 1 && n <= len {
        Some(n - 1)
    } else {
        None
    }
}

/// Formats a raw number from the caller's RNG into the 6-digit confirmation
/// code space. The engine draws uniformly from `100_000..=999_999`.
pub const CONFIRMATION_CODE_MIN: u32 = 100_000;
pub const CONFIRMATION_CODE_MAX: u32 = 999_999;

//=========================================================================================
// Session store
//=========================================================================================

/// The in-process session map, owned explicitly and injected wherever the
/// flow handlers run so tests can construct isolated instances.
///
/// Concurrent messages from the same user race on this map and the last
/// write wins. Messages from different users never contend
/// beyond the map lock, which is never held across an await point.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<i64, ConversationSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh session for this user, replacing any existing one.
    pub fn begin(&self, external_id: i64) -> ConversationSession {
        let session = ConversationSession::new(external_id);
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .insert(external_id, session.clone());
        session
    }

    pub fn get(&self, external_id: i64) -> Option<ConversationSession> {
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .get(&external_id)
            .cloned()
    }

    /// Writes back a mutated session snapshot.
    pub fn update(&self, session: ConversationSession) {
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .insert(session.external_id, session);
    }

    /// Deletes the session on completion, cancellation, or unrecoverable
    /// error. The flow never leaves a session dangling in a state a handler
    /// cannot resume.
    pub fn clear(&self, external_id: i64) {
        self.inner
            .lock()
            .expect("session map lock poisoned")
            .remove(&external_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
