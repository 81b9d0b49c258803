//! services/api/src/bot/flow.rs
//!
//! The step handlers for the purchase flow. Each handler reads the session
//! snapshot it was given, talks to the stores, sends its reply, and writes
//! the mutated session back (or clears it when the flow ends).

use crate::bot::{delivery, replies};
use crate::web::state::AppState;
use study_shelf_core::domain::Category;
use study_shelf_core::ports::{ChatChannel, PortError, PortResult};
use study_shelf_core::search;
use study_shelf_core::session::{
    ConversationSession, FlowStep, CONFIRMATION_CODE_MAX, CONFIRMATION_CODE_MIN,
};

/// How many candidates a search surfaces at material selection.
pub const MAX_CANDIDATES: usize = 5;

/// Routes one message to the handler for the session's current step.
pub async fn handle_step(
    state: &AppState,
    channel: &dyn ChatChannel,
    session: ConversationSession,
    input: &str,
) -> PortResult<()> {
    match session.step {
        FlowStep::CategorySelection => handle_category_selection(state, channel, session, input).await,
        FlowStep::MaterialSelection => handle_material_selection(state, channel, session, input).await,
        FlowStep::Confirmation => handle_confirmation(state, channel, session, input).await,
        FlowStep::Downloading => channel.send_text(replies::downloading_in_progress()).await,
    }
}

async fn handle_category_selection(
    state: &AppState,
    channel: &dyn ChatChannel,
    mut session: ConversationSession,
    input: &str,
) -> PortResult<()> {
    let Some(category) = Category::match_input(input) else {
        return channel.send_text(&replies::category_reprompt()).await;
    };

    let hits = search::search(
        state.catalog.as_ref(),
        input,
        Some(category),
        MAX_CANDIDATES,
        &state.weights,
    )
    .await?;

    if hits.is_empty() {
        session.category = None;
        state.sessions.update(session);
        return channel.send_text(&replies::no_materials(category)).await;
    }

    session.category = Some(category);
    session.candidates = hits.into_iter().map(|h| h.item).collect();
    session.advance(FlowStep::MaterialSelection);
    let text = replies::material_list(&session.candidates);
    state.sessions.update(session);
    channel.send_text(&text).await
}

async fn handle_material_selection(
    state: &AppState,
    channel: &dyn ChatChannel,
    mut session: ConversationSession,
    input: &str,
) -> PortResult<()> {
    if input.trim().eq_ignore_ascii_case("back") {
        session.advance(FlowStep::CategorySelection);
        session.category = None;
        session.candidates.clear();
        session.selected = None;
        state.sessions.update(session);
        return channel.send_text(&replies::category_menu()).await;
    }

    let len = session.candidates.len();
    let Some(index) = study_shelf_core::session::parse_selection(input, len) else {
        return channel.send_text(&replies::material_reprompt(len)).await;
    };

    let Some(item) = session.select(index).cloned() else {
        // The index passed the range check against a list that has since
        // been emptied; treat it like any other stale selection.
        return channel.send_text(&replies::material_reprompt(len)).await;
    };

    let code = fastrand::u32(CONFIRMATION_CODE_MIN..=CONFIRMATION_CODE_MAX).to_string();
    session.confirmation_code = Some(code.clone());
    session.advance(FlowStep::Confirmation);
    let text = replies::confirmation(&item, &code);
    state.sessions.update(session);
    channel.send_text(&text).await
}

async fn handle_confirmation(
    state: &AppState,
    channel: &dyn ChatChannel,
    mut session: ConversationSession,
    input: &str,
) -> PortResult<()> {
    let command = input.trim().to_lowercase();

    if command == "back" {
        session.advance(FlowStep::MaterialSelection);
        session.selected = None;
        session.confirmation_code = None;
        let text = replies::material_list(&session.candidates);
        state.sessions.update(session);
        return channel.send_text(&text).await;
    }

    if command != "download" {
        return channel.send_text(replies::confirmation_reprompt()).await;
    }

    let external_id = session.external_id;
    let Some(item) = session.selected.clone() else {
        state.sessions.clear(external_id);
        return channel.send_text(replies::retry_apology()).await;
    };

    session.advance(FlowStep::Downloading);
    state.sessions.update(session);

    let result = delivery::deliver(
        state.catalog.as_ref(),
        state.users.as_ref(),
        state.content.as_ref(),
        channel,
        external_id,
        &item,
    )
    .await;

    // Whatever happened, this flow is over.
    state.sessions.clear(external_id);

    match result {
        Ok(()) => Ok(()),
        Err(PortError::NotFound(_)) => channel.send_text(replies::file_missing()).await,
        Err(PortError::TooLarge { .. }) => channel.send_text(replies::too_large()).await,
        Err(e) => Err(e),
    }
}
