use axum::{extract::State, http::StatusCode, response::IntoResponse};
use betsettle_sdk::objects::EventOutcomeMessage;

use super::ApiError;
use super::extractors::ValidatedJson;
use crate::state::AppState;

/// `POST /events/outcomes`: queue an event outcome for settlement.
///
/// Returns `202 Accepted` once the outcome is on the outcome channel.
/// Settlement happens asynchronously in the bet matcher.
pub(super) async fn publish_outcome(
    State(state): State<AppState>,
    ValidatedJson(outcome): ValidatedJson<EventOutcomeMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = outcome.event_id.clone();
    tracing::info!(
        event_id = %event_id,
        event_winner_id = %outcome.event_winner_id,
        "Received event outcome"
    );

    state
        .outcome_tx
        .send(outcome)
        .await
        .map_err(|_| ApiError::PipelineUnavailable)?;

    Ok((
        StatusCode::ACCEPTED,
        format!("Event outcome queued for settlement for event: {event_id}"),
    ))
}
