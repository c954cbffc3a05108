//! HTTP API.
//!
//! # Endpoints
//!
//! - `POST /bets`                – place a bet
//! - `GET  /bets`                – list all bets
//! - `GET  /bets/{id}`           – get one bet
//! - `GET  /bets/user/{user_id}` – list a user's bets
//! - `POST /events/outcomes`     – queue an event outcome for settlement

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use betsettle_core::entities::StoreError;

use crate::state::AppState;

mod bets;
pub mod extractors;
mod outcomes;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bets", post(bets::create_bet).get(bets::list_bets))
        .route("/bets/{id}", get(bets::get_bet))
        .route("/bets/user/{user_id}", get(bets::list_bets_by_user))
        .route("/events/outcomes", post(outcomes::publish_outcome))
}

/// Errors that can occur in API handlers.
#[derive(Debug)]
enum ApiError {
    /// A store query failed.
    Store(StoreError),
    /// The requested bet was not found.
    NotFound,
    /// The settlement pipeline no longer accepts outcomes.
    PipelineUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Store(e) => {
                tracing::error!(error = %e, "API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "bet not found").into_response(),
            ApiError::PipelineUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "settlement pipeline is not accepting outcomes",
            )
                .into_response(),
        }
    }
}
