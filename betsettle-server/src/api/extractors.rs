//! Custom Axum extractors for request validation.
//!
//! Provides `ValidatedJson<T>`: deserializes a JSON body and runs the
//! body's [`Validate`] check, so handlers only ever see well-formed input.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use betsettle_core::entities::bets::CreateBet;
use betsettle_sdk::objects::{CreateBetRequest, EventOutcomeMessage, ValidationError};
use serde::de::DeserializeOwned;

/// A request body that can be checked before it reaches a handler.
pub trait Validate: DeserializeOwned {
    /// What a handler receives once the body passed validation.
    type Valid;

    fn into_valid(self) -> Result<Self::Valid, ValidationError>;
}

impl Validate for CreateBetRequest {
    type Valid = CreateBet;

    fn into_valid(self) -> Result<CreateBet, ValidationError> {
        let bet_amount = self.validate()?;
        Ok(CreateBet {
            user_id: self.user_id,
            event_id: self.event_id,
            event_market_id: self.event_market_id,
            event_winner_id: self.event_winner_id,
            bet_amount,
        })
    }
}

impl Validate for EventOutcomeMessage {
    type Valid = EventOutcomeMessage;

    fn into_valid(self) -> Result<EventOutcomeMessage, ValidationError> {
        self.validate()?;
        Ok(self)
    }
}

/// An Axum extractor that deserializes and validates the JSON request body.
pub struct ValidatedJson<T: Validate>(pub T::Valid);

/// Errors that can occur while extracting a validated body.
#[derive(Debug, thiserror::Error)]
pub enum ValidatedJsonError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] JsonRejection),
    #[error("{0}")]
    Invalid(#[from] ValidationError),
}

impl IntoResponse for ValidatedJsonError {
    fn into_response(self) -> Response {
        match self {
            ValidatedJsonError::Json(rejection) => {
                tracing::debug!(error = %rejection, "Rejected request body");
                (StatusCode::BAD_REQUEST, "invalid JSON body").into_response()
            }
            ValidatedJsonError::Invalid(e) => {
                tracing::debug!(error = %e, "Request failed validation");
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
        }
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: Validate + Send,
{
    type Rejection = ValidatedJsonError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await?;
        Ok(ValidatedJson(body.into_valid()?))
    }
}
