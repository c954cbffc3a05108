use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use betsettle_core::entities::bets::{Bet, CreateBet, GetBetById, ListBets, ListBetsByUser};
use betsettle_sdk::objects::{BetResponse, CreateBetRequest};
use kanau::processor::Processor;

use super::ApiError;
use super::extractors::ValidatedJson;
use crate::state::AppState;

/// Convert a `Bet` (DB model) into a `BetResponse` (API model).
fn to_response(bet: &Bet) -> BetResponse {
    BetResponse {
        bet_id: bet.bet_id,
        user_id: bet.user_id.clone(),
        event_id: bet.event_id.clone(),
        event_market_id: bet.event_market_id.clone(),
        event_winner_id: bet.event_winner_id.clone(),
        bet_amount: bet.bet_amount,
        status: bet.status.into(),
        created_at: bet.created_at,
    }
}

/// `POST /bets`: place a new bet with status `PENDING`.
pub(super) async fn create_bet(
    State(state): State<AppState>,
    ValidatedJson(cmd): ValidatedJson<CreateBetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bet = Processor::<CreateBet>::process(&state.processor(), cmd)
        .await
        .map_err(ApiError::Store)?;

    tracing::info!(
        bet_id = bet.bet_id,
        user_id = %bet.user_id,
        event_id = %bet.event_id,
        "Bet placed"
    );
    Ok((StatusCode::CREATED, Json(to_response(&bet))))
}

/// `GET /bets`
pub(super) async fn list_bets(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let bets = state
        .processor()
        .process(ListBets)
        .await
        .map_err(ApiError::Store)?;
    let response: Vec<_> = bets.iter().map(to_response).collect();
    Ok(Json(response))
}

/// `GET /bets/{id}`
pub(super) async fn get_bet(
    State(state): State<AppState>,
    Path(bet_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let bet = state
        .processor()
        .process(GetBetById { bet_id })
        .await
        .map_err(ApiError::Store)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(to_response(&bet)))
}

/// `GET /bets/user/{user_id}`
pub(super) async fn list_bets_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bets = state
        .processor()
        .process(ListBetsByUser { user_id })
        .await
        .map_err(ApiError::Store)?;
    let response: Vec<_> = bets.iter().map(to_response).collect();
    Ok(Json(response))
}
