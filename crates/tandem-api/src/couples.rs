use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use tandem_types::api::{BalanceResponse, CoupleResponse, CreateCoupleRequest};

use crate::error::ApiError;
use crate::run_blocking;
use crate::service;
use crate::AppState;

pub async fn create_couple(
    State(state): State<AppState>,
    Json(req): Json<CreateCoupleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let couple =
        run_blocking(move || service::create_couple(&app.db, req.player1_id, req.player2_id))
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(CoupleResponse {
            id: couple.id,
            player1_id: couple.player1_id,
            player2_id: couple.player2_id,
            balance: couple.balance,
        }),
    ))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(couple_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let balance = run_blocking(move || service::couple_balance(&app.db, couple_id)).await?;

    Ok(Json(BalanceResponse { couple_id, balance }))
}
