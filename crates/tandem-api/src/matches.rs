use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use tandem_types::GameError;
use tandem_types::api::{
    CompletedWord, CreateMatchRequest, CreateMatchResponse, HintRequest, HintResponse,
    MatchStateResponse, MoveView, PlacementResult, PollQuery, SubmitTurnRequest,
    TurnResultResponse,
};

use crate::error::ApiError;
use crate::run_blocking;
use crate::service::{self, TurnApplied};
use crate::AppState;

pub async fn create_or_get(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let (is_new, bundle) =
        run_blocking(move || service::create_or_get_match(&app.db, req.requester_id, req.puzzle_id))
            .await?;

    let status = if is_new { StatusCode::CREATED } else { StatusCode::OK };
    let body = CreateMatchResponse {
        is_new,
        state: MatchStateResponse::project(
            &bundle.state,
            &bundle.puzzle,
            &bundle.couple,
            req.requester_id,
        ),
    };
    Ok((status, Json(body)))
}

pub async fn poll(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let bundle =
        run_blocking(move || service::poll_match(&app.db, match_id, query.requester_id)).await?;

    Ok(Json(MatchStateResponse::project(
        &bundle.state,
        &bundle.puzzle,
        &bundle.couple,
        query.requester_id,
    )))
}

pub async fn submit_turn(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<SubmitTurnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let requester = req.requester_id;
    let TurnApplied { bundle, outcome } = run_blocking(move || {
        service::submit_turn(&app.db, match_id, req.requester_id, req.turn_number, &req.placements)
    })
    .await?;

    let slot = bundle
        .couple
        .slot_of(requester)
        .ok_or(ApiError(GameError::NotParticipant))?;

    let body = TurnResultResponse {
        placements: outcome
            .placements
            .iter()
            .map(|&(cell, letter, correct)| PlacementResult { cell, letter, correct })
            .collect(),
        letter_points: outcome.letter_points,
        completed_words: outcome
            .completed_runs
            .iter()
            .map(|run| CompletedWord {
                clue: run.clue_text.clone(),
                cells: run.cells.clone(),
                bonus: run.bonus,
            })
            .collect(),
        bonus_points: outcome.bonus_points,
        turn_points: outcome.turn_points,
        new_score: bundle.state.scores[slot.idx()],
        puzzle_complete: outcome.puzzle_complete,
        winner: bundle.state.winner.map(|s| bundle.couple.participant(s)),
        state: MatchStateResponse::project(&bundle.state, &bundle.puzzle, &bundle.couple, requester),
    };
    Ok(Json(body))
}

pub async fn use_hint(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<HintRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let (cells, hints_remaining) =
        run_blocking(move || service::use_hint(&app.db, match_id, req.requester_id)).await?;

    Ok(Json(HintResponse { cells, hints_remaining }))
}

pub async fn move_history(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let moves = run_blocking(move || service::move_history(&app.db, match_id)).await?;

    let views: Vec<MoveView> = moves.iter().map(MoveView::project).collect();
    Ok(Json(views))
}
