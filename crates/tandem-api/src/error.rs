use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tandem_types::GameError;
use tandem_types::api::ErrorBody;

/// Wire wrapper for [`GameError`]: every variant maps to a status code and
/// a `{ "error": code, "message": detail }` body so clients can decide
/// whether to retry, refresh, or surface a message.
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::PuzzleNotFound(_)
            | GameError::MatchNotFound(_)
            | GameError::CoupleNotFound(_) => StatusCode::NOT_FOUND,
            GameError::NotParticipant => StatusCode::FORBIDDEN,
            GameError::SelfPairing => StatusCode::BAD_REQUEST,
            GameError::MatchNotActive(_)
            | GameError::NotYourTurn
            | GameError::DuplicateTurn(_)
            | GameError::AlreadyPaired(_)
            | GameError::HintExhausted => StatusCode::CONFLICT,
            GameError::InvalidCell { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            // Transient infrastructure class: retryable by the caller.
            GameError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
