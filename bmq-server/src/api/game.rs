//! Game session endpoints
//!
//! The browser plays the clip named in the snapshot, polls the session for the
//! countdown, and reports playback failures back with the round number it was
//! playing.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::game::sessions::SessionEngine;
use crate::game::{GameSettings, GuessOutcome, RoundSnapshot, SubmitOutcome};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    /// Clip duration in seconds (default 10)
    pub duration: Option<i64>,
    /// Starting lives, -1 for unlimited (default)
    pub lives: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GuessRequest {
    pub guess: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackErrorRequest {
    pub round: u64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct GameStateResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub state: RoundSnapshot,
}

#[derive(Debug, Serialize)]
pub struct GuessResponse {
    pub outcome: GuessOutcome,
    pub state: GameStateResponse,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOutcome {
    Saved,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub outcome: ScoreOutcome,
    pub state: GameStateResponse,
}

async fn session(state: &AppState, id: &Uuid) -> ApiResult<SessionEngine> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Game session {} not found", id)))
}

async fn state_response(id: Uuid, engine: &SessionEngine) -> GameStateResponse {
    GameStateResponse {
        session_id: id,
        state: engine.snapshot().await,
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// POST /api/game
pub async fn create_game(
    State(state): State<AppState>,
    payload: Result<Json<CreateGameRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GameStateResponse>)> {
    let req = json_body(payload)?;
    let settings = GameSettings::new(
        req.duration
            .unwrap_or(i64::from(GameSettings::DEFAULT_DURATION_SECS)),
        req.lives.unwrap_or(bmq_common::Lives::UNLIMITED),
    )?;

    let catalog = state
        .catalog
        .load()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to load songs: {}", e)))?;

    let (id, engine) = state.sessions.create(settings, &catalog).await?;
    Ok((StatusCode::CREATED, Json(state_response(id, &engine).await)))
}

/// GET /api/game/:id
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GameStateResponse>> {
    let engine = session(&state, &id).await?;
    Ok(Json(state_response(id, &engine).await))
}

/// POST /api/game/:id/guess
pub async fn submit_guess(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<GuessRequest>, JsonRejection>,
) -> ApiResult<Json<GuessResponse>> {
    let req = json_body(payload)?;
    let engine = session(&state, &id).await?;
    let outcome = engine.submit_guess(&req.guess).await;

    Ok(Json(GuessResponse {
        outcome,
        state: state_response(id, &engine).await,
    }))
}

/// POST /api/game/:id/quit
pub async fn quit_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GameStateResponse>> {
    let engine = session(&state, &id).await?;
    engine.quit().await;
    Ok(Json(state_response(id, &engine).await))
}

/// POST /api/game/:id/playback-error
pub async fn report_playback_error(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<PlaybackErrorRequest>, JsonRejection>,
) -> ApiResult<Json<GameStateResponse>> {
    let req = json_body(payload)?;
    let engine = session(&state, &id).await?;
    let reason = req.reason.as_deref().unwrap_or("reported by client");
    engine.report_playback_failure(req.round, reason).await;
    Ok(Json(state_response(id, &engine).await))
}

/// POST /api/game/:id/score
pub async fn submit_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SubmitScoreRequest>, JsonRejection>,
) -> ApiResult<Json<ScoreResponse>> {
    let req = json_body(payload)?;
    let engine = session(&state, &id).await?;

    let outcome = match engine.submit_score(&req.name, state.scores.as_ref()).await? {
        SubmitOutcome::Saved(entry) => {
            info!("Session {} saved score {} as '{}'", id, entry.score, entry.name);
            ScoreOutcome::Saved
        }
        SubmitOutcome::Skipped => ScoreOutcome::Skipped,
    };

    Ok(Json(ScoreResponse {
        outcome,
        state: state_response(id, &engine).await,
    }))
}

/// DELETE /api/game/:id
pub async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Game session {} not found", id)))
    }
}

pub fn game_routes() -> Router<AppState> {
    Router::new()
        .route("/api/game", post(create_game))
        .route("/api/game/:id", get(get_game).delete(delete_game))
        .route("/api/game/:id/guess", post(submit_guess))
        .route("/api/game/:id/quit", post(quit_game))
        .route("/api/game/:id/playback-error", post(report_playback_error))
        .route("/api/game/:id/score", post(submit_score))
}
