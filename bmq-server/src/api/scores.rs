//! Score submission and leaderboard endpoints

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use bmq_common::{Lives, NewScore, ScoreEntry, ScoreFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

/// POST /api/add-score body
///
/// Fields are taken as raw JSON so that a string score is rejected instead of
/// coerced.
#[derive(Debug, Deserialize)]
pub struct AddScoreRequest {
    pub name: Option<Value>,
    pub score: Option<Value>,
    pub lives: Option<Value>,
    pub duration: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// One leaderboard row as served to clients
#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
    pub name: String,
    pub score: u32,
    pub lives: Lives,
    pub duration: u32,
}

impl From<ScoreEntry> for LeaderboardRow {
    fn from(entry: ScoreEntry) -> Self {
        Self {
            name: entry.name,
            score: entry.score,
            lives: entry.lives,
            duration: entry.duration,
        }
    }
}

/// GET /api/get-leaderboard query; values kept as text for explicit 400s
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub lives: Option<String>,
    pub duration: Option<String>,
    pub limit: Option<String>,
}

fn required_str<'a>(value: &'a Option<Value>, field: &str) -> ApiResult<&'a str> {
    match value {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ApiError::BadRequest(format!("{} must be a string", field))),
        None => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

fn required_int(value: &Option<Value>, field: &str) -> ApiResult<i64> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ApiError::BadRequest(format!("{} must be an integer", field))),
        Some(_) => Err(ApiError::BadRequest(format!("{} must be a number", field))),
        None => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

/// Treat absent, empty and "all" as no filter
fn filter_value(raw: &Option<String>) -> Option<&str> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(v) if v.eq_ignore_ascii_case("all") => None,
        Some(v) => Some(v),
    }
}

fn parse_lives_filter(raw: &str) -> ApiResult<Lives> {
    if raw.eq_ignore_ascii_case("unlimited") || raw.eq_ignore_ascii_case("endless") {
        return Ok(Lives::Unlimited);
    }
    let value: i64 = raw
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid lives filter '{}'", raw)))?;
    Lives::from_raw(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_positive(raw: &str, field: &str) -> ApiResult<u32> {
    match raw.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ApiError::BadRequest(format!("invalid {} '{}'", field, raw))),
    }
}

impl LeaderboardQuery {
    /// Resolve the filter and the effective limit (capped at `max_limit`)
    pub fn resolve(&self, default_limit: u32, max_limit: u32) -> ApiResult<(ScoreFilter, u32)> {
        let lives = filter_value(&self.lives).map(parse_lives_filter).transpose()?;
        let duration = filter_value(&self.duration)
            .map(|d| parse_positive(d, "duration filter"))
            .transpose()?;
        let limit = filter_value(&self.limit)
            .map(|l| parse_positive(l, "limit"))
            .transpose()?
            .unwrap_or(default_limit)
            .min(max_limit);

        Ok((ScoreFilter { lives, duration }, limit))
    }
}

/// POST /api/add-score
pub async fn add_score(
    State(state): State<AppState>,
    payload: Result<Json<AddScoreRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let score = NewScore::new(
        required_str(&req.name, "name")?,
        required_int(&req.score, "score")?,
        required_int(&req.lives, "lives")?,
        required_int(&req.duration, "duration")?,
    )?;

    state.scores.submit_score(&score).await?;

    Ok(Json(MessageResponse {
        message: "Score saved successfully!".to_string(),
    }))
}

/// GET /api/get-leaderboard
pub async fn get_leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LeaderboardRow>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limits = &state.config.leaderboard;
    let (filter, limit) = query.resolve(limits.default_limit, limits.max_limit)?;

    let rows = state.scores.list_top_scores(limit, filter).await?;
    info!("Leaderboard: {} rows (limit {}, {:?})", rows.len(), limit, filter);

    Ok(Json(rows.into_iter().map(LeaderboardRow::from).collect()))
}

pub fn score_routes() -> Router<AppState> {
    Router::new()
        .route("/api/add-score", post(add_score))
        .route("/api/get-leaderboard", get(get_leaderboard))
}
