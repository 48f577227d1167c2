//! Song catalog endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bmq_common::Catalog;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::game::pick_start_offset;
use crate::{ApiError, ApiResult, AppState};

/// Browsers may cache a successful catalog for five minutes
const CATALOG_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Serialize)]
pub struct RandomSongResponse {
    pub url: String,
    pub style: String,
    #[serde(rename = "startTime")]
    pub start_time: u32,
}

/// GET /api/get-music-files
///
/// Never fails: an unavailable source yields every fallback style with an
/// empty song list.
pub async fn get_music_files(State(state): State<AppState>) -> Response {
    match state.catalog.load().await {
        Ok(catalog) => (
            [(header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)],
            Json(catalog),
        )
            .into_response(),
        Err(e) => {
            warn!(
                "Catalog unavailable from {}: {}; serving fallback",
                state.catalog.describe(),
                e
            );
            let fallback = Catalog::fallback(&state.config.catalog.fallback_styles);
            Json(fallback).into_response()
        }
    }
}

/// GET /api/get-random-song
pub async fn get_random_song(State(state): State<AppState>) -> ApiResult<Response> {
    // any source failure is a server-side storage failure here, even NotFound
    let catalog = state
        .catalog
        .load()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to load songs: {}", e)))?;

    let mut rng = rand::thread_rng();
    let Some(song) = catalog.random_song(&mut rng) else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No songs found" })),
        )
            .into_response());
    };
    let start_time = pick_start_offset(&mut rng, &state.config.game);

    Ok(Json(RandomSongResponse {
        url: song.url,
        style: song.style.to_string(),
        start_time,
    })
    .into_response())
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/get-music-files", get(get_music_files))
        .route("/api/get-random-song", get(get_random_song))
}
