//! bmq-server library - Ballroom Music Quiz HTTP service
//!
//! Serves the score, leaderboard and catalog endpoints, hosts server-side
//! game sessions, and embeds the single-page UI.

use axum::Router;
use bmq_common::db::ScoreStore;
use bmq_common::{CatalogSource, QuizConfig};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod game;

pub use crate::error::{ApiError, ApiResult};
use crate::game::GameSessions;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QuizConfig>,
    /// Leaderboard storage
    pub scores: Arc<dyn ScoreStore>,
    /// Song catalog, read on every request
    pub catalog: Arc<CatalogSource>,
    pub sessions: Arc<GameSessions>,
}

impl AppState {
    pub fn new(config: QuizConfig, scores: Arc<dyn ScoreStore>, catalog: CatalogSource) -> Self {
        let sessions = GameSessions::new(config.game.clone());
        Self {
            config: Arc::new(config),
            scores,
            catalog: Arc::new(catalog),
            sessions: Arc::new(sessions),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::score_routes())
        .merge(api::catalog_routes())
        .merge(api::game_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
