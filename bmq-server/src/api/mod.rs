//! HTTP API handlers for bmq-server

pub mod catalog;
pub mod game;
pub mod health;
pub mod scores;
pub mod ui;

pub use catalog::catalog_routes;
pub use game::game_routes;
pub use health::health_routes;
pub use scores::score_routes;
pub use ui::ui_routes;
