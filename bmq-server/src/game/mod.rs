//! Quiz game: round engine, its timers, and the per-session registry

pub mod audio;
pub mod engine;
pub mod scheduler;
pub mod sessions;

pub use audio::{AudioSink, ClockedPlayback, PlaybackError};
pub use engine::{
    EngineError, Feedback, GameSettings, GuessOutcome, Phase, RoundEngine, RoundSnapshot,
    SubmitOutcome,
};
pub use sessions::GameSessions;

use bmq_common::config::GameConfig;
use rand::Rng;

/// Random playback start offset in whole seconds, inclusive window from config
pub fn pick_start_offset<R: Rng + ?Sized>(rng: &mut R, timing: &GameConfig) -> u32 {
    rng.gen_range(timing.start_offset_min_secs..=timing.start_offset_max_secs)
}
