//! Audio device abstraction for the round engine
//!
//! The engine owns timing and scoring; the device only plays, stops and
//! reports a position. One device per engine, shared by every round of the
//! session.

use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::time::Instant;

/// Playback could not be started
#[derive(Debug, Clone, Error)]
#[error("failed to play {url}: {reason}")]
pub struct PlaybackError {
    pub url: String,
    pub reason: String,
}

/// Single audio output used by one engine
pub trait AudioSink: Send + Sync + 'static {
    /// Load `url` and start playing `offset_secs` into the track
    fn play(&self, url: &str, offset_secs: f64) -> Result<(), PlaybackError>;

    /// Stop playback and forget the current track
    fn stop(&self);

    /// Position in seconds within the current track; `None` when stopped
    fn position_secs(&self) -> Option<f64>;
}

/// Playback hosted by the browser
///
/// The browser plays the clip; the server mirrors its position from the
/// elapsed time since `play`. Failures surface asynchronously through the
/// playback-error endpoint rather than from `play`.
#[derive(Debug, Default)]
pub struct ClockedPlayback {
    cue: Mutex<Option<Cue>>,
}

#[derive(Debug, Clone, Copy)]
struct Cue {
    started_at: Instant,
    offset_secs: f64,
}

impl ClockedPlayback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for ClockedPlayback {
    fn play(&self, url: &str, offset_secs: f64) -> Result<(), PlaybackError> {
        if url.trim().is_empty() {
            return Err(PlaybackError {
                url: url.to_string(),
                reason: "empty URL".to_string(),
            });
        }
        let mut cue = self.cue.lock().unwrap_or_else(PoisonError::into_inner);
        *cue = Some(Cue {
            started_at: Instant::now(),
            offset_secs,
        });
        Ok(())
    }

    fn stop(&self) {
        self.cue.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn position_secs(&self) -> Option<f64> {
        self.cue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|cue| cue.offset_secs + cue.started_at.elapsed().as_secs_f64())
    }
}
