//! Round engine: one quiz session
//!
//! ```text
//! Idle ──start_game──► Playing ──correct guess / timeout──► RoundResolving
//!   ▲                     ▲                                      │
//!   │                     └───────────── next song ◄─────────────┘
//!   │                     │ lives exhausted / quit
//!   └── score saved ◄── GameOver
//! ```
//!
//! All state lives behind one async mutex. Timers run as tasks owned by a
//! [`RoundScheduler`]; each carries the round generation it was created for and
//! is discarded if the engine has moved on when it fires.
//!
//! Life loss happens only on timeout. A wrong guess costs nothing.

use super::audio::AudioSink;
use super::scheduler::RoundScheduler;
use super::pick_start_offset;
use bmq_common::config::GameConfig;
use bmq_common::db::ScoreStore;
use bmq_common::{Catalog, Difficulty, Lives, NewScore, ScoreEntry, SongRef, StyleLabel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Round engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Nothing to play
    #[error("No songs found")]
    EmptyCatalog,

    /// start_game while a round is running
    #[error("A game is already in progress")]
    GameInProgress,

    #[error("Invalid game settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid score: {0}")]
    InvalidScore(String),

    /// Score store failure; the game stays in GameOver so the user can retry
    #[error("Failed to save score: {0}")]
    Store(#[from] bmq_common::Error),
}

/// Per-game settings chosen by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub clip_duration_secs: u32,
    pub starting_lives: Lives,
}

impl GameSettings {
    pub const DEFAULT_DURATION_SECS: u32 = 10;

    /// Validate raw values (`lives = -1` for unlimited)
    pub fn new(duration_secs: i64, lives: i64) -> Result<Self, EngineError> {
        let clip_duration_secs = match u32::try_from(duration_secs) {
            Ok(d) if d > 0 => d,
            _ => {
                return Err(EngineError::InvalidSettings(format!(
                    "duration must be a positive number of seconds, got {}",
                    duration_secs
                )))
            }
        };
        let starting_lives =
            Lives::from_raw(lives).map_err(|e| EngineError::InvalidSettings(e.to_string()))?;

        Ok(Self {
            clip_duration_secs,
            starting_lives,
        })
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            clip_duration_secs: Self::DEFAULT_DURATION_SECS,
            starting_lives: Lives::Unlimited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Playing,
    RoundResolving,
    GameOver,
}

/// Song the current round is playing
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSong {
    pub url: String,
    pub style: StyleLabel,
    pub start_offset_secs: f64,
}

/// Player-facing feedback for the last event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Feedback {
    Correct,
    Wrong,
    TimeUp { answer: String },
    PlaybackFailed,
    NoSongs,
    GameOver,
    Saved,
}

impl Feedback {
    pub fn message(&self) -> String {
        match self {
            Feedback::Correct => "Correct!".to_string(),
            Feedback::Wrong => "Wrong! Try again.".to_string(),
            Feedback::TimeUp { answer } => {
                format!("Time's up! The correct answer was \"{}\".", answer)
            }
            Feedback::PlaybackFailed => "Error playing song. Skipping to the next song.".to_string(),
            Feedback::NoSongs => "No songs available.".to_string(),
            Feedback::GameOver => "Game Over! Enter your name to save your score.".to_string(),
            Feedback::Saved => "Your score has been saved!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuessOutcome {
    Correct,
    Wrong,
    /// Blank guess, or no round accepting guesses
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved(ScoreEntry),
    /// Blank name, not in GameOver, or a submission already in flight
    Skipped,
}

/// What the client needs to render and play the current round
#[derive(Debug, Clone, Serialize)]
pub struct SongCue {
    pub url: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackView {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub message: String,
}

/// Read-only view of the engine
///
/// The current style is never included; only the revealed answer after a
/// timeout.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub phase: Phase,
    /// Round generation; echo it back when reporting a playback failure
    pub round: u64,
    pub score: u32,
    pub lives: Lives,
    pub starting_lives: Lives,
    pub duration: u32,
    pub difficulty: Difficulty,
    /// Whole seconds left, rounded up
    pub timer: u32,
    /// Remaining share of the clip, 0-100
    pub progress: f64,
    pub song: Option<SongCue>,
    pub revealed_style: Option<String>,
    pub feedback: Option<FeedbackView>,
    pub awaiting_name: bool,
}

#[derive(Debug, Clone, Copy)]
enum RoundTask {
    Tick,
    NextSong,
}

struct RoundState {
    phase: Phase,
    settings: GameSettings,
    songs: Vec<SongRef>,
    current: Option<CurrentSong>,
    remaining_secs: f64,
    score: u32,
    lives: Lives,
    feedback: Option<Feedback>,
    revealed: Option<String>,
    generation: u64,
    awaiting_name: bool,
    scheduler: RoundScheduler,
    rng: StdRng,
}

impl RoundState {
    fn new() -> Self {
        let settings = GameSettings::default();
        Self {
            phase: Phase::Idle,
            settings,
            songs: Vec::new(),
            current: None,
            remaining_secs: f64::from(settings.clip_duration_secs),
            score: 0,
            lives: settings.starting_lives,
            feedback: None,
            revealed: None,
            generation: 0,
            awaiting_name: false,
            scheduler: RoundScheduler::new(),
            rng: StdRng::from_entropy(),
        }
    }

    fn clip_secs(&self) -> f64 {
        f64::from(self.settings.clip_duration_secs)
    }
}

struct Shared<A> {
    audio: A,
    timing: GameConfig,
    state: Mutex<RoundState>,
    /// A score submission is awaiting the store; kept outside `state` so a
    /// dropped submission can clear it without the async lock
    submitting: AtomicBool,
}

/// Clears the submission flag when the submission ends, including when its
/// future is dropped mid-await
struct SubmissionGuard<'a>(&'a AtomicBool);

impl<'a> SubmissionGuard<'a> {
    /// `None` when another submission holds the flag
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to one quiz session; cheap to clone
pub struct RoundEngine<A: AudioSink> {
    shared: Arc<Shared<A>>,
}

impl<A: AudioSink> Clone for RoundEngine<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: AudioSink> RoundEngine<A> {
    pub fn new(audio: A, timing: GameConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                audio,
                timing,
                state: Mutex::new(RoundState::new()),
                submitting: AtomicBool::new(false),
            }),
        }
    }

    pub fn audio(&self) -> &A {
        &self.shared.audio
    }

    /// Reset score and lives and start the first round
    ///
    /// Fails closed on an empty catalog: the engine stays where it was.
    pub async fn start_game(
        &self,
        settings: GameSettings,
        catalog: &Catalog,
    ) -> Result<(), EngineError> {
        let mut st = self.shared.state.lock().await;

        if matches!(st.phase, Phase::Playing | Phase::RoundResolving) {
            return Err(EngineError::GameInProgress);
        }

        let songs = catalog.flatten();
        if songs.is_empty() {
            warn!("Cannot start game: catalog has no songs");
            return Err(EngineError::EmptyCatalog);
        }

        info!(
            "Starting game: duration={}s lives={} ({} songs)",
            settings.clip_duration_secs,
            settings.starting_lives,
            songs.len()
        );

        st.settings = settings;
        st.songs = songs;
        st.score = 0;
        st.lives = settings.starting_lives;
        st.feedback = None;
        st.revealed = None;
        st.awaiting_name = false;
        st.phase = Phase::Playing;

        self.select_next_song(&mut st);
        Ok(())
    }

    /// Judge a guess against the current song
    pub async fn submit_guess(&self, text: &str) -> GuessOutcome {
        let mut st = self.shared.state.lock().await;

        if text.trim().is_empty() || st.phase != Phase::Playing {
            return GuessOutcome::Ignored;
        }
        let Some(current) = st.current.as_ref() else {
            return GuessOutcome::Ignored;
        };

        if current.style.accepts(text) {
            st.score += 1;
            debug!("Correct guess '{}', score {}", text.trim(), st.score);
            self.advance_generation(&mut st);
            st.phase = Phase::RoundResolving;
            st.feedback = Some(Feedback::Correct);
            let delay = self.shared.timing.correct_advance();
            self.schedule(&mut st, delay, RoundTask::NextSong);
            GuessOutcome::Correct
        } else {
            st.feedback = Some(Feedback::Wrong);
            GuessOutcome::Wrong
        }
    }

    /// End the game now, regardless of lives
    ///
    /// Returns false when there was no game to end.
    pub async fn quit(&self) -> bool {
        let mut st = self.shared.state.lock().await;
        if matches!(st.phase, Phase::Playing | Phase::RoundResolving) {
            info!("Game quit with score {}", st.score);
            self.enter_game_over(&mut st);
            true
        } else {
            false
        }
    }

    /// Playback failure reported by the audio device for round `round`
    ///
    /// Stale reports (older round, or round no longer playing) are ignored.
    pub async fn report_playback_failure(&self, round: u64, reason: &str) -> bool {
        let mut st = self.shared.state.lock().await;
        if st.generation != round || st.phase != Phase::Playing {
            debug!(
                "Ignoring playback failure for round {} (current round {}, {:?})",
                round, st.generation, st.phase
            );
            return false;
        }
        let url = st.current.as_ref().map(|c| c.url.clone()).unwrap_or_default();
        warn!("Playback failed for {}: {}", url, reason);
        self.skip_after_playback_failure(&mut st);
        true
    }

    /// Save the final score under `name`
    ///
    /// A blank name is a silent no-op. On store failure the engine stays in
    /// GameOver and the error is returned so the caller can retry.
    pub async fn submit_score(
        &self,
        name: &str,
        store: &dyn ScoreStore,
    ) -> Result<SubmitOutcome, EngineError> {
        let (entry, generation, _guard) = {
            let st = self.shared.state.lock().await;
            if st.phase != Phase::GameOver || !st.awaiting_name {
                return Ok(SubmitOutcome::Skipped);
            }
            if name.trim().is_empty() {
                return Ok(SubmitOutcome::Skipped);
            }
            let entry = NewScore::new(
                name,
                i64::from(st.score),
                st.settings.starting_lives.as_raw(),
                i64::from(st.settings.clip_duration_secs),
            )
            .map_err(|e| EngineError::InvalidScore(e.to_string()))?;
            let Some(guard) = SubmissionGuard::acquire(&self.shared.submitting) else {
                return Ok(SubmitOutcome::Skipped);
            };
            (entry, st.generation, guard)
        };

        let saved = store.submit_score(&entry).await?;

        let mut st = self.shared.state.lock().await;

        if st.generation == generation && st.phase == Phase::GameOver {
            st.phase = Phase::Idle;
            st.awaiting_name = false;
            st.feedback = Some(Feedback::Saved);
        }
        Ok(SubmitOutcome::Saved(saved))
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        let st = self.shared.state.lock().await;
        let clip = st.clip_secs();
        let song = match st.phase {
            Phase::Playing | Phase::RoundResolving => st.current.as_ref().map(|c| SongCue {
                url: c.url.clone(),
                start_time: c.start_offset_secs,
            }),
            Phase::Idle | Phase::GameOver => None,
        };

        RoundSnapshot {
            phase: st.phase,
            round: st.generation,
            score: st.score,
            lives: st.lives,
            starting_lives: st.settings.starting_lives,
            duration: st.settings.clip_duration_secs,
            difficulty: Difficulty::from_duration(st.settings.clip_duration_secs),
            timer: st.remaining_secs.max(0.0).ceil() as u32,
            progress: if clip > 0.0 { st.remaining_secs / clip * 100.0 } else { 0.0 },
            song,
            revealed_style: st.revealed.clone(),
            feedback: st.feedback.clone().map(|feedback| FeedbackView {
                message: feedback.message(),
                feedback,
            }),
            awaiting_name: st.awaiting_name,
        }
    }

    pub async fn phase(&self) -> Phase {
        self.shared.state.lock().await.phase
    }

    /// Song of the current round, including its style
    pub async fn current_song(&self) -> Option<CurrentSong> {
        self.shared.state.lock().await.current.clone()
    }

    /// Stop audio and cancel every pending timer without changing the phase
    pub async fn shutdown(&self) {
        let mut st = self.shared.state.lock().await;
        self.shared.audio.stop();
        st.generation += 1;
        st.scheduler.cancel_all();
    }

    // ------------------------------------------------------------------
    // Transitions (state lock held)
    // ------------------------------------------------------------------

    /// Stop audio, start a new round generation and abort older timers
    fn advance_generation(&self, st: &mut RoundState) {
        self.shared.audio.stop();
        st.generation += 1;
        let aborted = st.scheduler.cancel_before(st.generation);
        if aborted > 0 {
            debug!("Round {}: cancelled {} stale timers", st.generation, aborted);
        }
    }

    fn select_next_song(&self, st: &mut RoundState) {
        if matches!(st.phase, Phase::Idle | Phase::GameOver) {
            return;
        }
        self.advance_generation(st);

        let Some(song) = st.songs.choose(&mut st.rng).cloned() else {
            warn!("No songs to select; ending game");
            self.enter_game_over(st);
            st.feedback = Some(Feedback::NoSongs);
            return;
        };

        let offset = f64::from(pick_start_offset(&mut st.rng, &self.shared.timing));
        debug!(
            "Round {}: {} from {:.0}s",
            st.generation, song.url, offset
        );

        st.current = Some(CurrentSong {
            url: song.url.clone(),
            style: song.style,
            start_offset_secs: offset,
        });
        st.remaining_secs = st.clip_secs();
        st.feedback = None;
        st.revealed = None;
        st.phase = Phase::Playing;

        match self.shared.audio.play(&song.url, offset) {
            Ok(()) => self.start_ticker(st),
            Err(e) => {
                warn!("{}", e);
                self.skip_after_playback_failure(st);
            }
        }
    }

    fn skip_after_playback_failure(&self, st: &mut RoundState) {
        self.advance_generation(st);
        st.phase = Phase::RoundResolving;
        st.feedback = Some(Feedback::PlaybackFailed);
        let delay = self.shared.timing.playback_retry();
        self.schedule(st, delay, RoundTask::NextSong);
    }

    /// Recompute the countdown; returns whether the round is still playing
    fn tick(&self, st: &mut RoundState) -> bool {
        if st.phase != Phase::Playing {
            return false;
        }
        let Some(start) = st.current.as_ref().map(|c| c.start_offset_secs) else {
            return false;
        };

        let position = self.shared.audio.position_secs().unwrap_or(start);
        let elapsed = (position - start).max(0.0);
        st.remaining_secs = (st.clip_secs() - elapsed).max(0.0);

        if st.remaining_secs <= 0.0 {
            self.on_time_expired(st);
            false
        } else {
            true
        }
    }

    fn on_time_expired(&self, st: &mut RoundState) {
        self.advance_generation(st);

        let answer = st
            .current
            .as_ref()
            .map(|c| c.style.primary().to_string())
            .unwrap_or_default();
        st.revealed = Some(answer.clone());
        st.remaining_secs = 0.0;

        // decrement first, then check
        st.lives.lose_one();
        debug!("Time expired (answer '{}'), lives now {}", answer, st.lives);

        if st.lives.is_exhausted() {
            self.enter_game_over(st);
        } else {
            st.phase = Phase::RoundResolving;
            st.feedback = Some(Feedback::TimeUp { answer });
            let delay = self.shared.timing.reveal_advance();
            self.schedule(st, delay, RoundTask::NextSong);
        }
    }

    fn enter_game_over(&self, st: &mut RoundState) {
        self.advance_generation(st);
        st.phase = Phase::GameOver;
        st.awaiting_name = true;
        st.feedback = Some(Feedback::GameOver);
        info!("Game over with score {}", st.score);
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn weak(&self) -> Weak<Shared<A>> {
        Arc::downgrade(&self.shared)
    }

    fn start_ticker(&self, st: &mut RoundState) {
        let generation = st.generation;
        let period = self.shared.timing.tick_interval();
        let weak = self.weak();

        st.scheduler.spawn(generation, async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                let engine = RoundEngine { shared };
                if !engine.fire(generation, RoundTask::Tick).await {
                    break;
                }
            }
        });
    }

    fn schedule(&self, st: &mut RoundState, delay: Duration, task: RoundTask) {
        let generation = st.generation;
        let weak = self.weak();

        st.scheduler.spawn(generation, async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                RoundEngine { shared }.fire(generation, task).await;
            }
        });
    }

    /// Run a scheduled task if its round is still current
    ///
    /// Returns whether a repeating task should keep running.
    async fn fire(&self, generation: u64, task: RoundTask) -> bool {
        let mut st = self.shared.state.lock().await;
        if st.generation != generation {
            return false;
        }
        match task {
            RoundTask::Tick => self.tick(&mut st),
            RoundTask::NextSong => {
                self.select_next_song(&mut st);
                false
            }
        }
    }
}
