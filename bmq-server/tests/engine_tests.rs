//! Round engine tests
//!
//! All tests run on a paused tokio clock: sleeping in the test advances time
//! for the engine's tickers and delayed transitions.

use async_trait::async_trait;
use bmq_common::config::GameConfig;
use bmq_common::db::ScoreStore;
use bmq_common::{Catalog, Lives, NewScore, ScoreEntry, ScoreFilter};
use bmq_server::game::{
    AudioSink, ClockedPlayback, EngineError, Feedback, GameSettings, GuessOutcome, Phase,
    PlaybackError, RoundEngine, SubmitOutcome,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// =============================================================================
// Helpers
// =============================================================================

fn ballroom_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.push("waltz", "https://music.test/audio/waltz/moon-river.mp3");
    catalog.push("tango", "https://music.test/audio/tango/por-una-cabeza.mp3");
    catalog
}

fn engine() -> RoundEngine<ClockedPlayback> {
    RoundEngine::new(ClockedPlayback::new(), GameConfig::default())
}

fn settings(duration: i64, lives: i64) -> GameSettings {
    GameSettings::new(duration, lives).unwrap()
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Records every submission; optionally fails the first few
#[derive(Default)]
struct RecordingStore {
    saved: Mutex<Vec<NewScore>>,
    failures_left: AtomicU32,
}

impl RecordingStore {
    fn failing(times: u32) -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(times),
        }
    }

    fn saved(&self) -> Vec<NewScore> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoreStore for RecordingStore {
    async fn submit_score(&self, score: &NewScore) -> bmq_common::Result<ScoreEntry> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(bmq_common::Error::Internal("disk full".to_string()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(score.clone());
        Ok(ScoreEntry {
            id: saved.len() as i64,
            name: score.name.clone(),
            score: score.score,
            lives: score.lives,
            duration: score.duration,
            created_at: chrono::Utc::now(),
        })
    }

    async fn list_top_scores(
        &self,
        _limit: u32,
        _filter: ScoreFilter,
    ) -> bmq_common::Result<Vec<ScoreEntry>> {
        Ok(Vec::new())
    }
}

/// Never finishes a submission within a test's lifetime
struct StalledStore;

#[async_trait]
impl ScoreStore for StalledStore {
    async fn submit_score(&self, _score: &NewScore) -> bmq_common::Result<ScoreEntry> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(bmq_common::Error::Internal("stalled".to_string()))
    }

    async fn list_top_scores(
        &self,
        _limit: u32,
        _filter: ScoreFilter,
    ) -> bmq_common::Result<Vec<ScoreEntry>> {
        Ok(Vec::new())
    }
}

/// Fails the first `failures` plays, then behaves like browser playback
struct FlakyAudio {
    failures_left: AtomicU32,
    plays: AtomicU32,
    inner: ClockedPlayback,
}

impl FlakyAudio {
    fn new(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            plays: AtomicU32::new(0),
            inner: ClockedPlayback::new(),
        }
    }
}

impl AudioSink for FlakyAudio {
    fn play(&self, url: &str, offset_secs: f64) -> Result<(), PlaybackError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(PlaybackError {
                url: url.to_string(),
                reason: "unsupported format".to_string(),
            });
        }
        self.inner.play(url, offset_secs)
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn position_secs(&self) -> Option<f64> {
        self.inner.position_secs()
    }
}

/// Play until the first game over (lives = 1, so one timeout)
async fn finished_game(engine: &RoundEngine<ClockedPlayback>, duration: i64) {
    engine
        .start_game(settings(duration, 1), &ballroom_catalog())
        .await
        .unwrap();
    sleep_ms(duration as u64 * 1000 + 200).await;
    assert_eq!(engine.phase().await, Phase::GameOver);
}

// =============================================================================
// Starting a game
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_game_plays_first_round() {
    let engine = engine();
    engine
        .start_game(GameSettings::default(), &ballroom_catalog())
        .await
        .unwrap();

    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert_eq!(snap.score, 0);
    assert_eq!(snap.lives, Lives::Unlimited);
    assert_eq!(snap.timer, 10);

    let song = snap.song.expect("round should have a song");
    assert!((20.0..=60.0).contains(&song.start_time));
    assert_eq!(engine.audio().position_secs(), Some(song.start_time));
}

#[tokio::test(start_paused = true)]
async fn test_empty_catalog_stays_idle() {
    let engine = engine();
    let result = engine.start_game(GameSettings::default(), &Catalog::new()).await;

    assert!(matches!(result, Err(EngineError::EmptyCatalog)));
    assert_eq!(engine.phase().await, Phase::Idle);
    assert!(engine.snapshot().await.song.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fallback_catalog_counts_as_empty() {
    let engine = engine();
    let catalog = Catalog::fallback(&["waltz", "tango"]);
    let result = engine.start_game(GameSettings::default(), &catalog).await;
    assert!(matches!(result, Err(EngineError::EmptyCatalog)));
}

#[tokio::test(start_paused = true)]
async fn test_start_while_playing_is_rejected() {
    let engine = engine();
    engine
        .start_game(GameSettings::default(), &ballroom_catalog())
        .await
        .unwrap();
    let result = engine
        .start_game(GameSettings::default(), &ballroom_catalog())
        .await;
    assert!(matches!(result, Err(EngineError::GameInProgress)));
}

#[test]
fn test_settings_validation() {
    assert!(GameSettings::new(0, 3).is_err());
    assert!(GameSettings::new(-5, 3).is_err());
    assert!(GameSettings::new(10, 0).is_err());
    assert!(GameSettings::new(10, -2).is_err());

    let s = GameSettings::new(5, -1).unwrap();
    assert_eq!(s.clip_duration_secs, 5);
    assert_eq!(s.starting_lives, Lives::Unlimited);
}

// =============================================================================
// Guessing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_correct_guess_scores_and_advances() {
    let engine = engine();
    engine
        .start_game(settings(10, 3), &ballroom_catalog())
        .await
        .unwrap();
    let first_round = engine.snapshot().await.round;
    let style = engine.current_song().await.unwrap().style;

    // case and whitespace are ignored
    let guess = format!("  {}  ", style.as_str().to_uppercase());
    assert_eq!(engine.submit_guess(&guess).await, GuessOutcome::Correct);

    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::RoundResolving);
    assert_eq!(snap.score, 1);
    assert_eq!(snap.lives, Lives::Limited(3));
    assert_eq!(snap.feedback.unwrap().message, "Correct!");

    sleep_ms(800).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert!(snap.round > first_round);
    assert!(snap.feedback.is_none());
    assert_eq!(snap.timer, 10);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_guess_costs_nothing() {
    let engine = engine();
    engine
        .start_game(settings(10, 3), &ballroom_catalog())
        .await
        .unwrap();

    assert_eq!(engine.submit_guess("polka").await, GuessOutcome::Wrong);

    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert_eq!(snap.score, 0);
    assert_eq!(snap.lives, Lives::Limited(3));
    assert_eq!(snap.feedback.unwrap().message, "Wrong! Try again.");
}

#[tokio::test(start_paused = true)]
async fn test_synonym_is_accepted() {
    let mut catalog = Catalog::new();
    catalog.push("cha-cha, cha cha, chacha", "https://music.test/audio/cha/a.mp3");

    let engine = engine();
    engine.start_game(GameSettings::default(), &catalog).await.unwrap();
    assert_eq!(engine.submit_guess("Cha Cha").await, GuessOutcome::Correct);
}

#[tokio::test(start_paused = true)]
async fn test_guesses_outside_playing_are_ignored() {
    let engine = engine();
    assert_eq!(engine.submit_guess("waltz").await, GuessOutcome::Ignored);

    engine
        .start_game(GameSettings::default(), &ballroom_catalog())
        .await
        .unwrap();
    assert_eq!(engine.submit_guess("   ").await, GuessOutcome::Ignored);

    let style = engine.current_song().await.unwrap().style;
    assert_eq!(engine.submit_guess(style.as_str()).await, GuessOutcome::Correct);
    // already resolving: a second correct guess must not score twice
    assert_eq!(engine.submit_guess(style.as_str()).await, GuessOutcome::Ignored);
    assert_eq!(engine.snapshot().await.score, 1);
}

// =============================================================================
// Timeouts and lives
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_countdown_follows_playback_position() {
    let engine = engine();
    engine
        .start_game(settings(10, -1), &ballroom_catalog())
        .await
        .unwrap();

    sleep_ms(3050).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert_eq!(snap.timer, 7);
    assert!((snap.progress - 70.0).abs() < 1.5, "progress {}", snap.progress);
}

#[tokio::test(start_paused = true)]
async fn test_single_life_timeout_ends_game() {
    let engine = engine();
    engine
        .start_game(settings(5, 1), &ballroom_catalog())
        .await
        .unwrap();

    sleep_ms(5200).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::GameOver);
    assert_eq!(snap.lives, Lives::Limited(0));
    assert!(snap.awaiting_name);
    assert!(snap.song.is_none());
    assert_eq!(engine.audio().position_secs(), None);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reveals_answer_then_advances() {
    let engine = engine();
    engine
        .start_game(settings(5, 3), &ballroom_catalog())
        .await
        .unwrap();
    let style = engine.current_song().await.unwrap().style;

    sleep_ms(5200).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::RoundResolving);
    assert_eq!(snap.lives, Lives::Limited(2));
    assert_eq!(snap.revealed_style.as_deref(), Some(style.primary()));
    assert_eq!(
        snap.feedback.unwrap().feedback,
        Feedback::TimeUp {
            answer: style.primary().to_string()
        }
    );

    sleep_ms(2500).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert!(snap.revealed_style.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_three_lives_take_three_timeouts() {
    let engine = engine();
    engine
        .start_game(settings(5, 3), &ballroom_catalog())
        .await
        .unwrap();

    // round 1 expires at 5.0s, round 2 at 12.5s, round 3 at 20.0s
    sleep_ms(5200).await;
    assert_eq!(engine.snapshot().await.lives, Lives::Limited(2));

    sleep_ms(7500).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.lives, Lives::Limited(1));
    assert_eq!(snap.phase, Phase::RoundResolving);

    sleep_ms(7500).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.lives, Lives::Limited(0));
    assert_eq!(snap.phase, Phase::GameOver);
}

#[tokio::test(start_paused = true)]
async fn test_unlimited_lives_only_end_on_quit() {
    let engine = engine();
    engine
        .start_game(settings(5, -1), &ballroom_catalog())
        .await
        .unwrap();

    sleep_ms(60_000).await;
    let snap = engine.snapshot().await;
    assert_ne!(snap.phase, Phase::GameOver);
    assert_eq!(snap.lives, Lives::Unlimited);

    assert!(engine.quit().await);
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::GameOver);
    assert!(snap.awaiting_name);
}

#[tokio::test(start_paused = true)]
async fn test_stale_timers_after_quit_do_nothing() {
    let engine = engine();
    engine
        .start_game(settings(5, 3), &ballroom_catalog())
        .await
        .unwrap();
    let style = engine.current_song().await.unwrap().style;
    engine.submit_guess(style.as_str()).await;

    // next-song timer is pending; quitting must cancel it
    assert!(engine.quit().await);
    let round = engine.snapshot().await.round;

    sleep_ms(30_000).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::GameOver);
    assert_eq!(snap.round, round);
    assert_eq!(snap.lives, Lives::Limited(3));
    assert_eq!(snap.score, 1);
    assert!(!engine.quit().await);
}

// =============================================================================
// Playback failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_playback_failure_skips_to_next_song() {
    let engine = RoundEngine::new(FlakyAudio::new(1), GameConfig::default());
    engine
        .start_game(settings(10, 1), &ballroom_catalog())
        .await
        .unwrap();

    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::RoundResolving);
    assert_eq!(snap.feedback.unwrap().feedback, Feedback::PlaybackFailed);
    // a failed clip is not a timeout
    assert_eq!(snap.lives, Lives::Limited(1));

    sleep_ms(2600).await;
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert_eq!(engine.audio().plays.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reported_playback_failure_for_current_round() {
    let engine = engine();
    engine
        .start_game(settings(10, 3), &ballroom_catalog())
        .await
        .unwrap();
    let round = engine.snapshot().await.round;

    assert!(!engine.report_playback_failure(round - 1, "stale").await);
    assert_eq!(engine.phase().await, Phase::Playing);

    assert!(engine.report_playback_failure(round, "decode error").await);
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::RoundResolving);
    assert_eq!(snap.lives, Lives::Limited(3));

    // the same report arriving twice is stale the second time
    assert!(!engine.report_playback_failure(round, "decode error").await);

    sleep_ms(2600).await;
    assert_eq!(engine.phase().await, Phase::Playing);
}

// =============================================================================
// Score submission
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_blank_name_is_skipped() {
    let engine = engine();
    finished_game(&engine, 5).await;
    let store = RecordingStore::default();

    let outcome = engine.submit_score("   ", &store).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Skipped);
    assert!(store.saved().is_empty());
    assert!(engine.snapshot().await.awaiting_name);
}

#[tokio::test(start_paused = true)]
async fn test_submit_outside_game_over_is_skipped() {
    let engine = engine();
    let store = RecordingStore::default();
    assert_eq!(
        engine.submit_score("Ada", &store).await.unwrap(),
        SubmitOutcome::Skipped
    );
}

#[tokio::test(start_paused = true)]
async fn test_submission_records_starting_settings() {
    let engine = engine();
    engine
        .start_game(settings(5, 1), &ballroom_catalog())
        .await
        .unwrap();
    let style = engine.current_song().await.unwrap().style;
    engine.submit_guess(style.as_str()).await;
    sleep_ms(5200 + 750).await;
    assert_eq!(engine.phase().await, Phase::GameOver);

    let store = RecordingStore::default();
    let outcome = engine.submit_score("  Fred  ", &store).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Saved(_)));

    let saved = store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "Fred");
    assert_eq!(saved[0].score, 1);
    // lives recorded as chosen at start, not what was left
    assert_eq!(saved[0].lives, Lives::Limited(1));
    assert_eq!(saved[0].duration, 5);

    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Idle);
    assert!(!snap.awaiting_name);
    assert_eq!(snap.feedback.unwrap().feedback, Feedback::Saved);

    // a second submission for the same game is skipped
    assert_eq!(
        engine.submit_score("Fred", &store).await.unwrap(),
        SubmitOutcome::Skipped
    );
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_keeps_game_over() {
    let engine = engine();
    finished_game(&engine, 5).await;
    let store = RecordingStore::failing(1);

    let result = engine.submit_score("Ginger", &store).await;
    assert!(matches!(result, Err(EngineError::Store(_))));
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::GameOver);
    assert!(snap.awaiting_name);

    // retry succeeds
    let outcome = engine.submit_score("Ginger", &store).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Saved(_)));
    assert_eq!(store.saved().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_game_after_saving() {
    let engine = engine();
    finished_game(&engine, 5).await;
    engine
        .submit_score("Ada", &RecordingStore::default())
        .await
        .unwrap();

    engine
        .start_game(settings(10, 3), &ballroom_catalog())
        .await
        .unwrap();
    let snap = engine.snapshot().await;
    assert_eq!(snap.phase, Phase::Playing);
    assert_eq!(snap.score, 0);
    assert_eq!(snap.lives, Lives::Limited(3));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_submission_allows_retry() {
    let engine = engine();
    finished_game(&engine, 5).await;

    // client gave up while the store was still writing
    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        engine.submit_score("Ada", &StalledStore),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(engine.phase().await, Phase::GameOver);

    let store = RecordingStore::default();
    let outcome = engine.submit_score("Ada", &store).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Saved(_)));
    assert_eq!(store.saved().len(), 1);
    assert_eq!(engine.phase().await, Phase::Idle);
}
