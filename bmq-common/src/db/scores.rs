//! Score store
//!
//! Append-only leaderboard. Reads are ordered by score descending with ties
//! kept in submission order.

use crate::models::{Lives, NewScore, ScoreEntry, ScoreFilter};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Durable record of completed games
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Append one entry. Never reorders or deduplicates.
    async fn submit_score(&self, score: &NewScore) -> Result<ScoreEntry>;

    /// At most `limit` entries matching `filter`, best first
    async fn list_top_scores(&self, limit: u32, filter: ScoreFilter) -> Result<Vec<ScoreEntry>>;
}

/// [`ScoreStore`] over the `leaderboard` table
#[derive(Debug, Clone)]
pub struct SqliteScoreStore {
    pool: SqlitePool,
}

impl SqliteScoreStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

type ScoreRow = (i64, String, i64, i64, i64, DateTime<Utc>);

fn entry_from_row(row: ScoreRow) -> Result<ScoreEntry> {
    let (id, name, score, lives, duration, created_at) = row;
    let score = u32::try_from(score)
        .map_err(|_| Error::Internal(format!("leaderboard row {} has invalid score {}", id, score)))?;
    let duration = u32::try_from(duration).map_err(|_| {
        Error::Internal(format!("leaderboard row {} has invalid duration {}", id, duration))
    })?;
    let lives = Lives::from_raw(lives)
        .map_err(|e| Error::Internal(format!("leaderboard row {}: {}", id, e)))?;

    Ok(ScoreEntry {
        id,
        name,
        score,
        lives,
        duration,
        created_at,
    })
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn submit_score(&self, score: &NewScore) -> Result<ScoreEntry> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO leaderboard (name, score, lives, duration, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&score.name)
        .bind(i64::from(score.score))
        .bind(score.lives.as_raw())
        .bind(i64::from(score.duration))
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(
            "Saved score {} for '{}' (lives={}, duration={}s)",
            score.score, score.name, score.lives, score.duration
        );

        Ok(ScoreEntry {
            id,
            name: score.name.clone(),
            score: score.score,
            lives: score.lives,
            duration: score.duration,
            created_at,
        })
    }

    async fn list_top_scores(&self, limit: u32, filter: ScoreFilter) -> Result<Vec<ScoreEntry>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT id, name, score, lives, duration, created_at
            FROM leaderboard
            WHERE (?1 IS NULL OR lives = ?1)
              AND (?2 IS NULL OR duration = ?2)
            ORDER BY score DESC, id ASC
            LIMIT ?3
            "#,
        )
        .bind(filter.lives.map(Lives::as_raw))
        .bind(filter.duration.map(i64::from))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        debug!("Leaderboard query returned {} rows", rows.len());
        rows.into_iter().map(entry_from_row).collect()
    }
}
