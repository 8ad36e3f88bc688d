//! Profile history and review queue operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{ensure_user, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ProfileRecord, ReviewAction, ReviewItem, ReviewStatus, Window};
use crate::persona::PersonaKey;

const PROFILE_COLUMNS: &str = "SELECT id, user_id, window_days, persona, persona_reason, signals,
                                      decision_trace, trace_digest, created_at
                               FROM profiles";

const REVIEW_COLUMNS: &str = "SELECT id, user_id, profile_id, reason, status, notes, created_at, decided_at
                              FROM review_items";

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn profile_from_row(row: &Row) -> rusqlite::Result<ProfileRecord> {
    let window_days: u32 = row.get(2)?;
    let persona_str: String = row.get(3)?;
    let signals_json: String = row.get(5)?;
    let created_at_str: String = row.get(8)?;

    Ok(ProfileRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        window: Window::try_from(window_days).map_err(|e| conversion_error(2, e))?,
        persona: persona_str
            .parse::<PersonaKey>()
            .map_err(|e| conversion_error(3, e))?,
        persona_reason: row.get(4)?,
        signals: serde_json::from_str(&signals_json)
            .map_err(|e| conversion_error(5, e.to_string()))?,
        decision_trace: row.get(6)?,
        trace_digest: row.get(7)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn review_from_row(row: &Row) -> rusqlite::Result<ReviewItem> {
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;
    let decided_at_str: Option<String> = row.get(7)?;

    Ok(ReviewItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        profile_id: row.get(2)?,
        reason: row.get(3)?,
        status: status_str.parse().unwrap_or(ReviewStatus::Pending),
        notes: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
        decided_at: decided_at_str.as_deref().map(parse_datetime),
    })
}

fn get_review(conn: &Connection, id: i64) -> Result<Option<ReviewItem>> {
    let sql = format!("{} WHERE id = ?", REVIEW_COLUMNS);
    Ok(conn.query_row(&sql, params![id], review_from_row).optional()?)
}

impl Database {
    /// Append a profile row, returning its id
    ///
    /// `record.id` and `record.created_at` are ignored; the store assigns both.
    pub fn insert_profile(&self, record: &ProfileRecord) -> Result<i64> {
        let signals_json = serde_json::to_string(&record.signals)?;
        let created_at = Utc::now().to_rfc3339();

        self.with_retry(|conn| {
            ensure_user(conn, &record.user_id)?;
            conn.execute(
                "INSERT INTO profiles
                    (user_id, window_days, persona, persona_reason, signals, decision_trace, trace_digest, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.user_id,
                    u32::from(record.window),
                    record.persona.as_str(),
                    record.persona_reason,
                    signals_json,
                    record.decision_trace,
                    record.trace_digest,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Most recent profile for a user and window
    pub fn latest_profile(&self, user_id: &str, window: Window) -> Result<Option<ProfileRecord>> {
        self.with_retry(|conn| {
            let sql = format!(
                "{} WHERE user_id = ? AND window_days = ? ORDER BY id DESC LIMIT 1",
                PROFILE_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![user_id, u32::from(window)], profile_from_row)
                .optional()?)
        })
    }

    /// Full profile history for a user, newest first
    pub fn list_profiles(&self, user_id: &str) -> Result<Vec<ProfileRecord>> {
        self.with_retry(|conn| {
            let sql = format!("{} WHERE user_id = ? ORDER BY id DESC", PROFILE_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let profiles = stmt
                .query_map(params![user_id], profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(profiles)
        })
    }

    /// Queue an item for human review, returning its id
    pub fn enqueue_review(&self, user_id: &str, profile_id: Option<i64>, reason: &str) -> Result<i64> {
        let id = self.with_retry(|conn| {
            ensure_user(conn, user_id)?;
            conn.execute(
                "INSERT INTO review_items (user_id, profile_id, reason, status, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    user_id,
                    profile_id,
                    reason,
                    ReviewStatus::Pending.as_str(),
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!(user_id, review_id = id, reason, "Review item queued");
        Ok(id)
    }

    /// Pending review items, oldest first
    pub fn list_pending_reviews(&self) -> Result<Vec<ReviewItem>> {
        self.list_reviews(Some(ReviewStatus::Pending))
    }

    /// Review items, optionally filtered by status, oldest first
    pub fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewItem>> {
        self.with_retry(|conn| {
            let items = match status {
                Some(status) => {
                    let sql = format!("{} WHERE status = ? ORDER BY id", REVIEW_COLUMNS);
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![status.as_str()], review_from_row)?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let sql = format!("{} ORDER BY id", REVIEW_COLUMNS);
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], review_from_row)?;
                    rows.collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            Ok(items)
        })
    }

    /// Record an operator decision on a pending review item
    pub fn decide_review(&self, id: i64, action: ReviewAction, notes: Option<&str>) -> Result<ReviewItem> {
        let status = action.resulting_status();

        let item = self.with_retry(|conn| {
            let existing = get_review(conn, id)?
                .ok_or_else(|| Error::NotFound(format!("review item {}", id)))?;
            if existing.status != ReviewStatus::Pending {
                return Err(Error::InvalidData(format!(
                    "review item {} is already {}",
                    id,
                    existing.status.as_str()
                )));
            }

            conn.execute(
                "UPDATE review_items SET status = ?, notes = ?, decided_at = ? WHERE id = ?",
                params![status.as_str(), notes, Utc::now().to_rfc3339(), id],
            )?;

            get_review(conn, id)?.ok_or_else(|| Error::NotFound(format!("review item {}", id)))
        })?;

        info!(review_id = id, status = status.as_str(), "Review decided");
        Ok(item)
    }
}
