//! Consent operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{parse_datetime, ensure_user, Database};
use crate::error::Result;
use crate::models::{Consent, ConsentStatus};

pub(super) fn upsert(conn: &Connection, user_id: &str, status: ConsentStatus, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO consent (user_id, status, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
        params![user_id, status.as_str(), at.to_rfc3339()],
    )?;
    Ok(())
}

impl Database {
    /// Record a user's consent decision
    pub fn set_consent(&self, user_id: &str, status: ConsentStatus) -> Result<Consent> {
        let updated_at = Utc::now();
        self.with_retry(|conn| {
            ensure_user(conn, user_id)?;
            upsert(conn, user_id, status, updated_at)
        })?;

        info!(user_id, status = %status, "Consent updated");
        Ok(Consent {
            user_id: user_id.to_string(),
            status,
            updated_at,
        })
    }

    /// Current consent record, if the user ever made a decision
    pub fn get_consent(&self, user_id: &str) -> Result<Option<Consent>> {
        self.with_retry(|conn| {
            let row = conn
                .query_row(
                    "SELECT status, updated_at FROM consent WHERE user_id = ?",
                    params![user_id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            // An unreadable status is treated as no consent at all
            Ok(row.and_then(|(status, updated_at)| {
                status.parse().ok().map(|status| Consent {
                    user_id: user_id.to_string(),
                    status,
                    updated_at: parse_datetime(&updated_at),
                })
            }))
        })
    }
}
