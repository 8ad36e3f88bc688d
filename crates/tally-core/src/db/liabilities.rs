//! Liability operations

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Liability, LiabilityType};

pub(super) fn insert(conn: &Connection, user_id: &str, liability: &Liability) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO liabilities
            (user_id, account_id, liability_type, apr_percent, min_payment, last_payment, last_stmt_bal, is_overdue)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            user_id,
            liability.account_id,
            liability.liability_type.as_str(),
            liability.apr_percent,
            liability.min_payment,
            liability.last_payment,
            liability.last_stmt_bal,
            liability.is_overdue,
        ],
    )?;
    Ok(())
}

pub(super) fn for_user(conn: &Connection, user_id: &str) -> Result<Vec<Liability>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, account_id, liability_type, apr_percent, min_payment, last_payment, last_stmt_bal, is_overdue
         FROM liabilities WHERE user_id = ? ORDER BY account_id, liability_type",
    )?;

    let liabilities = stmt
        .query_map(params![user_id], |row| {
            let type_str: String = row.get(2)?;
            Ok(Liability {
                user_id: row.get(0)?,
                account_id: row.get(1)?,
                liability_type: type_str.parse().unwrap_or(LiabilityType::Other),
                apr_percent: row.get(3)?,
                min_payment: row.get(4)?,
                last_payment: row.get(5)?,
                last_stmt_bal: row.get(6)?,
                is_overdue: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(liabilities)
}
