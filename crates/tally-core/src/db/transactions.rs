//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use super::{parse_date, Database};
use crate::error::Result;
use crate::models::{Category, PaymentChannel, Transaction};

const SELECT_COLUMNS: &str = "SELECT id, user_id, account_id, date, amount, merchant, merchant_entity_id,
                                     payment_channel, pfc_primary, pending
                              FROM transactions";

/// Insert a transaction, keeping its id when the snapshot carries one
///
/// Ids are scoped to the user; a missing id becomes the user's next free one.
pub(super) fn insert(conn: &Connection, user_id: &str, tx: &Transaction) -> Result<i64> {
    let id = (tx.id > 0).then_some(tx.id);
    let id = conn.query_row(
        "INSERT OR REPLACE INTO transactions
            (id, user_id, account_id, date, amount, merchant, merchant_entity_id, payment_channel, pfc_primary, pending)
         VALUES (
            COALESCE(?1, (SELECT IFNULL(MAX(id), 0) + 1 FROM transactions WHERE user_id = ?2)),
            ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         RETURNING id",
        params![
            id,
            user_id,
            tx.account_id,
            tx.date.format("%Y-%m-%d").to_string(),
            tx.amount,
            tx.merchant,
            tx.merchant_entity_id,
            tx.payment_channel.as_str(),
            tx.pfc_primary.as_str(),
            tx.pending,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(3)?;
    let channel_str: String = row.get(7)?;
    let category_str: String = row.get(8)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        date: parse_date(3, &date_str)?,
        amount: row.get(4)?,
        merchant: row.get(5)?,
        merchant_entity_id: row.get(6)?,
        payment_channel: channel_str.parse().unwrap_or(PaymentChannel::Other),
        pfc_primary: category_str.parse().unwrap_or(Category::Other),
        pending: row.get(9)?,
    })
}

/// Transactions for a user, optionally bounded by an inclusive date range
pub(super) fn between(
    conn: &Connection,
    user_id: &str,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<Transaction>> {
    let txs = match range {
        Some((from, to)) => {
            let sql = format!("{} WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date, id", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    user_id,
                    from.format("%Y-%m-%d").to_string(),
                    to.format("%Y-%m-%d").to_string()
                ],
                from_row,
            )?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("{} WHERE user_id = ? ORDER BY date, id", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id], from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(txs)
}

impl Database {
    /// Number of transactions stored for a user
    pub fn count_transactions(&self, user_id: &str) -> Result<i64> {
        self.with_retry(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
