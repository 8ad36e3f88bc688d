//! Account operations

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Account, AccountType};

pub(super) fn insert(conn: &Connection, user_id: &str, account: &Account) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO accounts (id, user_id, account_type, balance_current, credit_limit, number_masked)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            account.id,
            user_id,
            account.account_type.as_str(),
            account.balance_current,
            account.credit_limit,
            account.number_masked,
        ],
    )?;
    Ok(())
}

pub(super) fn for_user(conn: &Connection, user_id: &str) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, account_type, balance_current, credit_limit, number_masked
         FROM accounts WHERE user_id = ? ORDER BY id",
    )?;

    let accounts = stmt
        .query_map(params![user_id], |row| {
            let type_str: String = row.get(2)?;
            Ok(Account {
                id: row.get(0)?,
                user_id: row.get(1)?,
                account_type: type_str.parse().unwrap_or(AccountType::Other),
                balance_current: row.get(3)?,
                credit_limit: row.get(4)?,
                number_masked: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(accounts)
}
