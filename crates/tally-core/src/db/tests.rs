//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaKey;
    use crate::signals::Signals;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(id: &str, account_type: AccountType, balance: f64, limit: Option<f64>) -> Account {
        Account {
            id: id.to_string(),
            user_id: "u1".to_string(),
            account_type,
            balance_current: balance,
            credit_limit: limit,
            number_masked: Some("xxxx4321".to_string()),
        }
    }

    fn transaction(date: NaiveDate, amount: f64, merchant: &str) -> Transaction {
        Transaction {
            id: 0,
            user_id: "u1".to_string(),
            account_id: "chk".to_string(),
            date,
            amount,
            merchant: merchant.to_string(),
            merchant_entity_id: None,
            payment_channel: PaymentChannel::Online,
            pfc_primary: Category::Dining,
            pending: false,
        }
    }

    fn snapshot() -> SnapshotFile {
        let mut user = UserSnapshot::new("u1");
        user.consent = Some(ConsentStatus::OptedIn);
        user.accounts = vec![
            account("chk", AccountType::Checking, 1200.0, None),
            account("cc", AccountType::Credit, 680.0, Some(1000.0)),
        ];
        user.transactions = vec![
            transaction(date(2024, 5, 1), -12.5, "Cafe"),
            transaction(date(2024, 5, 15), -40.0, "Bistro"),
            transaction(date(2024, 6, 1), 2500.0, "Payroll"),
        ];
        user.liabilities = vec![Liability {
            user_id: "u1".to_string(),
            account_id: "cc".to_string(),
            liability_type: LiabilityType::CreditCard,
            apr_percent: 24.99,
            min_payment: 35.0,
            last_payment: 35.0,
            last_stmt_bal: 680.0,
            is_overdue: false,
        }];
        SnapshotFile { users: vec![user] }
    }

    fn profile(user_id: &str, window: Window, persona: PersonaKey) -> ProfileRecord {
        ProfileRecord {
            id: 0,
            user_id: user_id.to_string(),
            window,
            persona,
            persona_reason: "reason".to_string(),
            signals: Signals::default(),
            decision_trace: "{}".to_string(),
            trace_digest: "abc".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_users().unwrap().is_empty());
        assert!(db.path().contains("tally_test_"));
    }

    #[test]
    fn test_schema_has_expected_tables() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('users', 'accounts', 'transactions', 'liabilities', 'consent', 'profiles', 'review_items')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn test_load_snapshot_round_trips_records() {
        let db = Database::in_memory().unwrap();
        let summary = db.load_snapshot(&snapshot()).unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                users: 1,
                accounts: 2,
                transactions: 3,
                liabilities: 1
            }
        );

        assert_eq!(db.list_users().unwrap(), vec!["u1".to_string()]);

        let accounts = db.accounts("u1").unwrap();
        assert_eq!(accounts.len(), 2);
        let card = accounts.iter().find(|a| a.id == "cc").unwrap();
        assert_eq!(card.account_type, AccountType::Credit);
        assert_eq!(card.credit_limit, Some(1000.0));

        let liabilities = db.liabilities("u1").unwrap();
        assert_eq!(liabilities.len(), 1);
        assert_eq!(liabilities[0].liability_type, LiabilityType::CreditCard);
        assert!((liabilities[0].apr_percent - 24.99).abs() < 1e-9);

        let consent = db.get_consent("u1").unwrap().unwrap();
        assert_eq!(consent.status, ConsentStatus::OptedIn);
    }

    #[test]
    fn test_reload_replaces_instead_of_duplicating() {
        let db = Database::in_memory().unwrap();
        db.load_snapshot(&snapshot()).unwrap();
        db.load_snapshot(&snapshot()).unwrap();

        assert_eq!(db.count_transactions("u1").unwrap(), 3);
        assert_eq!(db.accounts("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_users_sharing_record_ids_keep_their_rows() {
        let db = Database::in_memory().unwrap();
        let users = ["alice", "bob"]
            .iter()
            .map(|&name| {
                let mut user = UserSnapshot::new(name);
                let mut chk = account("chk", AccountType::Checking, 100.0, None);
                chk.user_id = name.to_string();
                user.accounts = vec![chk];
                let mut tx = transaction(date(2024, 6, 1), -10.0, name);
                tx.id = 1;
                tx.user_id = name.to_string();
                user.transactions = vec![tx];
                user
            })
            .collect();
        db.load_snapshot(&SnapshotFile { users }).unwrap();

        for name in ["alice", "bob"] {
            let txs = db.all_transactions(name).unwrap();
            assert_eq!(txs.len(), 1, "{} lost a transaction", name);
            assert_eq!(txs[0].id, 1);
            assert_eq!(txs[0].merchant, name);
            assert_eq!(db.accounts(name).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_missing_transaction_ids_are_assigned_per_user() {
        let db = Database::in_memory().unwrap();
        let mut first = snapshot();
        let mut other = UserSnapshot::new("u2");
        let mut kiosk = transaction(date(2024, 6, 2), -5.0, "Kiosk");
        kiosk.user_id = "u2".to_string();
        other.transactions = vec![kiosk];
        first.users.push(other);
        db.load_snapshot(&first).unwrap();

        let ids: Vec<i64> = db.all_transactions("u1").unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let u2 = db.all_transactions("u2").unwrap();
        assert_eq!(u2.len(), 1);
        assert_eq!(u2[0].id, 1);
        assert_eq!(db.count_transactions("u1").unwrap(), 3);
        assert_eq!(db.count_transactions("u2").unwrap(), 1);
    }

    #[test]
    fn test_load_rejects_empty_user_id() {
        let db = Database::in_memory().unwrap();
        let file = SnapshotFile {
            users: vec![UserSnapshot::new("  ")],
        };
        assert!(matches!(db.load_snapshot(&file), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_transactions_between_is_inclusive() {
        let db = Database::in_memory().unwrap();
        db.load_snapshot(&snapshot()).unwrap();

        let txs = db
            .transactions_between("u1", date(2024, 5, 1), date(2024, 5, 15))
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].merchant, "Cafe");
        assert_eq!(txs[1].merchant, "Bistro");

        assert_eq!(db.all_transactions("u1").unwrap().len(), 3);
        assert!(db.all_transactions("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_store_matches_in_memory_snapshot() {
        let db = Database::in_memory().unwrap();
        let file = snapshot();
        db.load_snapshot(&file).unwrap();
        let user = &file.users[0];

        let from = date(2024, 5, 2);
        let to = date(2024, 6, 1);
        let from_db: Vec<f64> = db.transactions_between("u1", from, to).unwrap().iter().map(|t| t.amount).collect();
        let from_mem: Vec<f64> = user.transactions_between("u1", from, to).unwrap().iter().map(|t| t.amount).collect();
        assert_eq!(from_db, from_mem);

        // A snapshot only answers for its own user
        assert!(user.accounts("someone-else").unwrap().is_empty());
    }

    #[test]
    fn test_consent_updates() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_consent("u1").unwrap().is_none());

        db.set_consent("u1", ConsentStatus::OptedIn).unwrap();
        db.set_consent("u1", ConsentStatus::OptedOut).unwrap();

        let consent = db.get_consent("u1").unwrap().unwrap();
        assert_eq!(consent.status, ConsentStatus::OptedOut);
        assert_eq!(db.list_users().unwrap(), vec!["u1".to_string()]);
    }

    #[test]
    fn test_profiles_are_append_only() {
        let db = Database::in_memory().unwrap();

        let first = db
            .insert_profile(&profile("u1", Window::Days30, PersonaKey::SavingsBuilder))
            .unwrap();
        let second = db
            .insert_profile(&profile("u1", Window::Days30, PersonaKey::HighUtilization))
            .unwrap();
        db.insert_profile(&profile("u1", Window::Days180, PersonaKey::VariableIncome))
            .unwrap();
        assert!(second > first);

        let latest = db.latest_profile("u1", Window::Days30).unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.persona, PersonaKey::HighUtilization);
        assert_eq!(latest.signals, Signals::default());

        let history = db.list_profiles("u1").unwrap();
        assert_eq!(history.len(), 3);
        assert!(db.latest_profile("u2", Window::Days30).unwrap().is_none());
    }

    #[test]
    fn test_review_queue_lifecycle() {
        let db = Database::in_memory().unwrap();
        let profile_id = db
            .insert_profile(&profile("u1", Window::Days30, PersonaKey::SavingsBuilder))
            .unwrap();

        let a = db.enqueue_review("u1", Some(profile_id), "persona_change").unwrap();
        let b = db.enqueue_review("u1", None, "aml_alerts: x").unwrap();
        assert_eq!(db.list_pending_reviews().unwrap().len(), 2);

        let decided = db
            .decide_review(a, ReviewAction::Override, Some("false positive"))
            .unwrap();
        assert_eq!(decided.status, ReviewStatus::Overridden);
        assert_eq!(decided.notes.as_deref(), Some("false positive"));
        assert!(decided.decided_at.is_some());

        let approved = db.decide_review(b, ReviewAction::Approve, None).unwrap();
        assert_eq!(approved.status, ReviewStatus::Approved);

        assert!(db.list_pending_reviews().unwrap().is_empty());
        assert_eq!(db.list_reviews(None).unwrap().len(), 2);
    }

    #[test]
    fn test_decide_review_errors() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.decide_review(42, ReviewAction::Approve, None),
            Err(Error::NotFound(_))
        ));

        let id = db.enqueue_review("u1", None, "persona_change").unwrap();
        db.decide_review(id, ReviewAction::Approve, None).unwrap();
        assert!(matches!(
            db.decide_review(id, ReviewAction::Override, None),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_retry_gives_up_on_non_busy_errors() {
        let db = Database::in_memory().unwrap();
        let mut calls = 0;
        let result: Result<()> = db.with_retry(|_| {
            calls += 1;
            Err(Error::InvalidData("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retry_on_busy_is_bounded() {
        let db = Database::in_memory().unwrap();
        let mut calls = 0;
        let result: Result<()> = db.with_retry(|_| {
            calls += 1;
            Err(Error::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                None,
            )))
        });
        assert!(result.is_err());
        assert_eq!(calls, RETRY_ATTEMPTS);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let rfc = parse_datetime("2024-06-30T12:00:00+00:00");
        assert_eq!(rfc.format("%Y-%m-%d %H:%M").to_string(), "2024-06-30 12:00");

        let sqlite = parse_datetime("2024-06-30 08:15:00");
        assert_eq!(sqlite.format("%H:%M").to_string(), "08:15");
    }
}
