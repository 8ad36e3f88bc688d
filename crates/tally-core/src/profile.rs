//! Profile refresh
//!
//! Computes signals and a persona for both windows, appends the result to the
//! profile history with an audit digest, and queues human review when a
//! persona changes or AML-pattern alerts are elevated.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::alerts::AlertReport;
use crate::config::TallyConfig;
use crate::db::{Database, FinancialStore};
use crate::error::Result;
use crate::models::{ProfileRecord, Window};
use crate::persona::{assign_persona, Persona, PersonaKey};
use crate::signals::{compute_signals, Signals};

/// Review reason for a persona that differs from the previous profile
pub const REASON_PERSONA_CHANGE: &str = "persona_change";

/// The audit record for one persona decision
///
/// Serializes to flat JSON with primitive values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub persona: PersonaKey,
    pub persona_reason: String,
    pub persona_priority: u32,
    pub window_days: i64,
    pub as_of: NaiveDate,
    pub signals: Signals,
}

impl DecisionTrace {
    pub fn new(persona: &Persona, window: Window, as_of: NaiveDate, signals: &Signals) -> Self {
        Self {
            persona: persona.key,
            persona_reason: persona.reason.clone(),
            persona_priority: persona.priority,
            window_days: window.days(),
            as_of,
            signals: signals.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Hex SHA-256 of the serialized trace
    pub fn digest(&self) -> Result<String> {
        Ok(trace_digest(&self.to_json()?))
    }
}

/// Hex SHA-256 of a serialized decision trace
pub fn trace_digest(trace_json: &str) -> String {
    hex::encode(Sha256::digest(trace_json.as_bytes()))
}

/// Signals, persona and trace for one user and window
#[derive(Debug, Clone)]
pub struct WindowProfile {
    pub window: Window,
    pub signals: Signals,
    pub persona: Persona,
    pub trace: DecisionTrace,
}

/// Compute a window's profile without persisting anything
pub fn profile_for_window<S: FinancialStore + ?Sized>(
    store: &S,
    user_id: &str,
    window: Window,
    as_of: NaiveDate,
    config: &TallyConfig,
) -> Result<WindowProfile> {
    let signals = compute_signals(store, user_id, window, as_of, config)?;
    let persona = assign_persona(&signals, &config.persona);
    let trace = DecisionTrace::new(&persona, window, as_of, &signals);

    Ok(WindowProfile {
        window,
        signals,
        persona,
        trace,
    })
}

/// One persisted window profile and how it compares with the last one
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedWindow {
    pub profile_id: i64,
    pub window: Window,
    pub signals: Signals,
    pub persona: Persona,
    pub previous_persona: Option<PersonaKey>,
    pub trace_digest: String,
}

impl RefreshedWindow {
    pub fn persona_changed(&self) -> bool {
        self.previous_persona.is_some_and(|prev| prev != self.persona.key)
    }
}

/// Result of refreshing one user
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub user_id: String,
    pub as_of: NaiveDate,
    pub windows: Vec<RefreshedWindow>,
    pub alerts: AlertReport,
    /// Review items queued by this refresh
    pub review_ids: Vec<i64>,
}

/// Recomputes and persists profiles
pub struct ProfileService {
    db: Database,
    config: TallyConfig,
}

impl ProfileService {
    pub fn new(db: Database, config: TallyConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    /// Recompute both windows for a user as of a date
    ///
    /// Each call appends new profile rows; earlier rows are never modified.
    pub fn refresh(&self, user_id: &str, as_of: NaiveDate) -> Result<RefreshOutcome> {
        let mut windows = Vec::with_capacity(Window::all().len());
        let mut review_ids = Vec::new();

        for &window in Window::all() {
            let previous = self.db.latest_profile(user_id, window)?;
            let computed = profile_for_window(&self.db, user_id, window, as_of, &self.config)?;

            let trace_json = computed.trace.to_json()?;
            let digest = trace_digest(&trace_json);
            let record = ProfileRecord {
                id: 0,
                user_id: user_id.to_string(),
                window,
                persona: computed.persona.key,
                persona_reason: computed.persona.reason.clone(),
                signals: computed.trace.signals.clone(),
                decision_trace: trace_json,
                trace_digest: digest.clone(),
                created_at: Utc::now(),
            };
            let profile_id = self.db.insert_profile(&record)?;

            let refreshed = RefreshedWindow {
                profile_id,
                window,
                signals: computed.signals,
                persona: computed.persona,
                previous_persona: previous.map(|p| p.persona),
                trace_digest: digest,
            };

            if refreshed.persona_changed() {
                debug!(
                    user_id,
                    window = %window,
                    from = ?refreshed.previous_persona,
                    to = %refreshed.persona.key,
                    "Persona changed"
                );
                review_ids.push(self.db.enqueue_review(user_id, Some(profile_id), REASON_PERSONA_CHANGE)?);
            }

            windows.push(refreshed);
        }

        let transactions = self.db.all_transactions(user_id)?;
        let alerts = AlertReport::build(&transactions, as_of, &self.config.aml);
        if alerts.severity.needs_review() {
            let profile_id = windows.last().map(|w| w.profile_id);
            let reason = format!("aml_alerts: {}", alerts.all().join(" | "));
            review_ids.push(self.db.enqueue_review(user_id, profile_id, &reason)?);
        }

        info!(
            user_id,
            as_of = %as_of,
            personas = ?windows.iter().map(|w| w.persona.key.as_str()).collect::<Vec<_>>(),
            alert_severity = %alerts.severity,
            reviews = review_ids.len(),
            "Profile refreshed"
        );

        Ok(RefreshOutcome {
            user_id: user_id.to_string(),
            as_of,
            windows,
            alerts,
            review_ids,
        })
    }

    /// Refresh every known user, returning one outcome per user
    pub fn refresh_all(&self, as_of: NaiveDate) -> Result<Vec<RefreshOutcome>> {
        self.db
            .list_users()?
            .iter()
            .map(|user_id| self.refresh(user_id, as_of))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Account, AccountType, Category, Liability, LiabilityType, PaymentChannel, ReviewStatus,
        SnapshotFile, Transaction, UserSnapshot,
    };
    use chrono::Duration;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn tx(days_ago: i64, amount: f64, merchant: &str, category: Category) -> Transaction {
        Transaction {
            id: 0,
            user_id: "u1".to_string(),
            account_id: "chk".to_string(),
            date: as_of() - Duration::days(days_ago),
            amount,
            merchant: merchant.to_string(),
            merchant_entity_id: None,
            payment_channel: PaymentChannel::Online,
            pfc_primary: category,
            pending: false,
        }
    }

    fn card(balance: f64) -> (Account, Liability) {
        (
            Account {
                id: "cc".to_string(),
                user_id: "u1".to_string(),
                account_type: AccountType::Credit,
                balance_current: balance,
                credit_limit: Some(1000.0),
                number_masked: Some("4523".to_string()),
            },
            Liability {
                user_id: "u1".to_string(),
                account_id: "cc".to_string(),
                liability_type: LiabilityType::CreditCard,
                apr_percent: 22.0,
                min_payment: 25.0,
                last_payment: 100.0,
                last_stmt_bal: balance,
                is_overdue: false,
            },
        )
    }

    fn load(db: &Database, card_balance: f64, extra: Vec<Transaction>) {
        let (account, liability) = card(card_balance);
        let mut user = UserSnapshot::new("u1");
        user.accounts = vec![
            Account {
                id: "chk".to_string(),
                user_id: "u1".to_string(),
                account_type: AccountType::Checking,
                balance_current: 3000.0,
                credit_limit: None,
                number_masked: None,
            },
            account,
        ];
        user.liabilities = vec![liability];
        user.transactions = extra;
        db.load_snapshot(&SnapshotFile { users: vec![user] }).unwrap();
    }

    #[test]
    fn test_trace_digest_is_stable_sha256() {
        let persona = Persona {
            key: PersonaKey::HighUtilization,
            reason: "util_max=80%".to_string(),
            priority: 1,
        };
        let trace = DecisionTrace::new(&persona, Window::Days30, as_of(), &Signals::default());

        let digest = trace.digest().unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, trace.digest().unwrap());
        assert_eq!(digest, trace_digest(&trace.to_json().unwrap()));
    }

    #[test]
    fn test_trace_json_is_flat_primitives() {
        let persona = Persona {
            key: PersonaKey::SavingsBuilder,
            reason: "growth=3.0%".to_string(),
            priority: 5,
        };
        let json = DecisionTrace::new(&persona, Window::Days180, as_of(), &Signals::default())
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["persona"], "savings_builder");
        assert_eq!(value["window_days"], 180);
        assert_eq!(value["as_of"], "2024-06-30");
        assert!(value["signals"]["util_max"].is_number());
    }

    #[test]
    fn test_refresh_persists_both_windows() {
        let db = Database::in_memory().unwrap();
        load(&db, 800.0, vec![]);
        let service = ProfileService::new(db.clone(), TallyConfig::default());

        let outcome = service.refresh("u1", as_of()).unwrap();
        assert_eq!(outcome.windows.len(), 2);
        assert!(outcome.windows.iter().all(|w| w.persona.key == PersonaKey::HighUtilization));
        assert!(outcome.review_ids.is_empty());

        let stored = db.latest_profile("u1", Window::Days30).unwrap().unwrap();
        assert_eq!(stored.trace_digest, trace_digest(&stored.decision_trace));
        assert_eq!(db.list_profiles("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_refresh_is_append_only_and_deterministic() {
        let db = Database::in_memory().unwrap();
        load(&db, 800.0, vec![]);
        let service = ProfileService::new(db.clone(), TallyConfig::default());

        let first = service.refresh("u1", as_of()).unwrap();
        let second = service.refresh("u1", as_of()).unwrap();

        assert_eq!(db.list_profiles("u1").unwrap().len(), 4);
        assert_eq!(first.windows[0].trace_digest, second.windows[0].trace_digest);
        assert!(second.review_ids.is_empty());
    }

    #[test]
    fn test_persona_change_queues_review() {
        let db = Database::in_memory().unwrap();
        load(&db, 800.0, vec![]);
        let service = ProfileService::new(db.clone(), TallyConfig::default());
        service.refresh("u1", as_of()).unwrap();

        // Paying the card down moves the user off high utilization
        load(&db, 0.0, vec![]);
        let outcome = service.refresh("u1", as_of()).unwrap();

        assert!(outcome.windows.iter().all(|w| w.persona_changed()));
        let pending = db.list_pending_reviews().unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|r| r.reason == REASON_PERSONA_CHANGE));
        assert!(pending.iter().all(|r| r.status == ReviewStatus::Pending));
    }

    #[test]
    fn test_elevated_alerts_queue_review() {
        let db = Database::in_memory().unwrap();
        let mut txs: Vec<Transaction> = (0..10)
            .map(|i| tx(i * 2, -700.0, "Acme Holdings", Category::Transfer))
            .collect();
        txs.extend((0..10).flat_map(|i| {
            [
                tx(i, 900.0, "Payroll", Category::Income),
                tx(i, -900.0, "Exchange", Category::Other),
            ]
        }));
        load(&db, 100.0, txs);

        let service = ProfileService::new(db.clone(), TallyConfig::default());
        let outcome = service.refresh("u1", as_of()).unwrap();

        assert!(outcome.alerts.severity.needs_review());
        let pending = db.list_pending_reviews().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].reason.starts_with("aml_alerts: "));
        assert!(pending[0].reason.contains(" | "));
    }
}
