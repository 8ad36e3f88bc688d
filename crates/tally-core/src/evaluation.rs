//! Offline evaluation over a set of users
//!
//! Runs the deterministic pipeline (signals, persona, recommendations) for
//! each user and reports coverage, explainability, auditability and latency.

use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TallyConfig;
use crate::db::FinancialStore;
use crate::error::Result;
use crate::models::{Account, AccountType, Category, Transaction, Window};
use crate::persona::PersonaKey;
use crate::profile::profile_for_window;
use crate::recommend::{recommendations_for, RecommendationContext};
use crate::signals::Signals;

/// Window the evaluation runs over
pub const EVALUATION_WINDOW: Window = Window::Days30;

/// Metrics for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: String,
    pub window_days: i64,
    pub persona: PersonaKey,
    pub coverage: bool,
    pub explainability: bool,
    pub auditability: bool,
    pub latency_ms: u64,
}

/// Aggregate metrics; percentages are rounded to whole numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub count: usize,
    pub coverage: u32,
    pub explainability: u32,
    pub auditability: u32,
    pub latency_p95_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub per_user: Vec<UserMetrics>,
    pub summary: EvaluationSummary,
}

/// Core signal families with data behind them in the evaluation window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DataFamilies {
    subscriptions: bool,
    savings: bool,
    credit: bool,
    income: bool,
}

impl DataFamilies {
    fn observe(accounts: &[Account], window: &[Transaction], signals: &Signals) -> Self {
        Self {
            subscriptions: signals.subscription_count > 0,
            savings: accounts.iter().any(|a| a.account_type.is_savings_like()),
            credit: accounts.iter().any(|a| a.account_type == AccountType::Credit),
            income: window
                .iter()
                .any(|t| t.pfc_primary == Category::Income && t.amount > 0.0),
        }
    }

    fn count(&self) -> usize {
        [self.subscriptions, self.savings, self.credit, self.income]
            .iter()
            .filter(|&&present| present)
            .count()
    }
}

/// Evaluate each user as of a date
pub fn evaluate<S: FinancialStore + ?Sized>(
    store: &S,
    users: &[String],
    as_of: NaiveDate,
    config: &TallyConfig,
) -> Result<EvaluationReport> {
    let mut per_user = Vec::with_capacity(users.len());

    for user_id in users {
        let started = Instant::now();

        let profile = profile_for_window(store, user_id, EVALUATION_WINDOW, as_of, config)?;
        let accounts = store.accounts(user_id)?;
        let (since, until) = EVALUATION_WINDOW.current_range(as_of);
        let window = store.transactions_between(user_id, since, until)?;
        let families = DataFamilies::observe(&accounts, &window, &profile.signals);
        let ctx = RecommendationContext {
            last4: accounts
                .iter()
                .find(|a| a.account_type == AccountType::Credit)
                .and_then(|a| a.last4()),
            has_aml_alerts: false,
        };
        let items = recommendations_for(profile.persona.key, &profile.signals, &ctx)?;

        let latency_ms = started.elapsed().as_millis() as u64;

        let auditability = profile.trace.signals.is_finite()
            && profile
                .trace
                .to_json()
                .ok()
                .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
                .is_some();

        let metrics = UserMetrics {
            user_id: user_id.clone(),
            window_days: EVALUATION_WINDOW.days(),
            persona: profile.persona.key,
            coverage: families.count() >= 3,
            explainability: items.iter().all(|i| !i.rationale.trim().is_empty()),
            auditability,
            latency_ms,
        };
        debug!(user_id = %user_id, persona = %metrics.persona, ?families, latency_ms, "Evaluated user");
        per_user.push(metrics);
    }

    let summary = summarize(&per_user);
    info!(
        count = summary.count,
        coverage = summary.coverage,
        explainability = summary.explainability,
        auditability = summary.auditability,
        latency_p95_ms = summary.latency_p95_ms,
        "Evaluation complete"
    );

    Ok(EvaluationReport { per_user, summary })
}

/// Aggregate per-user metrics
pub fn summarize(metrics: &[UserMetrics]) -> EvaluationSummary {
    let n = metrics.len();
    let pct = |hits: usize| -> u32 {
        if n == 0 {
            0
        } else {
            (100.0 * hits as f64 / n as f64).round() as u32
        }
    };

    let mut latencies: Vec<u64> = metrics.iter().map(|m| m.latency_ms).collect();
    latencies.sort_unstable();
    let p95_index = (0.95 * n as f64).floor() as usize;

    EvaluationSummary {
        count: n,
        coverage: pct(metrics.iter().filter(|m| m.coverage).count()),
        explainability: pct(metrics.iter().filter(|m| m.explainability).count()),
        auditability: pct(metrics.iter().filter(|m| m.auditability).count()),
        latency_p95_ms: latencies.get(p95_index).copied().unwrap_or(0),
    }
}
