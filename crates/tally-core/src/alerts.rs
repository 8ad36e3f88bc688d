//! Educational AML-pattern heuristics
//!
//! Flags transaction sequences that resemble known typologies so a human can
//! take a look. Nothing here is a determination of wrongdoing.
//!
//! Two independent detectors run over the trailing window:
//! - Concentrated transfer volume to one counterparty
//! - Days with substantial money both arriving and leaving

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AmlConfig;
use crate::models::{Category, Transaction, Window};

/// Shown alongside any AML-pattern alert
pub const AML_EDU_DISCLOSURE: &str = "Potential AML-like pattern detected. This is not a determination of wrongdoing, nor legal or financial advice.";

/// Alert strings for one user's transactions over the window ending at `as_of`
///
/// The window is `(as_of - days, as_of]`. Returns zero, one or two alerts.
pub fn aml_educational_alerts(
    transactions: &[Transaction],
    window: Window,
    as_of: NaiveDate,
    config: &AmlConfig,
) -> Vec<String> {
    let since = as_of - Duration::days(window.days());
    let in_window: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.date > since && t.date <= as_of)
        .collect();

    let mut alerts = Vec::new();

    if let Some(count) = concentrated_transfers(&in_window, config) {
        alerts.push(format!(
            "High volume of transfers ({}) to a single counterparty in {}d.",
            count,
            window.days()
        ));
    }

    let days = same_day_in_out_days(&in_window, config.same_day_min_amount);
    if days >= config.same_day_threshold(window) {
        alerts.push(format!(
            "{} days with same-day in/out flows of substantial amounts.",
            days
        ));
    }

    debug!(window = %window, alerts = alerts.len(), "AML heuristics evaluated");
    alerts
}

/// Largest transfer count to one attributable counterparty, if it meets the threshold
fn concentrated_transfers(transactions: &[&Transaction], config: &AmlConfig) -> Option<usize> {
    let savings_label = config.savings_label.to_lowercase();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|t| t.pfc_primary == Category::Transfer && t.amount < 0.0)
    {
        if tx.merchant.to_lowercase().contains(&savings_label) {
            continue;
        }
        let key = tx.counterparty_key();
        if key == "unknown" || key.to_lowercase().contains("transfer") {
            continue;
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    counts
        .into_values()
        .max()
        .filter(|&count| count >= config.transfer_counterparty_min)
}

/// Days on which both a qualifying inflow and a qualifying outflow occurred
fn same_day_in_out_days(transactions: &[&Transaction], min_amount: f64) -> usize {
    let mut inflow_days = BTreeSet::new();
    let mut outflow_days = BTreeSet::new();

    for tx in transactions.iter().filter(|t| t.amount.abs() > min_amount) {
        if tx.amount > 0.0 {
            inflow_days.insert(tx.date);
        } else {
            outflow_days.insert(tx.date);
        }
    }

    inflow_days.intersection(&outflow_days).count()
}

/// Severity derived from the total alert count across both windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    None,
    Informational,
    Elevated,
}

impl AlertSeverity {
    pub fn classify(total_alerts: usize, elevated_at: usize) -> Self {
        if total_alerts == 0 {
            Self::None
        } else if total_alerts >= elevated_at {
            Self::Elevated
        } else {
            Self::Informational
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Informational => "informational",
            Self::Elevated => "elevated",
        }
    }

    /// Elevated alerts are queued for human review
    pub fn needs_review(&self) -> bool {
        matches!(self, Self::Elevated)
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alerts for both windows with the derived severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub alerts_30: Vec<String>,
    pub alerts_180: Vec<String>,
    pub severity: AlertSeverity,
    /// Present only when there is at least one alert
    pub disclosure: Option<String>,
}

impl AlertReport {
    pub fn build(transactions: &[Transaction], as_of: NaiveDate, config: &AmlConfig) -> Self {
        let alerts_30 = aml_educational_alerts(transactions, Window::Days30, as_of, config);
        let alerts_180 = aml_educational_alerts(transactions, Window::Days180, as_of, config);
        let total = alerts_30.len() + alerts_180.len();
        let severity = AlertSeverity::classify(total, config.elevated_alert_count);

        Self {
            alerts_30,
            alerts_180,
            severity,
            disclosure: (total > 0).then(|| AML_EDU_DISCLOSURE.to_string()),
        }
    }

    pub fn total(&self) -> usize {
        self.alerts_30.len() + self.alerts_180.len()
    }

    pub fn has_alerts(&self) -> bool {
        self.total() > 0
    }

    /// All alerts, 30-day first
    pub fn all(&self) -> Vec<&str> {
        self.alerts_30
            .iter()
            .chain(self.alerts_180.iter())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentChannel;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn tx(days_ago: i64, amount: f64, merchant: &str, entity: Option<&str>, category: Category) -> Transaction {
        Transaction {
            id: 0,
            user_id: "u1".to_string(),
            account_id: "chk".to_string(),
            date: as_of() - Duration::days(days_ago),
            amount,
            merchant: merchant.to_string(),
            merchant_entity_id: entity.map(str::to_string),
            payment_channel: PaymentChannel::Online,
            pfc_primary: category,
            pending: false,
        }
    }

    fn transfers(n: i64, merchant: &str) -> Vec<Transaction> {
        (0..n)
            .map(|i| tx(i * 2, -700.0, merchant, None, Category::Transfer))
            .collect()
    }

    fn in_out_days(n: i64) -> Vec<Transaction> {
        (0..n)
            .flat_map(|i| {
                [
                    tx(i, 600.0, "Payroll", None, Category::Income),
                    tx(i, -600.0, "Exchange", None, Category::Other),
                ]
            })
            .collect()
    }

    #[test]
    fn test_transfer_threshold_is_ten() {
        let config = AmlConfig::default();
        let alerts = aml_educational_alerts(&transfers(10, "Acme Holdings"), Window::Days30, as_of(), &config);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("10"));

        let below = aml_educational_alerts(&transfers(9, "Acme Holdings"), Window::Days30, as_of(), &config);
        assert!(below.is_empty());
    }

    #[test]
    fn test_savings_and_generic_transfers_excluded() {
        let config = AmlConfig::default();
        assert!(aml_educational_alerts(&transfers(12, "My SAVINGS Account"), Window::Days30, as_of(), &config).is_empty());
        assert!(aml_educational_alerts(&transfers(12, "Online Transfer"), Window::Days30, as_of(), &config).is_empty());
        assert!(aml_educational_alerts(&transfers(12, ""), Window::Days30, as_of(), &config).is_empty());
    }

    #[test]
    fn test_counterparty_prefers_entity_id() {
        let config = AmlConfig::default();
        let txs: Vec<Transaction> = (0..10)
            .map(|i| {
                let name = format!("Wire {}", i);
                tx(i, -800.0, &name, Some("ent_offshore"), Category::Transfer)
            })
            .collect();
        assert_eq!(aml_educational_alerts(&txs, Window::Days30, as_of(), &config).len(), 1);
    }

    #[test]
    fn test_same_day_threshold_for_30_days() {
        let config = AmlConfig::default();
        let alerts = aml_educational_alerts(&in_out_days(10), Window::Days30, as_of(), &config);
        assert_eq!(alerts, vec!["10 days with same-day in/out flows of substantial amounts.".to_string()]);

        assert!(aml_educational_alerts(&in_out_days(9), Window::Days30, as_of(), &config).is_empty());
    }

    #[test]
    fn test_same_day_threshold_scales_with_window() {
        let config = AmlConfig::default();
        // 10 qualifying days trip the 30-day window but not the 180-day one
        assert!(aml_educational_alerts(&in_out_days(10), Window::Days180, as_of(), &config).is_empty());
        assert_eq!(aml_educational_alerts(&in_out_days(25), Window::Days180, as_of(), &config).len(), 1);
    }

    #[test]
    fn test_small_flows_do_not_qualify() {
        let config = AmlConfig::default();
        let txs: Vec<Transaction> = (0..15)
            .flat_map(|i| {
                [
                    tx(i, 500.0, "Payroll", None, Category::Income),
                    tx(i, -900.0, "Rent", None, Category::Bills),
                ]
            })
            .collect();
        assert!(aml_educational_alerts(&txs, Window::Days30, as_of(), &config).is_empty());
    }

    #[test]
    fn test_window_excludes_old_transactions() {
        let config = AmlConfig::default();
        let txs: Vec<Transaction> = (0..10)
            .map(|i| tx(30 + i, -700.0, "Acme Holdings", None, Category::Transfer))
            .collect();
        assert!(aml_educational_alerts(&txs, Window::Days30, as_of(), &config).is_empty());
        assert_eq!(aml_educational_alerts(&txs, Window::Days180, as_of(), &config).len(), 1);
    }

    #[test]
    fn test_detectors_are_independent() {
        let config = AmlConfig::default();
        let mut txs = transfers(10, "Acme Holdings");
        txs.extend(in_out_days(10));
        assert_eq!(aml_educational_alerts(&txs, Window::Days30, as_of(), &config).len(), 2);
    }

    #[test]
    fn test_severity_classification() {
        assert_eq!(AlertSeverity::classify(0, 3), AlertSeverity::None);
        assert_eq!(AlertSeverity::classify(1, 3), AlertSeverity::Informational);
        assert_eq!(AlertSeverity::classify(2, 3), AlertSeverity::Informational);
        assert_eq!(AlertSeverity::classify(3, 3), AlertSeverity::Elevated);
        assert!(AlertSeverity::Elevated.needs_review());
        assert!(!AlertSeverity::Informational.needs_review());
    }

    #[test]
    fn test_report_sums_both_windows() {
        let config = AmlConfig::default();
        let mut txs = transfers(10, "Acme Holdings");
        txs.extend(in_out_days(10));

        let report = AlertReport::build(&txs, as_of(), &config);
        // Both detectors fire for 30 days; only the transfer detector for 180
        assert_eq!(report.alerts_30.len(), 2);
        assert_eq!(report.alerts_180.len(), 1);
        assert_eq!(report.severity, AlertSeverity::Elevated);
        assert_eq!(report.disclosure.as_deref(), Some(AML_EDU_DISCLOSURE));

        let quiet = AlertReport::build(&[], as_of(), &config);
        assert_eq!(quiet.severity, AlertSeverity::None);
        assert!(quiet.disclosure.is_none());
        assert!(!quiet.has_alerts());
    }
}
