//! Signal extraction
//!
//! Aggregates a user's accounts, transactions and liabilities over a window
//! into a fixed set of numeric and boolean signals:
//! - Spend and recurring subscriptions (pattern-based and category-based)
//! - Savings inflow, growth and emergency cushion
//! - Credit utilization, minimum-payment and overdue flags
//! - Income cadence
//!
//! Degenerate data never errors: zero denominators produce defined defaults
//! (0 for shares and rates, 999 days for an undetectable income cadence).

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{RecurringConfig, TallyConfig};
use crate::db::FinancialStore;
use crate::error::Result;
use crate::models::{Account, AccountType, Category, Liability, LiabilityType, Transaction, Window};

/// Income gap reported when fewer than two income events exist
pub const NO_INCOME_CADENCE_DAYS: i64 = 999;

const MIN_PAY_EPSILON: f64 = 1e-6;

/// Behavioral signals for one (user, window) pair
///
/// Every field is always present and finite, so the record serializes to
/// plain JSON numbers, strings and booleans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub total_spend: f64,
    pub subscription_count: u32,
    pub monthly_recurring: f64,
    pub subscription_share: f64,
    pub net_savings_inflow: f64,
    pub savings_growth_rate: f64,
    pub emergency_months: f64,
    pub cash_buffer_months: f64,
    pub util_max: f64,
    /// Comma-joined integer percentages of the utilization levels met, e.g. "30,50"
    pub util_flags: String,
    pub min_pay_only: bool,
    pub interest_charges: bool,
    pub overdue: bool,
    pub income_median_gap: i64,
}

impl Signals {
    /// True when every numeric field is finite
    pub fn is_finite(&self) -> bool {
        [
            self.total_spend,
            self.monthly_recurring,
            self.subscription_share,
            self.net_savings_inflow,
            self.savings_growth_rate,
            self.emergency_months,
            self.cash_buffer_months,
            self.util_max,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    fn sanitized(mut self) -> Self {
        for value in [
            &mut self.total_spend,
            &mut self.monthly_recurring,
            &mut self.subscription_share,
            &mut self.net_savings_inflow,
            &mut self.savings_growth_rate,
            &mut self.emergency_months,
            &mut self.cash_buffer_months,
            &mut self.util_max,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        self
    }
}

/// Recurring cadence detected from transaction spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Monthly,
}

/// A merchant detected as recurring by spacing and amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringMerchant {
    pub merchant: String,
    pub cadence: Cadence,
    /// Representative charge (first member of the most frequent amount cluster)
    pub amount: f64,
    /// Occurrences in the most frequent amount cluster
    pub occurrences: usize,
    pub monthly_amount: f64,
}

/// Raw records for one signal computation
#[derive(Debug, Clone, Default)]
pub struct SignalInputs {
    pub accounts: Vec<Account>,
    /// Transactions in the current window
    pub current: Vec<Transaction>,
    /// Transactions in the preceding window of equal length
    pub previous: Vec<Transaction>,
    pub liabilities: Vec<Liability>,
}

/// Compute signals for a user over a window ending at `as_of`
pub fn compute_signals<S: FinancialStore + ?Sized>(
    store: &S,
    user_id: &str,
    window: Window,
    as_of: NaiveDate,
    config: &TallyConfig,
) -> Result<Signals> {
    let (since, until) = window.current_range(as_of);
    let (prev_start, prev_end) = window.previous_range(as_of);

    let inputs = SignalInputs {
        accounts: store.accounts(user_id)?,
        current: store.transactions_between(user_id, since, until)?,
        previous: store.transactions_between(user_id, prev_start, prev_end - Duration::days(1))?,
        liabilities: store.liabilities(user_id)?,
    };

    let signals = signals_from_parts(&inputs, window, config);
    debug!(
        user_id,
        window = %window,
        total_spend = signals.total_spend,
        subscriptions = signals.subscription_count,
        util_max = signals.util_max,
        "Computed signals"
    );
    Ok(signals)
}

/// Pure signal computation over already-fetched records
pub fn signals_from_parts(inputs: &SignalInputs, window: Window, config: &TallyConfig) -> Signals {
    let months = window.months();

    let total_spend: f64 = inputs
        .current
        .iter()
        .filter(|t| t.is_expense())
        .map(|t| t.amount.abs())
        .sum();
    let monthly_spend = total_spend / months;

    // Subscriptions: pattern pass first, category pass only for merchants it missed
    let recurring = detect_recurring(&inputs.current, &config.recurring);
    let pattern_merchants: HashSet<&str> = recurring.iter().map(|r| r.merchant.as_str()).collect();
    let pattern_monthly: f64 = recurring.iter().map(|r| r.monthly_amount).sum();

    let mut category_only: BTreeMap<&str, f64> = BTreeMap::new();
    for tx in inputs
        .current
        .iter()
        .filter(|t| t.is_expense() && t.pfc_primary == Category::Subscription)
    {
        let key = tx.merchant_key();
        if !pattern_merchants.contains(key) {
            *category_only.entry(key).or_insert(0.0) += tx.amount.abs();
        }
    }
    let category_monthly = category_only.values().sum::<f64>() / months;

    let subscription_count = (recurring.len() + category_only.len()) as u32;
    let monthly_recurring = pattern_monthly + category_monthly;
    let subscription_share = if monthly_spend > 0.0 {
        monthly_recurring / monthly_spend
    } else {
        0.0
    };

    // Savings
    let savings_ids: HashSet<&str> = inputs
        .accounts
        .iter()
        .filter(|a| a.account_type.is_savings_like())
        .map(|a| a.id.as_str())
        .collect();
    let net_in = |txs: &[Transaction]| -> f64 {
        txs.iter()
            .filter(|t| savings_ids.contains(t.account_id.as_str()))
            .map(|t| t.amount)
            .sum()
    };
    let current_net = net_in(&inputs.current);
    let previous_net = net_in(&inputs.previous);
    let net_savings_inflow = current_net / months;
    let savings_growth_rate = growth_rate(current_net, previous_net);

    let savings_balance: f64 = inputs
        .accounts
        .iter()
        .filter(|a| a.account_type.is_savings_like())
        .map(|a| a.balance_current)
        .sum();
    let checking_balance: f64 = inputs
        .accounts
        .iter()
        .filter(|a| a.account_type == AccountType::Checking)
        .map(|a| a.balance_current)
        .sum();
    let (emergency_months, cash_buffer_months) = if monthly_spend > 0.0 {
        (
            savings_balance / monthly_spend,
            (savings_balance + checking_balance) / monthly_spend,
        )
    } else {
        (0.0, 0.0)
    };

    // Credit
    let util_max = inputs
        .accounts
        .iter()
        .filter(|a| a.account_type == AccountType::Credit)
        .map(Account::utilization)
        .fold(0.0_f64, f64::max);
    let util_flags = utilization_flags(util_max, &config.persona.util_flags);

    let cards: Vec<&Liability> = inputs
        .liabilities
        .iter()
        .filter(|l| l.liability_type == LiabilityType::CreditCard)
        .collect();
    let min_pay_only = cards
        .iter()
        .any(|l| l.min_payment > 0.0 && l.last_payment.abs() <= l.min_payment + MIN_PAY_EPSILON);
    let interest_charges = cards
        .iter()
        .any(|l| l.apr_percent > 0.0 && l.last_stmt_bal > 0.0);
    let overdue = cards.iter().any(|l| l.is_overdue);

    let income_dates: Vec<NaiveDate> = inputs
        .current
        .iter()
        .filter(|t| t.pfc_primary == Category::Income && t.amount > 0.0)
        .map(|t| t.date)
        .collect();

    Signals {
        total_spend,
        subscription_count,
        monthly_recurring,
        subscription_share,
        net_savings_inflow,
        savings_growth_rate,
        emergency_months,
        cash_buffer_months,
        util_max,
        util_flags,
        min_pay_only,
        interest_charges,
        overdue,
        income_median_gap: income_median_gap(income_dates),
    }
    .sanitized()
}

/// Detect recurring merchants by spacing and amount consistency
///
/// Transfers are never treated as subscriptions. Results are ordered by
/// merchant key so repeated runs over the same data are identical.
pub fn detect_recurring(transactions: &[Transaction], config: &RecurringConfig) -> Vec<RecurringMerchant> {
    let mut by_merchant: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|t| t.is_expense() && t.pfc_primary != Category::Transfer)
    {
        by_merchant.entry(tx.merchant_key()).or_default().push(tx);
    }

    let mut found = Vec::new();
    for (merchant, mut txs) in by_merchant {
        if txs.len() < config.min_occurrences {
            continue;
        }
        txs.sort_by_key(|t| t.date);

        let gaps: Vec<i64> = txs
            .windows(2)
            .map(|w| (w[1].date - w[0].date).num_days())
            .collect();
        let mean_gap = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;

        let cadence = if config.is_monthly_gap(mean_gap) {
            Cadence::Monthly
        } else if config.is_weekly_gap(mean_gap) {
            Cadence::Weekly
        } else {
            continue;
        };

        let amounts: Vec<f64> = txs.iter().map(|t| t.amount.abs()).collect();
        let Some((amount, occurrences)) = dominant_amount(&amounts, config.amount_tolerance) else {
            continue;
        };
        if occurrences < config.min_occurrences {
            continue;
        }

        let monthly_amount = match cadence {
            Cadence::Monthly => amount,
            Cadence::Weekly => amount * config.weekly_multiplier,
        };

        found.push(RecurringMerchant {
            merchant: merchant.to_string(),
            cadence,
            amount,
            occurrences,
            monthly_amount,
        });
    }

    found
}

/// Cluster amounts within a relative tolerance and return the largest cluster
///
/// Each amount joins the first cluster whose representative it is within
/// tolerance of, otherwise starts a new one. Ties go to the earliest cluster.
fn dominant_amount(amounts: &[f64], tolerance: f64) -> Option<(f64, usize)> {
    let mut clusters: Vec<(f64, usize)> = Vec::new();
    for &amount in amounts {
        let slot = clusters
            .iter_mut()
            .find(|(rep, _)| *rep > 0.0 && ((amount - *rep).abs() / *rep) < tolerance);
        match slot {
            Some((_, count)) => *count += 1,
            None => clusters.push((amount, 1)),
        }
    }

    let mut best: Option<(f64, usize)> = None;
    for cluster in clusters {
        if best.map_or(true, |(_, count)| cluster.1 > count) {
            best = Some(cluster);
        }
    }
    best
}

/// Window-over-window growth; a zero previous window counts as full growth if
/// anything came in now
fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous.abs()
    }
}

fn utilization_flags(util_max: f64, levels: &[f64]) -> String {
    levels
        .iter()
        .filter(|&&level| util_max >= level)
        .map(|level| format!("{}", (level * 100.0).round() as i64))
        .collect::<Vec<_>>()
        .join(",")
}

/// Lower median of consecutive gaps between income dates
fn income_median_gap(mut dates: Vec<NaiveDate>) -> i64 {
    if dates.len() < 2 {
        return NO_INCOME_CADENCE_DAYS;
    }
    dates.sort();
    let mut gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect();
    gaps.sort();
    gaps[(gaps.len() - 1) / 2]
}
