//! Persona classification
//!
//! An ordered rule cascade over signals. Rules are evaluated top to bottom and
//! the first match wins; if nothing matches the user falls back to
//! `savings_builder` at priority 99, so classification is total.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PersonaThresholds;
use crate::signals::Signals;

/// Priority reported by the fallback persona
pub const DEFAULT_PRIORITY: u32 = 99;

/// Reason reported by the fallback persona
pub const DEFAULT_REASON: &str = "default to education on goals & automation";

/// Persona labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKey {
    HighUtilization,
    VariableIncome,
    SubscriptionHeavy,
    SavingsBuilder,
    LowCushionOptimizer,
}

impl PersonaKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighUtilization => "high_utilization",
            Self::VariableIncome => "variable_income",
            Self::SubscriptionHeavy => "subscription_heavy",
            Self::SavingsBuilder => "savings_builder",
            Self::LowCushionOptimizer => "low_cushion_optimizer",
        }
    }

    pub fn all() -> &'static [PersonaKey] {
        &[
            Self::HighUtilization,
            Self::LowCushionOptimizer,
            Self::VariableIncome,
            Self::SubscriptionHeavy,
            Self::SavingsBuilder,
        ]
    }

    /// Human-friendly label
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighUtilization => "High Utilization",
            Self::VariableIncome => "Variable Income",
            Self::SubscriptionHeavy => "Subscription Heavy",
            Self::SavingsBuilder => "Savings Builder",
            Self::LowCushionOptimizer => "Low Cushion Optimizer",
        }
    }
}

impl std::str::FromStr for PersonaKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high_utilization" => Ok(Self::HighUtilization),
            "variable_income" => Ok(Self::VariableIncome),
            "subscription_heavy" => Ok(Self::SubscriptionHeavy),
            "savings_builder" => Ok(Self::SavingsBuilder),
            "low_cushion_optimizer" => Ok(Self::LowCushionOptimizer),
            _ => Err(format!("Unknown persona: {}", s)),
        }
    }
}

impl std::fmt::Display for PersonaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Assigned persona with the values that triggered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub key: PersonaKey,
    pub reason: String,
    pub priority: u32,
}

impl Persona {
    pub fn is_default(&self) -> bool {
        self.priority == DEFAULT_PRIORITY
    }
}

struct Rule {
    key: PersonaKey,
    priority: u32,
    matches: fn(&Signals, &PersonaThresholds) -> bool,
    reason: fn(&Signals, &PersonaThresholds) -> String,
}

/// Declaration order is evaluation order
const RULES: [Rule; 5] = [
    Rule {
        key: PersonaKey::HighUtilization,
        priority: 1,
        matches: |s, t| s.util_max >= t.util_high || s.interest_charges || s.min_pay_only || s.overdue,
        reason: |s, _| {
            format!(
                "util_max={}%, interest={}, min_pay_only={}, overdue={}",
                pct0(s.util_max),
                s.interest_charges,
                s.min_pay_only,
                s.overdue
            )
        },
    },
    Rule {
        key: PersonaKey::LowCushionOptimizer,
        priority: 2,
        matches: |s, t| s.cash_buffer_months < t.buffer_very_low && !s.overdue,
        reason: |s, t| {
            format!(
                "cash_buffer_months={:.2} (< {}) and not overdue",
                s.cash_buffer_months, t.buffer_very_low
            )
        },
    },
    Rule {
        key: PersonaKey::VariableIncome,
        priority: 3,
        matches: |s, t| {
            s.income_median_gap as f64 > t.income_gap_days && s.cash_buffer_months < t.buffer_month_low
        },
        reason: |s, _| {
            format!(
                "income gap={}d and buffer={:.2}mo",
                s.income_median_gap, s.cash_buffer_months
            )
        },
    },
    Rule {
        key: PersonaKey::SubscriptionHeavy,
        priority: 4,
        matches: |s, t| {
            s.subscription_count >= t.subscription_recurring_min
                && (s.monthly_recurring >= t.subscription_monthly_min_usd
                    || s.subscription_share >= t.subscription_share_min)
        },
        reason: |s, _| {
            format!(
                "subs={}, monthly_recurring=${:.0}, share={:.1}%",
                s.subscription_count,
                s.monthly_recurring,
                s.subscription_share * 100.0
            )
        },
    },
    Rule {
        key: PersonaKey::SavingsBuilder,
        priority: 5,
        matches: |s, t| {
            (s.savings_growth_rate >= t.savings_growth_min
                || s.net_savings_inflow >= t.savings_net_inflow_min)
                && s.util_max < t.util_savings_max
        },
        reason: |s, _| {
            format!(
                "growth={:.1}%, inflow=${:.0}/mo, util_max={}%",
                s.savings_growth_rate * 100.0,
                s.net_savings_inflow,
                pct0(s.util_max)
            )
        },
    },
];

fn pct0(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

/// Assign exactly one persona; never fails
pub fn assign_persona(signals: &Signals, thresholds: &PersonaThresholds) -> Persona {
    let persona = RULES
        .iter()
        .find(|rule| (rule.matches)(signals, thresholds))
        .map(|rule| Persona {
            key: rule.key,
            reason: (rule.reason)(signals, thresholds),
            priority: rule.priority,
        })
        .unwrap_or_else(|| Persona {
            key: PersonaKey::SavingsBuilder,
            reason: DEFAULT_REASON.to_string(),
            priority: DEFAULT_PRIORITY,
        });

    debug!(persona = %persona.key, priority = persona.priority, "Assigned persona");
    persona
}
