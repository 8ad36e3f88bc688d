//! Persona-gated recommendations
//!
//! Each persona maps to a fixed, ordered list of templates. Rationales embed
//! live signal values and always end with the standard disclosure. Every item
//! passes the tone check before it is returned; a violation aborts the call.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::{CopyRegister, CopyRequest, CopyWriter, GeneratedCopy};
use crate::error::Result;
use crate::guardrails::{tone_check, STANDARD_DISCLOSURE};
use crate::persona::PersonaKey;
use crate::signals::Signals;

/// Recommendation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Education,
    Offer,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Education => "education",
            Self::Offer => "offer",
        }
    }
}

/// A recommendation shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub id: String,
    pub kind: RecommendationKind,
    pub title: String,
    pub rationale: String,
    pub ai_generated: bool,
}

/// Caller-supplied context for templating and copy register
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationContext {
    /// Last four digits of the user's credit card, for display
    pub last4: Option<String>,
    /// The user currently has an educational AML-pattern alert
    pub has_aml_alerts: bool,
}

impl RecommendationContext {
    fn card_label(&self) -> String {
        match self.last4.as_deref() {
            Some(last4) if !last4.is_empty() => format!("card ••••{}", last4),
            _ => "your card".to_string(),
        }
    }

    fn register(&self) -> CopyRegister {
        if self.has_aml_alerts {
            CopyRegister::AmlReview
        } else {
            CopyRegister::Standard
        }
    }
}

struct Template {
    id: &'static str,
    kind: RecommendationKind,
    title: &'static str,
    because: fn(&Signals, &RecommendationContext) -> String,
}

impl Template {
    fn render(&self, signals: &Signals, ctx: &RecommendationContext) -> RecommendationItem {
        RecommendationItem {
            id: self.id.to_string(),
            kind: self.kind,
            title: self.title.to_string(),
            rationale: with_disclosure(&(self.because)(signals, ctx)),
            ai_generated: false,
        }
    }
}

/// Append the standard disclosure to a rationale sentence
pub fn with_disclosure(message: &str) -> String {
    format!("{}. {}", message, STANDARD_DISCLOSURE)
}

fn pct0(ratio: f64) -> String {
    format!("{:.0}", ratio * 100.0)
}

fn pct1(ratio: f64) -> String {
    format!("{:.1}", ratio * 100.0)
}

const HIGH_UTILIZATION: &[Template] = &[
    Template {
        id: "edu-debt-snowball",
        kind: RecommendationKind::Education,
        title: "How to cut utilization under 30% fast",
        because: |s, ctx| format!("We noticed {} is at {}% utilization", ctx.card_label(), pct0(s.util_max)),
    },
    Template {
        id: "offer-bt-card",
        kind: RecommendationKind::Offer,
        title: "0% balance transfer (eligibility check)",
        because: |s, _| {
            format!(
                "Utilization is {}% and interest charges present: {}",
                pct0(s.util_max),
                s.interest_charges
            )
        },
    },
    Template {
        id: "edu-autopay",
        kind: RecommendationKind::Education,
        title: "Autopay to avoid interest & fees",
        because: |s, _| format!("Minimum-payment-only={}", s.min_pay_only),
    },
];

const VARIABLE_INCOME: &[Template] = &[
    Template {
        id: "edu-percent-budget",
        kind: RecommendationKind::Education,
        title: "Percent-based budgeting for uneven pay",
        because: |s, _| format!("Median pay gap is {} days", s.income_median_gap),
    },
    Template {
        id: "tool-buffer-calc",
        kind: RecommendationKind::Education,
        title: "Emergency fund calculator (1–3 months)",
        because: |s, _| format!("Cash buffer is {:.2} months", s.cash_buffer_months),
    },
    Template {
        id: "offer-budget-app",
        kind: RecommendationKind::Offer,
        title: "Budgeting app trial (eligibility)",
        because: |_, _| "Irregular income pattern detected".to_string(),
    },
];

const SUBSCRIPTION_HEAVY: &[Template] = &[
    Template {
        id: "edu-sub-audit",
        kind: RecommendationKind::Education,
        title: "Monthly subscription audit checklist",
        because: |s, _| {
            format!(
                "Found {} recurring merchants; monthly recurring ≈ ${:.0}",
                s.subscription_count, s.monthly_recurring
            )
        },
    },
    Template {
        id: "offer-sub-manager",
        kind: RecommendationKind::Offer,
        title: "Subscription manager (alerts & cancels)",
        because: |s, _| format!("Subscription share is {}% of spend", pct1(s.subscription_share)),
    },
];

const SAVINGS_BUILDER: &[Template] = &[
    Template {
        id: "edu-apy",
        kind: RecommendationKind::Education,
        title: "Pick a high-yield savings account",
        because: |s, _| {
            format!(
                "Savings inflow ${:.0}/mo; growth {}%",
                s.net_savings_inflow,
                pct1(s.savings_growth_rate)
            )
        },
    },
    Template {
        id: "offer-hysa",
        kind: RecommendationKind::Offer,
        title: "HYSA (eligibility)",
        because: |_, _| "Building emergency fund with no high utilization".to_string(),
    },
    Template {
        id: "edu-automation",
        kind: RecommendationKind::Education,
        title: "Automation: pay-yourself-first",
        because: |s, _| format!("Emergency coverage is {:.2} months", s.emergency_months),
    },
];

const LOW_CUSHION_OPTIMIZER: &[Template] = &[
    Template {
        id: "edu-cushion-1mo",
        kind: RecommendationKind::Education,
        title: "Fast path to 1 month cushion",
        because: |s, _| format!("Emergency coverage is {:.2} months (<0.5)", s.emergency_months),
    },
    Template {
        id: "edu-expense-triage",
        kind: RecommendationKind::Education,
        title: "Cut 3 expenses this week",
        because: |s, _| format!("Subscription share {}%", pct1(s.subscription_share)),
    },
    Template {
        id: "offer-roundup",
        kind: RecommendationKind::Offer,
        title: "Round‑up autosave (eligibility)",
        because: |s, _| format!("Net inflow currently ${:.0}/mo", s.net_savings_inflow),
    },
];

fn templates_for(persona: PersonaKey) -> &'static [Template] {
    match persona {
        PersonaKey::HighUtilization => HIGH_UTILIZATION,
        PersonaKey::VariableIncome => VARIABLE_INCOME,
        PersonaKey::SubscriptionHeavy => SUBSCRIPTION_HEAVY,
        PersonaKey::SavingsBuilder => SAVINGS_BUILDER,
        PersonaKey::LowCushionOptimizer => LOW_CUSHION_OPTIMIZER,
    }
}

/// Recommendation ids for a persona, in display order
pub fn recommendation_ids(persona: PersonaKey) -> Vec<&'static str> {
    templates_for(persona).iter().map(|t| t.id).collect()
}

/// Deterministic recommendations for a persona
pub fn recommendations_for(
    persona: PersonaKey,
    signals: &Signals,
    ctx: &RecommendationContext,
) -> Result<Vec<RecommendationItem>> {
    let items: Vec<RecommendationItem> = templates_for(persona)
        .iter()
        .map(|t| t.render(signals, ctx))
        .collect();

    for item in &items {
        tone_check(item)?;
    }

    debug!(persona = %persona, count = items.len(), "Built recommendations");
    Ok(items)
}

/// Recommendations with copy from a writer
///
/// The writer decides whether copy is rewritten; the template writer yields
/// exactly `recommendations_for`. Rewritten copy is tone-checked like any other.
pub async fn recommendations_with_copy(
    persona: PersonaKey,
    signals: &Signals,
    ctx: &RecommendationContext,
    writer: &dyn CopyWriter,
) -> Result<Vec<RecommendationItem>> {
    let base = recommendations_for(persona, signals, ctx)?;
    let register = ctx.register();

    let mut items = Vec::with_capacity(base.len());
    for item in base {
        let request = CopyRequest {
            recommendation_id: item.id.clone(),
            kind: item.kind,
            persona,
            signals: signals.clone(),
            register,
            template: GeneratedCopy {
                title: item.title.clone(),
                rationale: item.rationale.clone(),
                ai_generated: false,
            },
        };

        let copy = writer.write_copy(&request).await;
        let rewritten = RecommendationItem {
            title: copy.title,
            rationale: copy.rationale,
            ai_generated: copy.ai_generated,
            ..item
        };
        tone_check(&rewritten)?;
        items.push(rewritten);
    }

    debug!(persona = %persona, writer = writer.name(), count = items.len(), "Wrote recommendation copy");
    Ok(items)
}
