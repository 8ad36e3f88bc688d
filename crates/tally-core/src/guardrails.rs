//! Consent, eligibility and tone guardrails
//!
//! Every recommendation passes through these before it reaches a caller:
//! consent gates the whole response, eligibility filters individual offers,
//! and the tone check rejects shaming or blaming language.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Account, AccountType, Consent, ConsentStatus};
use crate::recommend::RecommendationItem;
use crate::signals::Signals;

/// Appended verbatim to every recommendation rationale
pub const STANDARD_DISCLOSURE: &str =
    "This is educational content, not financial advice. Consult a licensed advisor for personalized guidance.";

/// Case-insensitive patterns that must never appear in titles or rationales
pub const BANNED_PATTERNS: &[&str] = &[
    r"overspend(ing|er|s)?",
    r"irresponsib(le|ly|ility)",
    r"bad\s+with\s+money",
];

/// Utilization below which balance-transfer offers are withheld
const BALANCE_TRANSFER_MIN_UTILIZATION: f64 = 0.5;

/// Fail unless the user has explicitly opted in
pub fn enforce_consent(consent: Option<&Consent>, user_id: &str) -> Result<()> {
    match consent {
        Some(c) if c.status == ConsentStatus::OptedIn => Ok(()),
        _ => Err(Error::ConsentRequired(user_id.to_string())),
    }
}

/// Facts about the user that decide offer eligibility
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EligibilityContext {
    pub has_savings_account: bool,
    pub income_monthly: f64,
    pub max_utilization: f64,
    pub overdue: bool,
}

impl EligibilityContext {
    pub fn from_parts(accounts: &[Account], signals: &Signals, income_monthly: f64) -> Self {
        Self {
            has_savings_account: accounts
                .iter()
                .any(|a| a.account_type == AccountType::Savings),
            income_monthly,
            max_utilization: signals.util_max,
            overdue: signals.overdue,
        }
    }
}

/// Whether an item may be shown to this user
pub fn eligible(item: &RecommendationItem, ctx: &EligibilityContext) -> bool {
    match item.id.as_str() {
        "offer-hysa" => !ctx.has_savings_account,
        "offer-bt-card" => !ctx.overdue && ctx.max_utilization >= BALANCE_TRANSFER_MIN_UTILIZATION,
        _ => true,
    }
}

/// Banned patterns compiled once, paired with their source text
fn banned_regexes() -> Result<&'static [(&'static str, Regex)]> {
    static RES: OnceLock<std::result::Result<Vec<(&'static str, Regex)>, regex::Error>> = OnceLock::new();
    let compiled = RES.get_or_init(|| {
        BANNED_PATTERNS
            .iter()
            .map(|&pattern| Ok((pattern, Regex::new(&format!("(?i){}", pattern))?)))
            .collect()
    });
    compiled.as_deref().map_err(|e| Error::Regex(e.clone()))
}

/// Reject items whose title or rationale contains banned language
pub fn tone_check(item: &RecommendationItem) -> Result<()> {
    for (pattern, re) in banned_regexes()? {
        if re.is_match(&item.title) || re.is_match(&item.rationale) {
            warn!(id = %item.id, pattern, "Tone violation");
            return Err(Error::ToneViolation {
                id: item.id.clone(),
                pattern: pattern.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::RecommendationKind;
    use chrono::Utc;

    fn item(id: &str, title: &str, rationale: &str) -> RecommendationItem {
        RecommendationItem {
            id: id.to_string(),
            kind: RecommendationKind::Offer,
            title: title.to_string(),
            rationale: rationale.to_string(),
            ai_generated: false,
        }
    }

    fn consent(status: ConsentStatus) -> Consent {
        Consent {
            user_id: "u1".to_string(),
            status,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_enforce_consent() {
        assert!(enforce_consent(Some(&consent(ConsentStatus::OptedIn)), "u1").is_ok());

        let err = enforce_consent(Some(&consent(ConsentStatus::OptedOut)), "u1").unwrap_err();
        assert!(err.is_consent_required());
        assert!(enforce_consent(None, "u1").unwrap_err().is_consent_required());
    }

    #[test]
    fn test_hysa_requires_no_savings_account() {
        let hysa = item("offer-hysa", "HYSA (eligibility)", "ok");
        let with_savings = EligibilityContext {
            has_savings_account: true,
            ..Default::default()
        };
        assert!(!eligible(&hysa, &with_savings));
        assert!(eligible(&hysa, &EligibilityContext::default()));
    }

    #[test]
    fn test_balance_transfer_needs_utilization_and_no_overdue() {
        let bt = item("offer-bt-card", "0% balance transfer", "ok");
        let utilized = EligibilityContext {
            max_utilization: 0.68,
            ..Default::default()
        };
        assert!(eligible(&bt, &utilized));
        assert!(!eligible(
            &bt,
            &EligibilityContext {
                overdue: true,
                ..utilized.clone()
            }
        ));
        assert!(!eligible(
            &bt,
            &EligibilityContext {
                max_utilization: 0.49,
                ..utilized
            }
        ));
    }

    #[test]
    fn test_other_items_pass() {
        let edu = item("edu-apy", "Pick a high-yield savings account", "ok");
        let ctx = EligibilityContext {
            has_savings_account: true,
            overdue: true,
            ..Default::default()
        };
        assert!(eligible(&edu, &ctx));
    }

    #[test]
    fn test_tone_check_is_case_insensitive() {
        assert!(tone_check(&item("x", "Stop OVERSPENDING now", "fine")).is_err());
        assert!(tone_check(&item("x", "fine", "That was Irresponsible")).is_err());
        assert!(tone_check(&item("x", "fine", "you are bad with  money")).is_err());
        assert!(tone_check(&item("x", "Trim recurring costs", STANDARD_DISCLOSURE)).is_ok());

        match tone_check(&item("edu-x", "overspending", "")) {
            Err(Error::ToneViolation { id, .. }) => assert_eq!(id, "edu-x"),
            other => panic!("expected tone violation, got {:?}", other),
        }
    }

    #[test]
    fn test_banned_patterns_compile_once() {
        let first = banned_regexes().unwrap();
        let second = banned_regexes().unwrap();
        assert_eq!(first.len(), BANNED_PATTERNS.len());
        assert!(std::ptr::eq(first, second));
        for ((pattern, _), expected) in first.iter().zip(BANNED_PATTERNS) {
            assert_eq!(pattern, expected);
        }
    }
}
