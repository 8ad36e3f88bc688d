//! Recommendation command implementation

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::ai::copy_writer;
use tally_core::alerts::AlertReport;
use tally_core::models::{AccountType, Window};
use tally_core::recommend::recommendations_with_copy;
use tally_core::{
    eligible, enforce_consent, AIClient, Database, EligibilityContext, FinancialStore,
    RecommendationContext, RecommendationItem, TallyConfig,
};

use super::require_user;

/// Build the eligible recommendations for a user from their latest 30-day profile
///
/// Returns an empty list when the user has no profile yet.
pub async fn eligible_recommendations(
    db: &Database,
    config: &TallyConfig,
    user_id: &str,
    as_of: NaiveDate,
    use_ai: bool,
    ai: Option<AIClient>,
) -> Result<Vec<RecommendationItem>> {
    require_user(db, user_id)?;

    enforce_consent(db.get_consent(user_id)?.as_ref(), user_id)
        .with_context(|| format!("Run 'tally consent {} opt-in' to see recommendations", user_id))?;

    let Some(profile) = db.latest_profile(user_id, Window::Days30)? else {
        return Ok(Vec::new());
    };

    let accounts = db.accounts(user_id)?;
    let transactions = db.all_transactions(user_id)?;
    let alerts = AlertReport::build(&transactions, as_of, &config.aml);

    let ctx = RecommendationContext {
        last4: accounts
            .iter()
            .find(|a| a.account_type == AccountType::Credit)
            .and_then(|a| a.last4()),
        has_aml_alerts: alerts.has_alerts(),
    };

    let writer = copy_writer(use_ai, ai, &config.copy);
    let items = recommendations_with_copy(profile.persona, &profile.signals, &ctx, writer.as_ref())
        .await
        .context("Recommendation copy failed the tone check")?;

    let eligibility = EligibilityContext::from_parts(&accounts, &profile.signals, 0.0);
    Ok(items.into_iter().filter(|i| eligible(i, &eligibility)).collect())
}

pub async fn cmd_recommend(
    db: &Database,
    config: &TallyConfig,
    user_id: &str,
    as_of: NaiveDate,
    use_ai: bool,
    ai: Option<AIClient>,
) -> Result<()> {
    let items = eligible_recommendations(db, config, user_id, as_of, use_ai, ai).await?;

    if items.is_empty() {
        println!("No recommendations yet. Run 'tally profile {}' first.", user_id);
        return Ok(());
    }

    println!("💡 Recommendations for {}", user_id);
    for item in &items {
        println!();
        let marker = if item.ai_generated { " ✨" } else { "" };
        println!("   [{}] {}{}", item.kind.as_str(), item.title, marker);
        println!("   {}", item.rationale);
        println!("   ({})", item.id);
    }

    Ok(())
}
