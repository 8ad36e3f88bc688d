//! Signal and profile command implementations

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::ai::explain_persona_or_reason;
use tally_core::models::Window;
use tally_core::{compute_signals, AIClient, Database, ProfileService, TallyConfig};

use super::require_user;

pub fn cmd_signals(
    db: &Database,
    config: &TallyConfig,
    user_id: &str,
    window: Window,
    as_of: NaiveDate,
) -> Result<()> {
    require_user(db, user_id)?;

    let signals = compute_signals(db, user_id, window, as_of, config)
        .with_context(|| format!("Failed to compute signals for {}", user_id))?;

    println!("📈 Signals for {} ({} ending {})", user_id, window, as_of);
    println!("{}", serde_json::to_string_pretty(&signals)?);

    Ok(())
}

pub async fn cmd_profile(
    db: &Database,
    config: TallyConfig,
    user_id: &str,
    as_of: NaiveDate,
    explain: bool,
    ai: Option<AIClient>,
) -> Result<()> {
    require_user(db, user_id)?;

    let timeout = config.copy.timeout();
    let service = ProfileService::new(db.clone(), config);
    let outcome = service
        .refresh(user_id, as_of)
        .with_context(|| format!("Failed to refresh profile for {}", user_id))?;

    println!("🧭 Profile for {} as of {}", user_id, as_of);

    for window in &outcome.windows {
        println!();
        println!(
            "   {:<6} {} (priority {})",
            window.window.to_string(),
            window.persona.key.label(),
            window.persona.priority
        );
        println!("          {}", window.persona.reason);
        if let Some(previous) = window.previous_persona.filter(|_| window.persona_changed()) {
            println!("          ↪ changed from {}", previous.label());
        }
        println!("          trace {}", &window.trace_digest[..12.min(window.trace_digest.len())]);

        if explain {
            let text = explain_persona_or_reason(ai.as_ref(), &window.persona, &window.signals, timeout).await;
            println!("          💬 {}", text);
        }
    }

    println!();
    if outcome.alerts.has_alerts() {
        println!(
            "⚠️  {} educational alert(s), severity {}. Run 'tally alerts {}' for details.",
            outcome.alerts.total(),
            outcome.alerts.severity,
            user_id
        );
    }
    if !outcome.review_ids.is_empty() {
        println!(
            "📝 Queued {} item(s) for human review. Run 'tally review list'.",
            outcome.review_ids.len()
        );
    }

    Ok(())
}
