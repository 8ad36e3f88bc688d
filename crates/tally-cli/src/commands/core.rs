//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` / `load_config` / `ai_from_env` / `prepare_ai` - Shared setup
//! - `cmd_init` - Initialize the database
//! - `cmd_load` - Load a JSON snapshot
//! - `cmd_users` - List users
//! - `cmd_consent` - Record consent

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::models::{ConsentStatus, SnapshotFile, Window};
use tally_core::{AIBackend, AIClient, Database, TallyConfig};

/// Open (and migrate) the database
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Load thresholds from an explicit file, the data-dir override, or built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<TallyConfig> {
    TallyConfig::load(path).context("Failed to load configuration")
}

/// AI backend from environment variables, if one is configured
pub async fn ai_from_env(config: &TallyConfig) -> Option<AIClient> {
    let client = AIClient::from_env();
    if client.is_none() {
        println!("   💡 Tip: Set OPENAI_API_KEY or OPENAI_COMPATIBLE_HOST to enable AI copy");
    }
    prepare_ai(client, config).await
}

/// Bound the client's requests by the copy timeout and report whether it answers
///
/// An unreachable backend is still returned; copy falls back to templates per item.
pub async fn prepare_ai(client: Option<AIClient>, config: &TallyConfig) -> Option<AIClient> {
    let client = client?.with_request_timeout(config.copy.timeout());
    if client.health_check().await {
        tracing::debug!(host = client.host(), model = client.model(), "AI backend configured");
    } else {
        tracing::warn!(host = client.host(), "AI backend is not reachable; template copy will be used");
        println!("   ⚠️  AI backend at {} is not reachable; using template copy", client.host());
    }
    Some(client)
}

/// Fail with NotFound when the user has never been loaded
pub fn require_user(db: &Database, user_id: &str) -> Result<()> {
    if db.list_users()?.iter().any(|u| u == user_id) {
        Ok(())
    } else {
        Err(tally_core::Error::NotFound(format!("user {}", user_id)))
            .context("Load a snapshot containing this user first")
    }
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;

    println!("✅ Database ready at {}", db.path());
    println!();
    println!("Next steps:");
    println!("  1. Load data: tally load snapshot.json");
    println!("  2. Record consent: tally consent <user> opt-in");
    println!("  3. Build profiles: tally profile <user>");

    Ok(())
}

pub fn cmd_load(db: &Database, file: &Path) -> Result<()> {
    println!("📥 Loading {}...", file.display());

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshot: SnapshotFile =
        serde_json::from_str(&content).context("Snapshot is not valid JSON ({\"users\": [...]})")?;

    let summary = db.load_snapshot(&snapshot).context("Failed to load snapshot")?;

    println!();
    println!("📊 Load Results");
    println!("   ─────────────────────────────");
    println!("   Users:        {}", summary.users);
    println!("   Accounts:     {}", summary.accounts);
    println!("   Transactions: {}", summary.transactions);
    println!("   Liabilities:  {}", summary.liabilities);

    Ok(())
}

pub fn cmd_users(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users yet. Run 'tally load <file>' first.");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:>6}  {:<24} {:<24}",
        "USER", "CONSENT", "TXNS", "PERSONA (30d)", "PERSONA (180d)"
    );
    println!("{}", "-".repeat(88));

    for user_id in &users {
        let consent = db
            .get_consent(user_id)?
            .map(|c| c.status.as_str())
            .unwrap_or("-");
        let persona = |window| -> Result<String> {
            Ok(db
                .latest_profile(user_id, window)?
                .map(|p| p.persona.as_str().to_string())
                .unwrap_or_else(|| "-".to_string()))
        };

        println!(
            "{:<20} {:<10} {:>6}  {:<24} {:<24}",
            super::truncate(user_id, 20),
            consent,
            db.count_transactions(user_id)?,
            persona(Window::Days30)?,
            persona(Window::Days180)?
        );
    }

    println!();
    println!("{} user(s)", users.len());

    Ok(())
}

pub fn cmd_consent(db: &Database, user_id: &str, status: ConsentStatus) -> Result<()> {
    let consent = db.set_consent(user_id, status)?;

    match consent.status {
        ConsentStatus::OptedIn => println!("✅ {} opted in", user_id),
        ConsentStatus::OptedOut => println!("🚫 {} opted out; recommendations are hidden", user_id),
    }

    Ok(())
}
