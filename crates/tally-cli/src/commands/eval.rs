//! Evaluation command implementation

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::evaluation::evaluate;
use tally_core::{Database, TallyConfig};

pub fn cmd_eval(db: &Database, config: &TallyConfig, as_of: NaiveDate, out: Option<&Path>) -> Result<()> {
    let users = db.list_users()?;
    println!("🧪 Evaluating {} user(s) as of {}...", users.len(), as_of);

    let report = evaluate(db, &users, as_of, config).context("Evaluation failed")?;
    let summary = &report.summary;

    println!();
    println!("📊 Evaluation Summary");
    println!("   ─────────────────────────────");
    println!("   Users:           {}", summary.count);
    println!("   Coverage:        {}%", summary.coverage);
    println!("   Explainability:  {}%", summary.explainability);
    println!("   Auditability:    {}%", summary.auditability);
    println!("   Latency p95:     {} ms", summary.latency_p95_ms);

    if let Some(path) = out {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!();
        println!("   Report written to {}", path.display());
    }

    Ok(())
}
