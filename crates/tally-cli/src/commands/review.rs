//! Alert and review queue command implementations

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::alerts::AlertReport;
use tally_core::models::{ReviewAction, ReviewStatus};
use tally_core::{Database, FinancialStore, TallyConfig};

use super::{require_user, truncate};

pub fn cmd_alerts(db: &Database, config: &TallyConfig, user_id: &str, as_of: NaiveDate) -> Result<()> {
    require_user(db, user_id)?;

    let transactions = db.all_transactions(user_id)?;
    let report = AlertReport::build(&transactions, as_of, &config.aml);

    if !report.has_alerts() {
        println!("✅ No AML-pattern alerts for {} as of {}", user_id, as_of);
        return Ok(());
    }

    println!("⚠️  Educational alerts for {} (severity: {})", user_id, report.severity);
    for (label, alerts) in [("30d", &report.alerts_30), ("180d", &report.alerts_180)] {
        for alert in alerts {
            println!("   [{}] {}", label, alert);
        }
    }
    if let Some(disclosure) = &report.disclosure {
        println!();
        println!("   {}", disclosure);
    }
    if report.severity.needs_review() {
        println!("   Run 'tally profile {}' to queue this for human review.", user_id);
    }

    Ok(())
}

pub fn cmd_review_list(db: &Database, all: bool) -> Result<()> {
    let items = if all {
        db.list_reviews(None)?
    } else {
        db.list_pending_reviews()?
    };

    if items.is_empty() {
        println!("✅ Review queue is empty");
        return Ok(());
    }

    println!("{:<6} {:<16} {:<11} {:<20} REASON", "ID", "USER", "STATUS", "CREATED");
    println!("{}", "-".repeat(100));

    for item in &items {
        println!(
            "{:<6} {:<16} {:<11} {:<20} {}",
            item.id,
            truncate(&item.user_id, 16),
            item.status.as_str(),
            item.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&item.reason, 60)
        );
        if let Some(notes) = &item.notes {
            println!("{:<6} notes: {}", "", notes);
        }
    }

    Ok(())
}

pub fn cmd_review_decide(db: &Database, id: i64, action: ReviewAction, notes: Option<&str>) -> Result<()> {
    let item = db.decide_review(id, action, notes)?;

    match item.status {
        ReviewStatus::Approved => println!("✅ Review {} approved", item.id),
        ReviewStatus::Overridden => println!("↩️  Review {} overridden", item.id),
        ReviewStatus::Pending => println!("Review {} is still pending", item.id),
    }

    Ok(())
}
