//! Tally CLI - Behavioral finance profiles with guarded recommendations
//!
//! Usage:
//!   tally init                       Initialize database
//!   tally load snapshot.json         Load users, accounts, transactions
//!   tally profile <user>             Recompute personas for both windows
//!   tally recommend <user> --ai      Show recommendations (consent required)

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let as_of = cli.as_of_date();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Load { file } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_load(&db, &file)
        }
        Commands::Users => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_users(&db)
        }
        Commands::Consent { user, status } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_consent(&db, &user, status)
        }
        Commands::Signals { user, window } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_signals(&db, &config, &user, window, as_of)
        }
        Commands::Profile { user, explain } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            let ai = if explain {
                commands::ai_from_env(&config).await
            } else {
                None
            };
            commands::cmd_profile(&db, config, &user, as_of, explain, ai).await
        }
        Commands::Recommend { user, ai } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            let client = if ai { commands::ai_from_env(&config).await } else { None };
            commands::cmd_recommend(&db, &config, &user, as_of, ai, client).await
        }
        Commands::Alerts { user } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_alerts(&db, &config, &user, as_of)
        }
        Commands::Review { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_review_list(&db, false),
                Some(ReviewCommand::List { all }) => commands::cmd_review_list(&db, all),
                Some(ReviewCommand::Decide { id, action, notes }) => {
                    commands::cmd_review_decide(&db, id, action, notes.as_deref())
                }
            }
        }
        Commands::Eval { out } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_eval(&db, &config, as_of, out.as_deref())
        }
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
