//! Priority scoring commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use taskpulse_core::scoring::{rank_tasks, ScoringContext};
use taskpulse_core::storage::Database;

#[derive(Subcommand)]
pub enum ScoreAction {
    /// Rank open tasks by priority score
    Rank {
        /// Show at most N tasks
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the derived scoring context (work pattern, productive hours)
    Context,
}

pub fn run(action: ScoreAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let now = Utc::now();
    let snapshot = db.snapshot(now)?;
    let context = ScoringContext::from_snapshot(&snapshot, now);

    match action {
        ScoreAction::Rank { limit } => {
            let mut ranked = rank_tasks(&snapshot, &context, now);
            if let Some(limit) = limit {
                ranked.truncate(limit);
            }
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
        ScoreAction::Context => {
            println!("{}", serde_json::to_string_pretty(&context)?);
        }
    }
    Ok(())
}
