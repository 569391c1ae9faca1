//! Work session commands for CLI.

use chrono::{Duration, Utc};
use clap::Subcommand;
use taskpulse_core::storage::Database;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a work session against a task
    Start {
        /// Task ID
        task_id: String,
    },
    /// Stop a session, optionally recording a productivity score
    Stop {
        /// Session ID
        id: String,
        /// Self-reported productivity, 0-10
        #[arg(long)]
        score: Option<u8>,
    },
    /// List sessions
    List {
        /// Only sessions started within the last N hours
        #[arg(long)]
        since_hours: Option<i64>,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionAction::Start { task_id } => {
            let session = db.start_session(&task_id, Utc::now())?;
            println!("Session started: {}", session.id);
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionAction::Stop { id, score } => {
            if let Some(score) = score {
                if score > 10 {
                    return Err(format!("productivity score must be 0-10, got {score}").into());
                }
            }
            let session = db.close_session(&id, score, Utc::now())?;
            println!("Session stopped after {} min", session.duration_minutes);
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionAction::List { since_hours } => {
            let since = since_hours.map(|h| Utc::now() - Duration::hours(h));
            let sessions = db.list_sessions(since)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
