//! Notification trigger commands for CLI.

use chrono::{Duration, Utc};
use clap::Subcommand;
use taskpulse_core::notify::{DedupFilter, NotificationManager};
use taskpulse_core::scheduler::run_tick;
use taskpulse_core::storage::{Config, Database};
use taskpulse_core::trigger::TriggerRegistry;

use super::notify::stdout_handler;

#[derive(Subcommand)]
pub enum TriggerAction {
    /// List the registered triggers
    List,
    /// Run a single trigger pass against the current state
    Check,
}

pub fn run(action: TriggerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TriggerAction::List => {
            let registry = TriggerRegistry::builtin();
            println!("{}", serde_json::to_string_pretty(registry.triggers())?);
        }
        TriggerAction::Check => {
            let config = Config::load()?;
            let db = Database::open()?;
            let now = Utc::now();

            let mut registry = TriggerRegistry::builtin();
            let mut manager = NotificationManager::new(
                config.notifier.clone(),
                DedupFilter::new(Duration::seconds(config.scheduler.dedup_window_secs as i64)),
            );
            manager.seed_created_history(db.notifications_created_since(now - Duration::hours(1))?);

            let snapshot = db.snapshot(now)?;
            let report = run_tick(&mut registry, &mut manager, &snapshot, stdout_handler(&db), now);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
