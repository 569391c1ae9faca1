//! Notification scheduler commands for CLI.

use chrono::{Duration, Utc};
use clap::Subcommand;
use tokio::sync::watch;
use tracing::{info, warn};

use taskpulse_core::notify::{DedupFilter, DeliveryReceipt, NotificationManager, ProactiveNotification};
use taskpulse_core::scheduler::{run_loop, SchedulerEngine, SchedulerTiming};
use taskpulse_core::storage::{Config, Database};
use taskpulse_core::trigger::TriggerRegistry;

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Run the notification scheduler in the foreground until Ctrl-C
    Watch {
        /// Override the tick interval in seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show the notification delivery log
    History {
        /// Show at most N entries
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

/// Delivery handler that prints to stdout and appends to the log.
pub fn stdout_handler(
    db: &Database,
) -> impl FnMut(&ProactiveNotification) -> Result<String, String> + '_ {
    |notification| {
        println!(
            "[{}] {}: {}",
            notification.kind.as_str(),
            notification.title,
            notification.message
        );
        let receipt = DeliveryReceipt {
            notification_id: notification.id.clone(),
            success: true,
            delivered_at: Utc::now(),
            channel: "stdout".to_string(),
            error: None,
        };
        if let Err(error) = db.log_delivery(notification, &receipt) {
            warn!(%error, "failed to append to notification log");
        }
        Ok("stdout".to_string())
    }
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NotifyAction::Watch { interval_secs } => {
            let mut config = Config::load()?;
            if let Some(interval) = interval_secs {
                config.scheduler.interval_secs = interval;
            }
            config.scheduler.validate()?;
            let db = Database::open()?;
            let now = Utc::now();

            let mut engine = SchedulerEngine::new(SchedulerTiming::from_config(&config.scheduler));
            let mut registry = TriggerRegistry::builtin();
            let mut manager = NotificationManager::new(
                config.notifier.clone(),
                DedupFilter::new(Duration::seconds(config.scheduler.dedup_window_secs as i64)),
            );
            manager.seed_created_history(db.notifications_created_since(now - Duration::hours(1))?);

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let (stop_tx, stop_rx) = watch::channel(false);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        let _ = stop_tx.send(true);
                    }
                });

                info!(interval = config.scheduler.interval_secs, "watching for triggers");
                run_loop(
                    &mut engine,
                    &mut registry,
                    &mut manager,
                    || Ok(Database::open()?.snapshot(Utc::now())?),
                    stdout_handler(&db),
                    stop_rx,
                    |report| {
                        if report.created > 0 || report.failed_count() > 0 {
                            info!(
                                created = report.created,
                                failed = report.failed_count(),
                                "tick finished"
                            );
                        }
                    },
                )
                .await
            })?;
        }
        NotifyAction::History { limit } => {
            let db = Database::open()?;
            let entries = db.recent_log(limit)?;
            for entry in &entries {
                let status = if entry.success { "ok" } else { "failed" };
                println!(
                    "{} [{}] {} -- {} ({status})",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.kind,
                    entry.title,
                    entry.message,
                );
            }
            if entries.is_empty() {
                println!("No notifications delivered yet.");
            }
        }
    }
    Ok(())
}
