//! Delivery scheduler.
//!
//! The engine is a wall-clock state machine. It does not own threads or
//! timers -- the caller polls `poll(now)` and runs a tick when told to.
//!
//! ## State transitions
//!
//! ```text
//! Idle -> Scheduled(initial delay) -> Running <-> Paused -> Stopped
//! ```
//!
//! Pausing cancels the pending tick but never aborts one in flight;
//! resuming re-arms after a short grace delay. Both are idempotent.
//! The engine enforces single-flight: if a tick is still open when the
//! next one comes due, the new tick is skipped and the cadence pushed
//! forward rather than overlapping.
//!
//! A tick evaluates every trigger independently (settle-all, never
//! fail-fast) and collects the per-trigger outcomes into a
//! [`TickReport`] for diagnostics. A failing evaluator means "did not
//! fire" -- errors never escape the loop.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::model::StateSnapshot;
use crate::notify::{DeliveryReceipt, EmitOutcome, NotificationManager};
use crate::storage::SchedulerTimingConfig;
use crate::trigger::{SkipReason, TriggerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
    Paused,
    Stopped,
}

/// What the caller should do after polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Nothing due yet.
    NotDue,
    /// Run a tick now, then call `finish_tick`.
    Due,
    /// A tick was due but the previous one is still in flight.
    SkippedOverlap,
}

/// Scheduler cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub resume_grace: Duration,
}

impl SchedulerTiming {
    pub fn from_config(config: &SchedulerTimingConfig) -> Self {
        Self {
            initial_delay: Duration::seconds(config.initial_delay_secs as i64),
            interval: Duration::seconds(config.interval_secs as i64),
            resume_grace: Duration::seconds(config.resume_grace_secs as i64),
        }
    }
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self::from_config(&SchedulerTimingConfig::default())
    }
}

/// Wall-clock scheduler state machine.
#[derive(Debug, Clone)]
pub struct SchedulerEngine {
    timing: SchedulerTiming,
    state: SchedulerState,
    next_tick_at: Option<DateTime<Utc>>,
    tick_in_flight: bool,
    ticks_run: u64,
    ticks_skipped: u64,
}

impl SchedulerEngine {
    pub fn new(timing: SchedulerTiming) -> Self {
        Self {
            timing,
            state: SchedulerState::Idle,
            next_tick_at: None,
            tick_in_flight: false,
            ticks_run: 0,
            ticks_skipped: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn next_tick_at(&self) -> Option<DateTime<Utc>> {
        self.next_tick_at
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped
    }

    /// Arm the first tick after the initial delay. No-op unless idle.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Scheduled;
            self.next_tick_at = Some(now + self.timing.initial_delay);
        }
    }

    /// Check whether a tick is due.
    ///
    /// On `Due` the engine marks the tick in flight and advances the
    /// cadence; the caller must close the tick with [`finish_tick`].
    ///
    /// [`finish_tick`]: SchedulerEngine::finish_tick
    pub fn poll(&mut self, now: DateTime<Utc>) -> TickDecision {
        if !matches!(self.state, SchedulerState::Scheduled | SchedulerState::Running) {
            return TickDecision::NotDue;
        }
        let due = match self.next_tick_at {
            Some(at) => now >= at,
            None => false,
        };
        if !due {
            return TickDecision::NotDue;
        }

        self.next_tick_at = Some(now + self.timing.interval);
        if self.tick_in_flight {
            self.ticks_skipped += 1;
            return TickDecision::SkippedOverlap;
        }
        self.state = SchedulerState::Running;
        self.tick_in_flight = true;
        TickDecision::Due
    }

    /// Close the tick opened by the last `Due` poll.
    pub fn finish_tick(&mut self) {
        if self.tick_in_flight {
            self.tick_in_flight = false;
            self.ticks_run += 1;
        }
    }

    /// Cancel pending ticks. A tick already in flight is not aborted,
    /// only future ones are suppressed. Idempotent.
    pub fn pause(&mut self) {
        if self.state != SchedulerState::Stopped {
            self.state = SchedulerState::Paused;
            self.next_tick_at = None;
        }
    }

    /// Re-arm after the grace delay. No-op unless paused.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.state == SchedulerState::Paused {
            self.state = SchedulerState::Scheduled;
            self.next_tick_at = Some(now + self.timing.resume_grace);
        }
    }

    /// Terminal teardown. Idempotent.
    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
        self.next_tick_at = None;
        self.tick_in_flight = false;
    }
}

/// Outcome of one trigger's check within a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    Fired { metric: f64 },
    /// Condition held but the message was a dedup-window duplicate.
    FiredDuplicate { metric: f64 },
    NotFired { metric: f64 },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCheck {
    pub trigger_id: String,
    #[serde(flatten)]
    pub status: CheckStatus,
}

/// Diagnostic record of one full tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub checks: Vec<TriggerCheck>,
    /// Notifications created this tick.
    pub created: usize,
    pub receipts: Vec<DeliveryReceipt>,
}

impl TickReport {
    pub fn fired_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Fired { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Failed { .. }))
            .count()
    }
}

/// Evaluate every registered trigger against the snapshot, enqueueing a
/// notification for each fire.
///
/// Checks settle independently: one failure is recorded and the rest
/// still run. No evaluation order is guaranteed.
pub fn run_trigger_pass(
    registry: &mut TriggerRegistry,
    manager: &mut NotificationManager,
    snapshot: &StateSnapshot,
    now: DateTime<Utc>,
) -> (Vec<TriggerCheck>, usize) {
    let triggers: Vec<_> = registry.triggers().to_vec();
    let mut checks = Vec::with_capacity(triggers.len());
    let mut created = 0;

    for trigger in &triggers {
        if let Err(reason) = registry.ready(trigger, now) {
            checks.push(TriggerCheck {
                trigger_id: trigger.id.clone(),
                status: CheckStatus::Skipped { reason },
            });
            continue;
        }

        registry.record_checked(&trigger.id, now);
        let status = match registry.evaluate(trigger, snapshot, now) {
            Ok((true, metric)) => {
                registry.record_fired(&trigger.id, now);
                match manager.emit_from_trigger(trigger, metric, now) {
                    EmitOutcome::Created(_) => {
                        created += 1;
                        CheckStatus::Fired { metric }
                    }
                    EmitOutcome::Duplicate => CheckStatus::FiredDuplicate { metric },
                }
            }
            Ok((false, metric)) => CheckStatus::NotFired { metric },
            Err(error) => {
                // Fail-closed: an erroring evaluator never fires.
                warn!(trigger = %trigger.id, %error, "trigger evaluation failed");
                CheckStatus::Failed {
                    error: error.to_string(),
                }
            }
        };
        checks.push(TriggerCheck {
            trigger_id: trigger.id.clone(),
            status,
        });
    }

    (checks, created)
}

/// Run one full tick: trigger pass, then delivery.
pub fn run_tick<H>(
    registry: &mut TriggerRegistry,
    manager: &mut NotificationManager,
    snapshot: &StateSnapshot,
    handler: H,
    now: DateTime<Utc>,
) -> TickReport
where
    H: FnMut(&crate::notify::ProactiveNotification) -> Result<String, String>,
{
    let (checks, created) = run_trigger_pass(registry, manager, snapshot, now);
    let receipts = manager.deliver_pending(handler, now);
    let report = TickReport {
        started_at: now,
        checks,
        created,
        receipts,
    };
    debug!(
        fired = report.fired_count(),
        failed = report.failed_count(),
        created = report.created,
        delivered = report.receipts.iter().filter(|r| r.success).count(),
        "tick complete"
    );
    report
}

/// Drive the engine until the stop signal flips to true.
///
/// `snapshot_fn` supplies fresh state each tick; a failing snapshot
/// logs and skips the tick (the next scheduled tick supersedes it).
/// Reports are handed to `on_report` as they complete.
pub async fn run_loop<S, H, R>(
    engine: &mut SchedulerEngine,
    registry: &mut TriggerRegistry,
    manager: &mut NotificationManager,
    mut snapshot_fn: S,
    mut handler: H,
    mut stop: watch::Receiver<bool>,
    mut on_report: R,
) -> Result<()>
where
    S: FnMut() -> Result<StateSnapshot, CoreError>,
    H: FnMut(&crate::notify::ProactiveNotification) -> Result<String, String>,
    R: FnMut(&TickReport),
{
    engine.arm(Utc::now());
    info!(next = ?engine.next_tick_at(), "scheduler armed");

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }

        let now = Utc::now();
        match engine.poll(now) {
            TickDecision::NotDue => {}
            TickDecision::SkippedOverlap => {
                warn!("tick overlapped previous one; skipping");
            }
            TickDecision::Due => {
                match snapshot_fn() {
                    Ok(snapshot) => {
                        let report = run_tick(registry, manager, &snapshot, &mut handler, now);
                        on_report(&report);
                    }
                    Err(error) => {
                        // Missed tick; superseded by the next one.
                        warn!(%error, "snapshot unavailable, skipping tick");
                    }
                }
                engine.finish_tick();
            }
        }
    }

    engine.stop();
    info!(
        ticks = engine.ticks_run(),
        skipped = engine.ticks_skipped(),
        "scheduler stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::DedupFilter;
    use crate::storage::NotifierConfig;
    use crate::trigger::{
        Comparison, FrequencyPolicy, NotificationTrigger, TriggerCondition, TriggerMetric,
    };
    use crate::model::{Task, TaskPriority, TaskStatus};
    use crate::notify::{NotificationCategory, NotificationKind, NotificationPriority};
    use chrono::TimeZone;

    fn timing() -> SchedulerTiming {
        SchedulerTiming {
            initial_delay: Duration::seconds(10),
            interval: Duration::seconds(300),
            resume_grace: Duration::seconds(5),
        }
    }

    fn daytime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, 14, 0, 0).unwrap()
    }

    fn stale_snapshot(count: usize, now: DateTime<Utc>) -> StateSnapshot {
        let mut snapshot = StateSnapshot::empty(now);
        for i in 0..count {
            snapshot.tasks.push(Task {
                id: format!("t{i}"),
                title: format!("Task {i}"),
                status: TaskStatus::Pending,
                priority: TaskPriority::Medium,
                due_date: None,
                created_at: now - Duration::days(5),
                updated_at: now - Duration::days(3),
                last_worked_at: None,
                project_id: None,
            });
        }
        snapshot
    }

    fn manager() -> NotificationManager {
        NotificationManager::new(NotifierConfig::default(), DedupFilter::default())
    }

    #[test]
    fn lifecycle_idle_to_running() {
        let now = daytime();
        let mut engine = SchedulerEngine::new(timing());
        assert_eq!(engine.state(), SchedulerState::Idle);
        assert_eq!(engine.poll(now), TickDecision::NotDue);

        engine.arm(now);
        assert_eq!(engine.state(), SchedulerState::Scheduled);
        // Initial delay not elapsed.
        assert_eq!(engine.poll(now + Duration::seconds(5)), TickDecision::NotDue);

        assert_eq!(engine.poll(now + Duration::seconds(10)), TickDecision::Due);
        assert_eq!(engine.state(), SchedulerState::Running);
        engine.finish_tick();
        assert_eq!(engine.ticks_run(), 1);

        // Next tick after the recurring interval.
        assert_eq!(engine.poll(now + Duration::seconds(60)), TickDecision::NotDue);
        assert_eq!(engine.poll(now + Duration::seconds(311)), TickDecision::Due);
    }

    #[test]
    fn single_flight_skips_overlapping_tick() {
        let now = daytime();
        let mut engine = SchedulerEngine::new(timing());
        engine.arm(now);
        assert_eq!(engine.poll(now + Duration::seconds(10)), TickDecision::Due);

        // Previous tick never finished; next due tick is skipped.
        let later = now + Duration::seconds(10 + 300);
        assert_eq!(engine.poll(later), TickDecision::SkippedOverlap);
        assert_eq!(engine.ticks_skipped(), 1);

        engine.finish_tick();
        assert_eq!(engine.poll(later + Duration::seconds(300)), TickDecision::Due);
    }

    #[test]
    fn pause_is_idempotent_and_cancels_pending_tick() {
        let now = daytime();
        let mut engine = SchedulerEngine::new(timing());
        engine.arm(now);

        engine.pause();
        engine.pause(); // double pause: no panic, no double cleanup
        assert_eq!(engine.state(), SchedulerState::Paused);
        assert!(engine.next_tick_at().is_none());

        // No ticks while paused, however long we wait.
        assert_eq!(engine.poll(now + Duration::hours(1)), TickDecision::NotDue);
    }

    #[test]
    fn resume_rearms_exactly_one_cycle_after_grace() {
        let now = daytime();
        let mut engine = SchedulerEngine::new(timing());
        engine.arm(now);
        engine.pause();
        engine.pause();

        engine.resume(now);
        assert_eq!(engine.state(), SchedulerState::Scheduled);
        assert_eq!(engine.next_tick_at(), Some(now + Duration::seconds(5)));

        // Resume when not paused is a no-op.
        engine.resume(now + Duration::seconds(1));
        assert_eq!(engine.next_tick_at(), Some(now + Duration::seconds(5)));

        assert_eq!(engine.poll(now + Duration::seconds(5)), TickDecision::Due);
    }

    #[test]
    fn stop_is_terminal_and_idempotent() {
        let now = daytime();
        let mut engine = SchedulerEngine::new(timing());
        engine.arm(now);
        engine.stop();
        engine.stop();
        assert_eq!(engine.state(), SchedulerState::Stopped);
        assert_eq!(engine.poll(now + Duration::hours(1)), TickDecision::NotDue);
        engine.resume(now);
        assert_eq!(engine.state(), SchedulerState::Stopped);
    }

    #[test]
    fn trigger_pass_fires_and_enqueues() {
        let now = daytime();
        let mut registry = TriggerRegistry::builtin();
        let mut mgr = manager();
        let snapshot = stale_snapshot(3, now);

        let (checks, created) = run_trigger_pass(&mut registry, &mut mgr, &snapshot, now);
        assert_eq!(checks.len(), 2);
        assert_eq!(created, 1);
        let stale = checks.iter().find(|c| c.trigger_id == "stale-tasks").unwrap();
        assert!(matches!(stale.status, CheckStatus::Fired { metric } if metric == 3.0));
        assert_eq!(mgr.pending_notifications().len(), 1);
    }

    #[test]
    fn failing_trigger_is_fail_closed_and_others_still_run() {
        let now = daytime();
        let mut registry = TriggerRegistry::new();
        // idle_hours <= 0 makes the metric computation fail.
        registry.add(NotificationTrigger {
            id: "broken".to_string(),
            condition: TriggerCondition {
                metric: TriggerMetric::StaleTaskCount { idle_hours: -1 },
                operator: Comparison::Gte,
                threshold: 0.0,
            },
            title: "Broken".to_string(),
            template: "{value}".to_string(),
            kind: NotificationKind::Alert,
            category: NotificationCategory::TaskHealth,
            priority: NotificationPriority::High,
            frequency: FrequencyPolicy {
                check_interval_minutes: 0,
                max_per_day: 10,
                cooldown_minutes: 0,
            },
            active: true,
        });
        registry.add(NotificationTrigger {
            id: "healthy".to_string(),
            condition: TriggerCondition {
                metric: TriggerMetric::StaleTaskCount { idle_hours: 48 },
                operator: Comparison::Gte,
                threshold: 1.0,
            },
            title: "Stale".to_string(),
            template: "{value} stale".to_string(),
            kind: NotificationKind::Reminder,
            category: NotificationCategory::TaskHealth,
            priority: NotificationPriority::Medium,
            frequency: FrequencyPolicy {
                check_interval_minutes: 0,
                max_per_day: 10,
                cooldown_minutes: 0,
            },
            active: true,
        });

        let mut mgr = manager();
        let snapshot = stale_snapshot(2, now);
        let (checks, created) = run_trigger_pass(&mut registry, &mut mgr, &snapshot, now);

        let broken = checks.iter().find(|c| c.trigger_id == "broken").unwrap();
        assert!(matches!(broken.status, CheckStatus::Failed { .. }));
        let healthy = checks.iter().find(|c| c.trigger_id == "healthy").unwrap();
        assert!(matches!(healthy.status, CheckStatus::Fired { .. }));
        // The broken trigger produced nothing; the healthy one did.
        assert_eq!(created, 1);
    }

    #[test]
    fn second_pass_within_cooldown_is_skipped() {
        let now = daytime();
        let mut registry = TriggerRegistry::builtin();
        let mut mgr = manager();
        let snapshot = stale_snapshot(3, now);

        run_trigger_pass(&mut registry, &mut mgr, &snapshot, now);
        let (checks, created) =
            run_trigger_pass(&mut registry, &mut mgr, &snapshot, now + Duration::minutes(5));
        assert_eq!(created, 0);
        let stale = checks.iter().find(|c| c.trigger_id == "stale-tasks").unwrap();
        assert!(matches!(stale.status, CheckStatus::Skipped { .. }));
    }

    #[test]
    fn run_tick_delivers_created_notifications() {
        let now = daytime();
        let mut registry = TriggerRegistry::builtin();
        let mut mgr = manager();
        let snapshot = stale_snapshot(3, now);

        let report = run_tick(&mut registry, &mut mgr, &snapshot, |_| Ok("toast".to_string()), now);
        assert_eq!(report.created, 1);
        assert_eq!(report.receipts.len(), 1);
        assert!(report.receipts[0].success);
        assert_eq!(mgr.active_notifications().len(), 1);
    }

    #[tokio::test]
    async fn run_loop_stops_on_signal() {
        let mut engine = SchedulerEngine::new(SchedulerTiming {
            initial_delay: Duration::seconds(60),
            interval: Duration::seconds(60),
            resume_grace: Duration::seconds(1),
        });
        let mut registry = TriggerRegistry::builtin();
        let mut mgr = manager();
        let (tx, rx) = watch::channel(false);

        let handle = async {
            run_loop(
                &mut engine,
                &mut registry,
                &mut mgr,
                || Ok(StateSnapshot::empty(Utc::now())),
                |_| Ok("toast".to_string()),
                rx,
                |_| {},
            )
            .await
        };

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(engine.state(), SchedulerState::Stopped);
    }
}
