//! Declarative notification triggers and their registry.
//!
//! A trigger is a condition (metric + comparison + threshold), a message
//! template and a frequency policy. The registry evaluates conditions
//! against a state snapshot; frequency bookkeeping (cooldowns, per-day
//! caps) lives here too but is consulted by the scheduler, not by the
//! condition itself.
//!
//! Evaluation is fail-closed: any error while computing a metric means
//! the trigger did not fire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::EvaluationError;
use crate::model::StateSnapshot;
use crate::notify::{NotificationCategory, NotificationKind, NotificationPriority};

/// Comparison operator applied to (metric, threshold).
///
/// Only `Gte`, `Lte` and `Eq` are used by the built-in triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gte,
    Lte,
    Eq,
    Gt,
    Lt,
}

impl Comparison {
    pub fn compare(self, metric: f64, threshold: f64) -> bool {
        match self {
            Comparison::Gte => metric >= threshold,
            Comparison::Lte => metric <= threshold,
            Comparison::Eq => (metric - threshold).abs() < f64::EPSILON,
            Comparison::Gt => metric > threshold,
            Comparison::Lt => metric < threshold,
        }
    }
}

/// Metric a trigger condition is computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerMetric {
    /// Number of open tasks with no activity for `idle_hours`.
    StaleTaskCount { idle_hours: i64 },
    /// Today's average productivity score divided by the all-history
    /// average. Zero when either side has no closed sessions.
    ProductivityRatio,
}

/// Condition deciding whether a trigger *could* fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub metric: TriggerMetric,
    pub operator: Comparison,
    pub threshold: f64,
}

/// How often a trigger is allowed to check and fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyPolicy {
    /// Minimum minutes between condition checks.
    pub check_interval_minutes: i64,
    /// Maximum fires per calendar day.
    pub max_per_day: u32,
    /// Minimum minutes between fires.
    pub cooldown_minutes: i64,
}

/// A declarative notification trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTrigger {
    pub id: String,
    pub condition: TriggerCondition,
    /// Message template; `{value}` interpolates the computed metric.
    pub template: String,
    pub title: String,
    pub kind: NotificationKind,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub frequency: FrequencyPolicy,
    pub active: bool,
}

/// Per-trigger frequency state. In-memory only: a process restart
/// resets all cooldowns.
#[derive(Debug, Clone, Default)]
struct FireHistory {
    last_checked: Option<DateTime<Utc>>,
    last_fired: Option<DateTime<Utc>>,
    fired_on: Option<NaiveDate>,
    fired_today: u32,
}

/// Why a trigger was skipped without evaluating its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Inactive,
    CheckInterval,
    Cooldown,
    DailyCap,
}

/// Holds trigger definitions plus their frequency bookkeeping.
pub struct TriggerRegistry {
    triggers: Vec<NotificationTrigger>,
    history: HashMap<String, FireHistory>,
}

impl TriggerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            triggers: Vec::new(),
            history: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in triggers:
    /// stale tasks (>= 3 idle 48h, daily, 6h cooldown) and
    /// productivity peak (ratio >= 1.3, every 2h, max 3/day).
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.add(NotificationTrigger {
            id: "stale-tasks".to_string(),
            condition: TriggerCondition {
                metric: TriggerMetric::StaleTaskCount { idle_hours: 48 },
                operator: Comparison::Gte,
                threshold: 3.0,
            },
            title: "Stale tasks".to_string(),
            template: "You have {value} tasks with no activity in the last 48 hours".to_string(),
            kind: NotificationKind::Reminder,
            category: NotificationCategory::TaskHealth,
            priority: NotificationPriority::Medium,
            frequency: FrequencyPolicy {
                check_interval_minutes: 24 * 60,
                max_per_day: 1,
                cooldown_minutes: 6 * 60,
            },
            active: true,
        });
        registry.add(NotificationTrigger {
            id: "productivity-peak".to_string(),
            condition: TriggerCondition {
                metric: TriggerMetric::ProductivityRatio,
                operator: Comparison::Gte,
                threshold: 1.3,
            },
            title: "Productivity peak".to_string(),
            template: "You're at {value}x your usual productivity -- a good moment for hard tasks"
                .to_string(),
            kind: NotificationKind::Suggestion,
            category: NotificationCategory::Productivity,
            priority: NotificationPriority::High,
            frequency: FrequencyPolicy {
                check_interval_minutes: 2 * 60,
                max_per_day: 3,
                cooldown_minutes: 0,
            },
            active: true,
        });
        registry
    }

    /// Register a trigger. Adding a trigger is all it takes -- the
    /// evaluator is generic over the condition.
    pub fn add(&mut self, trigger: NotificationTrigger) {
        self.history.entry(trigger.id.clone()).or_default();
        self.triggers.push(trigger);
    }

    pub fn triggers(&self) -> &[NotificationTrigger] {
        &self.triggers
    }

    pub fn get(&self, id: &str) -> Option<&NotificationTrigger> {
        self.triggers.iter().find(|t| t.id == id)
    }

    /// Check the frequency policy before evaluating.
    ///
    /// Returns `Err(reason)` when the trigger must be skipped this tick.
    pub fn ready(&self, trigger: &NotificationTrigger, now: DateTime<Utc>) -> Result<(), SkipReason> {
        if !trigger.active {
            return Err(SkipReason::Inactive);
        }
        let history = self.history.get(&trigger.id).cloned().unwrap_or_default();

        if let Some(checked) = history.last_checked {
            if (now - checked).num_minutes() < trigger.frequency.check_interval_minutes {
                return Err(SkipReason::CheckInterval);
            }
        }
        if let Some(fired) = history.last_fired {
            if trigger.frequency.cooldown_minutes > 0
                && (now - fired).num_minutes() < trigger.frequency.cooldown_minutes
            {
                return Err(SkipReason::Cooldown);
            }
        }
        if history.fired_on == Some(now.date_naive())
            && history.fired_today >= trigger.frequency.max_per_day
        {
            return Err(SkipReason::DailyCap);
        }
        Ok(())
    }

    /// Record that a condition check happened (fired or not).
    pub fn record_checked(&mut self, trigger_id: &str, now: DateTime<Utc>) {
        self.history.entry(trigger_id.to_string()).or_default().last_checked = Some(now);
    }

    /// Record that a trigger fired.
    pub fn record_fired(&mut self, trigger_id: &str, now: DateTime<Utc>) {
        let history = self.history.entry(trigger_id.to_string()).or_default();
        history.last_fired = Some(now);
        let today = now.date_naive();
        if history.fired_on == Some(today) {
            history.fired_today += 1;
        } else {
            history.fired_on = Some(today);
            history.fired_today = 1;
        }
    }

    /// Evaluate a trigger's condition against the snapshot.
    ///
    /// Returns the computed metric alongside the verdict so callers can
    /// interpolate it into the message template.
    pub fn evaluate(
        &self,
        trigger: &NotificationTrigger,
        snapshot: &StateSnapshot,
        now: DateTime<Utc>,
    ) -> Result<(bool, f64), EvaluationError> {
        let metric = compute_metric(&trigger.condition.metric, snapshot, now)?;
        Ok((
            trigger.condition.operator.compare(metric, trigger.condition.threshold),
            metric,
        ))
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Interpolate the computed metric into a message template.
///
/// Whole numbers render without a fraction; ratios keep one decimal.
pub fn render_template(template: &str, value: f64) -> String {
    let rendered = if (value.fract()).abs() < f64::EPSILON {
        format!("{}", value as i64)
    } else {
        format!("{value:.1}")
    };
    template.replace("{value}", &rendered)
}

fn compute_metric(
    metric: &TriggerMetric,
    snapshot: &StateSnapshot,
    now: DateTime<Utc>,
) -> Result<f64, EvaluationError> {
    match metric {
        TriggerMetric::StaleTaskCount { idle_hours } => {
            if *idle_hours <= 0 {
                return Err(EvaluationError::MalformedData(format!(
                    "idle_hours must be positive, got {idle_hours}"
                )));
            }
            Ok(snapshot.stale_tasks(*idle_hours, now).len() as f64)
        }
        TriggerMetric::ProductivityRatio => productivity_ratio(snapshot, now),
    }
}

fn productivity_ratio(snapshot: &StateSnapshot, now: DateTime<Utc>) -> Result<f64, EvaluationError> {
    let closed: Vec<_> = snapshot
        .sessions
        .iter()
        .filter(|s| s.is_closed())
        .collect();

    for session in &closed {
        if let Some(score) = session.productivity_score {
            if score > 10 {
                return Err(EvaluationError::MalformedData(format!(
                    "productivity score {score} out of range for session {}",
                    session.id
                )));
            }
        }
    }

    let avg = |sessions: &[&&crate::model::WorkSession]| -> Option<f64> {
        let scores: Vec<f64> = sessions
            .iter()
            .filter_map(|s| s.productivity_score.map(|v| v as f64))
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    };

    let today = now.date_naive();
    let todays: Vec<_> = closed.iter().filter(|s| s.started_at.date_naive() == today).collect();
    let all: Vec<_> = closed.iter().collect();

    match (avg(&todays), avg(&all)) {
        (Some(current), Some(overall)) if overall > 0.0 => Ok(current / overall),
        _ => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Task, TaskPriority, TaskStatus, WorkSession};
    use chrono::Duration;

    fn stale_task(id: &str, idle_hours: i64, now: DateTime<Utc>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: None,
            created_at: now - Duration::hours(idle_hours + 1),
            updated_at: now - Duration::hours(idle_hours),
            last_worked_at: None,
            project_id: None,
        }
    }

    fn scored_session(id: &str, hours_ago: i64, score: u8, now: DateTime<Utc>) -> WorkSession {
        let started = now - Duration::hours(hours_ago);
        WorkSession {
            id: id.to_string(),
            task_id: "t1".to_string(),
            started_at: started,
            ended_at: Some(started + Duration::minutes(30)),
            duration_minutes: 30,
            productivity_score: Some(score),
        }
    }

    #[test]
    fn comparison_operators() {
        assert!(Comparison::Gte.compare(3.0, 3.0));
        assert!(Comparison::Lte.compare(2.0, 3.0));
        assert!(Comparison::Eq.compare(1.5, 1.5));
        assert!(Comparison::Gt.compare(3.1, 3.0));
        assert!(!Comparison::Lt.compare(3.0, 3.0));
    }

    #[test]
    fn stale_tasks_trigger_fires_at_threshold() {
        let now = Utc::now();
        let registry = TriggerRegistry::builtin();
        let trigger = registry.get("stale-tasks").unwrap();

        let mut snapshot = StateSnapshot::empty(now);
        snapshot.tasks = vec![
            stale_task("a", 50, now),
            stale_task("b", 60, now),
            stale_task("c", 70, now),
        ];
        let (fired, metric) = registry.evaluate(trigger, &snapshot, now).unwrap();
        assert!(fired);
        assert_eq!(metric, 3.0);

        snapshot.tasks.pop();
        let (fired, _) = registry.evaluate(trigger, &snapshot, now).unwrap();
        assert!(!fired);
    }

    #[test]
    fn productivity_peak_fires_on_ratio() {
        let now = Utc::now();
        let registry = TriggerRegistry::builtin();
        let trigger = registry.get("productivity-peak").unwrap();

        let mut snapshot = StateSnapshot::empty(now);
        // History at 5, today at 9 -> ratio well above 1.3.
        // (Today's sessions are part of the overall average too.)
        snapshot.sessions = vec![
            scored_session("old1", 30, 5, now),
            scored_session("old2", 40, 5, now),
            scored_session("old3", 50, 5, now),
            scored_session("today", 1, 9, now),
        ];
        // Keep "today" unambiguous: only run the assertion when the
        // 1h-ago session actually lands on today's date.
        if (now - Duration::hours(1)).date_naive() == now.date_naive() {
            let (fired, metric) = registry.evaluate(trigger, &snapshot, now).unwrap();
            assert!(metric > 1.3, "metric was {metric}");
            assert!(fired);
        }
    }

    #[test]
    fn productivity_ratio_is_zero_without_history() {
        let now = Utc::now();
        let registry = TriggerRegistry::builtin();
        let trigger = registry.get("productivity-peak").unwrap();
        let snapshot = StateSnapshot::empty(now);
        let (fired, metric) = registry.evaluate(trigger, &snapshot, now).unwrap();
        assert!(!fired);
        assert_eq!(metric, 0.0);
    }

    #[test]
    fn malformed_score_is_an_evaluation_error() {
        let now = Utc::now();
        let registry = TriggerRegistry::builtin();
        let trigger = registry.get("productivity-peak").unwrap();

        let mut snapshot = StateSnapshot::empty(now);
        snapshot.sessions = vec![scored_session("bad", 1, 99, now)];
        assert!(registry.evaluate(trigger, &snapshot, now).is_err());
    }

    #[test]
    fn ready_respects_cooldown_and_daily_cap() {
        let now = Utc::now();
        let mut registry = TriggerRegistry::builtin();
        let trigger = registry.get("stale-tasks").unwrap().clone();

        assert!(registry.ready(&trigger, now).is_ok());

        registry.record_fired("stale-tasks", now);
        // Within the 6h cooldown.
        assert_eq!(
            registry.ready(&trigger, now + Duration::hours(1)),
            Err(SkipReason::Cooldown)
        );
        // Past cooldown but at the 1/day cap (same calendar day).
        let later = now + Duration::hours(7);
        if later.date_naive() == now.date_naive() {
            assert_eq!(registry.ready(&trigger, later), Err(SkipReason::DailyCap));
        }
        // Next day is fine again.
        assert!(registry.ready(&trigger, now + Duration::days(1) + Duration::hours(7)).is_ok());
    }

    #[test]
    fn ready_respects_check_interval() {
        let now = Utc::now();
        let mut registry = TriggerRegistry::builtin();
        let trigger = registry.get("productivity-peak").unwrap().clone();

        registry.record_checked("productivity-peak", now);
        assert_eq!(
            registry.ready(&trigger, now + Duration::minutes(30)),
            Err(SkipReason::CheckInterval)
        );
        assert!(registry.ready(&trigger, now + Duration::hours(2)).is_ok());
    }

    #[test]
    fn inactive_trigger_is_skipped() {
        let now = Utc::now();
        let mut registry = TriggerRegistry::builtin();
        let mut trigger = registry.get("stale-tasks").unwrap().clone();
        trigger.active = false;
        registry.add(trigger.clone());
        assert_eq!(registry.ready(&trigger, now), Err(SkipReason::Inactive));
    }

    #[test]
    fn template_rendering() {
        assert_eq!(render_template("{value} tasks idle", 3.0), "3 tasks idle");
        assert_eq!(render_template("at {value}x pace", 1.52), "at 1.5x pace");
        assert_eq!(render_template("no placeholder", 2.0), "no placeholder");
    }
}
