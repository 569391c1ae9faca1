//! Task, project and work-session snapshot types.
//!
//! These are the inbound data contract: the scorer, trigger registry and
//! notification manager consume snapshots of this shape but never fetch
//! them -- the caller (CLI or host application) supplies them, typically
//! from the local store in [`crate::storage::Database`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle status.
///
/// Transitions are monotonic in the UI but not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Whether the task still counts as open work.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Declared task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            other => Err(format!("unknown task priority: {other}")),
        }
    }
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

/// A task snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Optional deadline. Missing means no due-date contribution to scoring.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last time a work session touched this task.
    #[serde(default)]
    pub last_worked_at: Option<DateTime<Utc>>,
    /// Weak reference to the owning project, if any.
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Task {
    /// Whole days since the task was last updated, saturating at zero.
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_days().max(0)
    }
}

/// A project snapshot, consumed for importance scoring only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub active: bool,
    /// Completion percentage, 0-100.
    pub progress_pct: u8,
}

/// A recorded work session.
///
/// Created when a user starts a timer, closed when stopped;
/// immutable once closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    /// Self-reported productivity, 0-10. Missing for still-open sessions.
    #[serde(default)]
    pub productivity_score: Option<u8>,
}

impl WorkSession {
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Point-in-time snapshot of everything the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub tasks: Vec<Task>,
    pub sessions: Vec<WorkSession>,
    pub projects: Vec<Project>,
    pub taken_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Empty snapshot at the given instant.
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self {
            tasks: Vec::new(),
            sessions: Vec::new(),
            projects: Vec::new(),
            taken_at,
        }
    }

    /// Look up a project by id.
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Open tasks with no activity for at least `idle_hours`.
    pub fn stale_tasks(&self, idle_hours: i64, now: DateTime<Utc>) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status.is_open())
            .filter(|t| {
                let last = t.last_worked_at.unwrap_or(t.updated_at);
                (now - last).num_hours() >= idle_hours
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_task(id: &str, status: TaskStatus, updated_days_ago: i64, now: DateTime<Utc>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            status,
            priority: TaskPriority::Medium,
            due_date: None,
            created_at: now - Duration::days(updated_days_ago + 1),
            updated_at: now - Duration::days(updated_days_ago),
            last_worked_at: None,
            project_id: None,
        }
    }

    #[test]
    fn status_is_open() {
        assert!(TaskStatus::Pending.is_open());
        assert!(TaskStatus::InProgress.is_open());
        assert!(!TaskStatus::Completed.is_open());
        assert!(!TaskStatus::Cancelled.is_open());
    }

    #[test]
    fn days_since_update_saturates_at_zero() {
        let now = Utc::now();
        let mut task = make_task("t1", TaskStatus::Pending, 0, now);
        task.updated_at = now + Duration::hours(2);
        assert_eq!(task.days_since_update(now), 0);
    }

    #[test]
    fn stale_tasks_filters_by_idle_hours_and_status() {
        let now = Utc::now();
        let snapshot = StateSnapshot {
            tasks: vec![
                make_task("fresh", TaskStatus::Pending, 0, now),
                make_task("stale", TaskStatus::Pending, 3, now),
                make_task("done", TaskStatus::Completed, 10, now),
            ],
            sessions: Vec::new(),
            projects: Vec::new(),
            taken_at: now,
        };

        let stale = snapshot.stale_tasks(48, now);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "stale");
    }

    #[test]
    fn stale_tasks_prefers_last_worked_at() {
        let now = Utc::now();
        let mut task = make_task("t1", TaskStatus::Pending, 5, now);
        task.last_worked_at = Some(now - Duration::hours(1));

        let snapshot = StateSnapshot {
            tasks: vec![task],
            sessions: Vec::new(),
            projects: Vec::new(),
            taken_at: now,
        };
        assert!(snapshot.stale_tasks(48, now).is_empty());
    }

    #[test]
    fn status_parse_roundtrip() {
        for s in ["pending", "in_progress", "completed", "cancelled"] {
            let parsed: TaskStatus = s.parse().unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!("bogus".parse::<TaskStatus>().is_err());
    }
}
