//! Priority scoring algorithm.
//!
//! Ranks task snapshots by a weighted sum of five bounded sub-scores:
//! urgency (35%), importance (25%), recency (15%), user preference (15%)
//! and work-pattern fit (10%). Every sub-score is a deterministic
//! heuristic clamped to [0, 100]; the final score rounds to the nearest
//! integer. Missing input fields fall back to their weakest default --
//! the scorer never fails.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};

use crate::model::{StateSnapshot, Task, TaskPriority, TaskStatus};
use crate::scoring::context::{DayPhase, ScoringContext, WorkPattern};

const URGENCY_WEIGHT: f64 = 0.35;
const IMPORTANCE_WEIGHT: f64 = 0.25;
const RECENCY_WEIGHT: f64 = 0.15;
const PREFERENCE_WEIGHT: f64 = 0.15;
const PATTERN_FIT_WEIGHT: f64 = 0.10;

const MAX_REASONS: usize = 3;

/// Title fragments that mark a task as blocking or blocked work.
const BLOCKING_KEYWORDS: [&str; 4] = ["block", "depend", "waiting on", "unblock"];

/// The five bounded sub-scores behind a final priority score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubScores {
    pub urgency: f64,
    pub importance: f64,
    pub recency: f64,
    pub preference: f64,
    pub pattern_fit: f64,
}

/// Derived, ephemeral ranking entry. Recomputed on every pass,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizedTask {
    pub task_id: String,
    pub title: String,
    /// Final weighted score, 0-100.
    pub score: u8,
    /// Up to three human-readable reasons, order-stable.
    pub reasons: Vec<String>,
    pub subscores: SubScores,
}

/// Urgency sub-score (0-100).
///
/// Base from the declared priority (urgent=100, high=75, medium=50,
/// low=25), plus a staleness bonus (+30 beyond 7 days since update,
/// +15 beyond 3, +5 beyond 1) and +20 while in progress.
pub fn urgency_score(task: &Task, now: DateTime<Utc>) -> f64 {
    let base = match task.priority {
        TaskPriority::Urgent => 100.0,
        TaskPriority::High => 75.0,
        TaskPriority::Medium => 50.0,
        TaskPriority::Low => 25.0,
    };

    let days = task.days_since_update(now);
    let staleness = if days > 7 {
        30.0
    } else if days > 3 {
        15.0
    } else if days > 1 {
        5.0
    } else {
        0.0
    };

    let in_progress = if task.status == TaskStatus::InProgress {
        20.0
    } else {
        0.0
    };

    clamp(base + staleness + in_progress)
}

/// Importance sub-score (0-100).
///
/// Base 50, +25 when linked to an active project, +15 more when that
/// project is below 30% progress, +30 when the title mentions blocking
/// or dependency work.
pub fn importance_score(task: &Task, snapshot: &StateSnapshot) -> f64 {
    let mut score = 50.0;

    if let Some(project) = task.project_id.as_deref().and_then(|id| snapshot.project(id)) {
        if project.active {
            score += 25.0;
            if project.progress_pct < 30 {
                score += 15.0;
            }
        }
    }

    if mentions_blocking(&task.title) {
        score += 30.0;
    }

    clamp(score)
}

/// Recency sub-score (0-100), stepped inverse of days since update.
pub fn recency_score(task: &Task, now: DateTime<Utc>) -> f64 {
    match task.days_since_update(now) {
        0 => 100.0,
        1 => 80.0,
        2 => 65.0,
        3 => 50.0,
        4..=7 => 35.0,
        _ => 20.0,
    }
}

/// User-preference sub-score (0-100).
///
/// Matches the coarse work-pattern classification against the task's
/// declared priority: an engaged user is steered toward heavier work,
/// an inactive one toward anything urgent enough to restart momentum.
pub fn preference_score(task: &Task, context: &ScoringContext) -> f64 {
    let row: [f64; 4] = match context.pattern {
        WorkPattern::Productive => [95.0, 90.0, 70.0, 50.0],
        WorkPattern::Moderate => [90.0, 80.0, 65.0, 45.0],
        WorkPattern::Low => [85.0, 70.0, 55.0, 35.0],
        WorkPattern::Inactive => [80.0, 60.0, 45.0, 30.0],
    };
    match task.priority {
        TaskPriority::Urgent => row[0],
        TaskPriority::High => row[1],
        TaskPriority::Medium => row[2],
        TaskPriority::Low => row[3],
    }
}

/// Work-pattern fit sub-score (0-100).
///
/// 90 when the current hour is in the user's historically productive
/// set, otherwise banded by phase of day.
pub fn pattern_fit_score(context: &ScoringContext) -> f64 {
    if context.is_productive_hour() {
        return 90.0;
    }
    match context.day_phase() {
        DayPhase::Morning => 80.0,
        DayPhase::Afternoon => 70.0,
        DayPhase::Evening => 60.0,
        DayPhase::Night => 40.0,
    }
}

/// Score a single task against the snapshot and context.
pub fn score_task(
    task: &Task,
    snapshot: &StateSnapshot,
    context: &ScoringContext,
    now: DateTime<Utc>,
) -> PrioritizedTask {
    let subscores = SubScores {
        urgency: urgency_score(task, now),
        importance: importance_score(task, snapshot),
        recency: recency_score(task, now),
        preference: preference_score(task, context),
        pattern_fit: pattern_fit_score(context),
    };

    let weighted = subscores.urgency * URGENCY_WEIGHT
        + subscores.importance * IMPORTANCE_WEIGHT
        + subscores.recency * RECENCY_WEIGHT
        + subscores.preference * PREFERENCE_WEIGHT
        + subscores.pattern_fit * PATTERN_FIT_WEIGHT;

    let score = clamp(weighted).round() as u8;

    PrioritizedTask {
        task_id: task.id.clone(),
        title: task.title.clone(),
        score,
        reasons: reasons(task, &subscores, now),
        subscores,
    }
}

/// Rank all open tasks in the snapshot, highest score first.
///
/// Ties break on task id so repeated calls produce the same order.
pub fn rank_tasks(
    snapshot: &StateSnapshot,
    context: &ScoringContext,
    now: DateTime<Utc>,
) -> Vec<PrioritizedTask> {
    let mut ranked: Vec<PrioritizedTask> = snapshot
        .tasks
        .iter()
        .filter(|t| t.status.is_open())
        .map(|t| score_task(t, snapshot, context, now))
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.task_id.cmp(&b.task_id)));
    ranked
}

/// Threshold checks over the sub-scores, evaluated in a fixed order and
/// capped at three entries.
fn reasons(task: &Task, subscores: &SubScores, now: DateTime<Utc>) -> Vec<String> {
    let mut out = Vec::new();

    if subscores.urgency > 80.0 {
        out.push("high urgency".to_string());
    }
    if mentions_blocking(&task.title) {
        out.push("mentions blocking work".to_string());
    }
    if subscores.importance > 75.0 {
        out.push("tied to an active project".to_string());
    }
    let days = task.days_since_update(now);
    if days > 7 {
        out.push(format!("untouched for {days} days"));
    }
    if subscores.pattern_fit >= 90.0 {
        out.push("matches your productive hours".to_string());
    }

    out.truncate(MAX_REASONS);
    out
}

fn mentions_blocking(title: &str) -> bool {
    let lower = title.to_lowercase();
    BLOCKING_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn clamp(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
