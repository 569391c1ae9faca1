//! Scoring context: work-pattern classification and time-of-day.
//!
//! The scorer never inspects raw session history directly; it consumes a
//! [`ScoringContext`] derived once per pass from the snapshot. Deriving is
//! deterministic for a fixed snapshot and `now`.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::model::StateSnapshot;

/// Coarse classification of recent working behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkPattern {
    /// Consistent long sessions with high productivity scores.
    Productive,
    /// Regular activity with middling scores.
    Moderate,
    /// Sporadic, short or low-scored sessions.
    Low,
    /// No recorded sessions in the lookback window.
    Inactive,
}

/// Phase of the day used for the pattern-fit sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPhase {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPhase {
    /// Classify an hour of day (0-23).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => DayPhase::Morning,
            12..=17 => DayPhase::Afternoon,
            18..=22 => DayPhase::Evening,
            _ => DayPhase::Night,
        }
    }
}

/// How many days of session history feed the classification.
const LOOKBACK_DAYS: i64 = 7;

/// Minimum sessions in an hour bucket before it counts as "productive".
const MIN_SESSIONS_PER_HOUR: usize = 2;

/// Context handed to every scoring call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringContext {
    /// Current hour of day, 0-23.
    pub current_hour: u32,
    pub pattern: WorkPattern,
    /// Hours of day (0-23) in which the user historically scores >= 7.
    pub productive_hours: Vec<u32>,
    /// Project ids worked on within the lookback window.
    pub recent_project_ids: Vec<String>,
}

impl ScoringContext {
    /// Derive the context from a snapshot at a given instant.
    pub fn from_snapshot(snapshot: &StateSnapshot, now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::days(LOOKBACK_DAYS);
        let recent: Vec<_> = snapshot
            .sessions
            .iter()
            .filter(|s| s.is_closed() && s.started_at >= cutoff)
            .collect();

        let pattern = classify(&recent);
        let productive_hours = productive_hours(&recent);

        let mut recent_project_ids: Vec<String> = recent
            .iter()
            .filter_map(|s| {
                snapshot
                    .tasks
                    .iter()
                    .find(|t| t.id == s.task_id)
                    .and_then(|t| t.project_id.clone())
            })
            .collect();
        recent_project_ids.sort();
        recent_project_ids.dedup();

        Self {
            current_hour: now.hour(),
            pattern,
            productive_hours,
            recent_project_ids,
        }
    }

    /// Fixed context for tests and deterministic replays.
    pub fn fixed(current_hour: u32, pattern: WorkPattern) -> Self {
        Self {
            current_hour,
            pattern,
            productive_hours: Vec::new(),
            recent_project_ids: Vec::new(),
        }
    }

    pub fn day_phase(&self) -> DayPhase {
        DayPhase::from_hour(self.current_hour)
    }

    pub fn is_productive_hour(&self) -> bool {
        self.productive_hours.contains(&self.current_hour)
    }
}

fn classify(recent: &[&crate::model::WorkSession]) -> WorkPattern {
    if recent.is_empty() {
        return WorkPattern::Inactive;
    }

    let total_minutes: i64 = recent.iter().map(|s| s.duration_minutes.max(0)).sum();
    let minutes_per_day = total_minutes as f64 / LOOKBACK_DAYS as f64;

    let scored: Vec<u8> = recent.iter().filter_map(|s| s.productivity_score).collect();
    let avg_score = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|&s| s as f64).sum::<f64>() / scored.len() as f64
    };

    if avg_score >= 7.0 && minutes_per_day >= 120.0 {
        WorkPattern::Productive
    } else if avg_score >= 5.0 || minutes_per_day >= 60.0 {
        WorkPattern::Moderate
    } else {
        WorkPattern::Low
    }
}

/// Hour buckets where the averaged productivity score reaches 7.
fn productive_hours(recent: &[&crate::model::WorkSession]) -> Vec<u32> {
    let mut buckets: std::collections::HashMap<u32, Vec<u8>> = std::collections::HashMap::new();
    for session in recent {
        if let Some(score) = session.productivity_score {
            buckets.entry(session.started_at.hour()).or_default().push(score);
        }
    }

    let mut hours: Vec<u32> = buckets
        .into_iter()
        .filter(|(_, scores)| scores.len() >= MIN_SESSIONS_PER_HOUR)
        .filter(|(_, scores)| {
            scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64 >= 7.0
        })
        .map(|(hour, _)| hour)
        .collect();
    hours.sort_unstable();
    hours
}
