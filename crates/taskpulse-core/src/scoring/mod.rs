//! Priority scoring pipeline.
//!
//! Pure functions only: given a snapshot and a derived context, produce
//! 0-100 scores with human-readable reasons. No I/O, no hidden clock.

pub mod context;
pub mod priority;

pub use context::{DayPhase, ScoringContext, WorkPattern};
pub use priority::{rank_tasks, score_task, PrioritizedTask, SubScores};
