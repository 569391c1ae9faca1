//! # Taskpulse Core Library
//!
//! This library provides the core business logic for Taskpulse, a
//! proactive task assistant. It implements a CLI-first philosophy where
//! all operations are available via a standalone CLI binary; any GUI
//! would be a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Scoring**: Pure priority-scoring pipeline turning a state
//!   snapshot into ranked 0-100 scores with human-readable reasons
//! - **Triggers**: Declarative conditions evaluated against snapshots,
//!   with per-trigger cooldowns and daily caps
//! - **Notify**: Deduplication, quiet-hours/rate-limit gating and the
//!   in-memory notification queue
//! - **Scheduler**: A wall-clock state machine that requires the caller
//!   to periodically invoke `poll()` to run trigger ticks
//! - **Storage**: SQLite-based task/session storage and TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`SchedulerEngine`]: Tick cadence state machine
//! - [`TriggerRegistry`]: Trigger definitions and frequency bookkeeping
//! - [`NotificationManager`]: Notification queue and delivery
//! - [`Database`]: Task, session and notification-log persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod scoring;
pub mod storage;
pub mod trigger;

pub use error::{ConfigError, CoreError, DatabaseError, EvaluationError, Result, ValidationError};
pub use model::{Project, StateSnapshot, Task, TaskPriority, TaskStatus, WorkSession};
pub use notify::{
    DedupFilter, DeliveryDecision, DeliveryReceipt, NotificationCategory, NotificationKind,
    NotificationManager, NotificationPriority, ProactiveNotification,
};
pub use scheduler::{
    run_tick, run_trigger_pass, CheckStatus, SchedulerEngine, SchedulerState, SchedulerTiming,
    TickDecision, TickReport, TriggerCheck,
};
pub use scoring::{rank_tasks, score_task, PrioritizedTask, ScoringContext, WorkPattern};
pub use storage::{Config, Database, NotifierConfig, NotifierConfigUpdate, SchedulerTimingConfig};
pub use trigger::{NotificationTrigger, SkipReason, TriggerRegistry};
