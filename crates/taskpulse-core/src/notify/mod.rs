//! Proactive notification pipeline: types, dedup, delivery gating and
//! the in-memory manager that owns queued and active notifications.

pub mod dedup;
pub mod manager;
pub mod notification;
pub mod policy;

pub use dedup::{DedupFilter, DEFAULT_DEDUP_WINDOW_SECS};
pub use manager::{EmitOutcome, NotificationManager};
pub use notification::{
    DeliveryReceipt, NotificationAction, NotificationCategory, NotificationKind,
    NotificationPriority, ProactiveNotification,
};
pub use policy::{is_quiet_hour, should_deliver, DeliveryDecision};
