//! Proactive notification types and delivery receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of message this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Alert,
    Suggestion,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Alert => "alert",
            NotificationKind::Suggestion => "suggestion",
            NotificationKind::Reminder => "reminder",
        }
    }
}

/// Category group, gated by the corresponding config toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Productivity,
    TaskHealth,
    Deadline,
    Achievement,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::Productivity => "productivity",
            NotificationCategory::TaskHealth => "task_health",
            NotificationCategory::Deadline => "deadline",
            NotificationCategory::Achievement => "achievement",
        }
    }
}

/// Priority tier: 1 = high, 3 = low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    High,
    Medium,
    Low,
}

impl NotificationPriority {
    pub fn as_u8(self) -> u8 {
        match self {
            NotificationPriority::High => 1,
            NotificationPriority::Medium => 2,
            NotificationPriority::Low => 3,
        }
    }
}

/// An action button attached to a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    /// Opaque action identifier interpreted by the delivery channel.
    pub action: String,
}

/// A notification produced by a trigger firing.
///
/// Owned exclusively by the [`crate::notify::NotificationManager`];
/// after creation only `mark_read` / `dismiss` mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProactiveNotification {
    pub id: String,
    pub kind: NotificationKind,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    /// Earliest instant the notification may be delivered.
    pub trigger_time: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub is_dismissed: bool,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    /// Free-form context (task/project ids, metric values). Weak
    /// references only -- lookup, never ownership.
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ProactiveNotification {
    /// Whether the notification has outlived its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| now >= t).unwrap_or(false)
    }

    /// Whether the notification is due for delivery.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.trigger_time && !self.is_expired(now)
    }
}

/// Outcome of handing one notification to the delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub notification_id: String,
    pub success: bool,
    pub delivered_at: DateTime<Utc>,
    /// Channel name reported by the handler (e.g. "toast", "feed").
    pub channel: String,
    #[serde(default)]
    pub error: Option<String>,
}
