//! In-memory notification queue and delivery.
//!
//! The manager owns every notification it creates: triggers enqueue
//! through [`NotificationManager::emit_from_trigger`], delivery moves
//! queue entries to the active list, and only `mark_read` / `dismiss`
//! mutate them afterwards. All state is mutated from the single
//! scheduler callback; no synchronization is needed.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::notify::dedup::DedupFilter;
use crate::notify::notification::{DeliveryReceipt, ProactiveNotification};
use crate::notify::policy::{should_deliver, DeliveryDecision};
use crate::storage::{NotifierConfig, NotifierConfigUpdate};
use crate::trigger::{render_template, NotificationTrigger};

/// Result of asking the manager to create a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Notification created and queued under this id.
    Created(String),
    /// Suppressed: identical (content, kind) within the dedup window.
    Duplicate,
}

/// Owns the queue, active list, dedup log and delivery gating.
pub struct NotificationManager {
    config: NotifierConfig,
    queue: Vec<ProactiveNotification>,
    active: Vec<ProactiveNotification>,
    dedup: DedupFilter,
    /// Creation times of recently produced notifications, for the
    /// hourly rate-limit bucket. Pruned on every append; only the
    /// trailing hour can ever count against the limit.
    created_history: Vec<DateTime<Utc>>,
}

impl NotificationManager {
    pub fn new(config: NotifierConfig, dedup: DedupFilter) -> Self {
        Self {
            config,
            queue: Vec::new(),
            active: Vec::new(),
            dedup,
            created_history: Vec::new(),
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Apply a partial config update. Invalid values are rejected and
    /// the previous config stays in effect.
    pub fn update_config(&mut self, update: &NotifierConfigUpdate) -> Result<(), ConfigError> {
        self.config = update.apply(&self.config)?;
        Ok(())
    }

    /// Seed the rate-limit history, e.g. from a persisted notification
    /// log, so a fresh process does not forget this hour's quota.
    pub fn seed_created_history(&mut self, created: Vec<DateTime<Utc>>) {
        self.created_history.extend(created);
    }

    /// Create a notification from a fired trigger.
    ///
    /// The computed metric is interpolated into the template and kept in
    /// the metadata alongside the trigger id (weak references only).
    pub fn emit_from_trigger(
        &mut self,
        trigger: &NotificationTrigger,
        metric: f64,
        now: DateTime<Utc>,
    ) -> EmitOutcome {
        let message = render_template(&trigger.template, metric);
        let kind = trigger.kind.as_str();

        if self.dedup.is_duplicate(&message, kind, now) {
            debug!(trigger = %trigger.id, "duplicate notification suppressed");
            return EmitOutcome::Duplicate;
        }

        let notification = ProactiveNotification {
            id: Uuid::new_v4().to_string(),
            kind: trigger.kind,
            category: trigger.category,
            title: trigger.title.clone(),
            message: message.clone(),
            priority: trigger.priority,
            trigger_time: now,
            expires_at: None,
            is_read: false,
            is_dismissed: false,
            actions: Vec::new(),
            metadata: serde_json::json!({
                "trigger_id": trigger.id,
                "metric": metric,
            }),
            created_at: now,
        };
        let id = notification.id.clone();

        self.dedup.record(&message, kind, now);
        self.record_created(now);
        self.queue.push(notification);
        EmitOutcome::Created(id)
    }

    /// Enqueue a prebuilt notification (bypasses the dedup log).
    pub fn push(&mut self, notification: ProactiveNotification) {
        self.record_created(notification.created_at);
        self.queue.push(notification);
    }

    /// Append a creation time, dropping entries that can no longer fall
    /// into the current clock-hour bucket.
    fn record_created(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(1);
        self.created_history.retain(|t| *t > cutoff);
        self.created_history.push(now);
    }

    /// Hand every due, unexpired, policy-approved notification to the
    /// delivery handler.
    ///
    /// The handler returns the channel it delivered on, or an error
    /// string. A failing handler yields a failed receipt and never
    /// affects the other queued notifications. Quiet-hours and
    /// rate-limited notifications stay queued for a later attempt;
    /// disabled categories/tiers are dropped.
    pub fn deliver_pending<H>(&mut self, mut handler: H, now: DateTime<Utc>) -> Vec<DeliveryReceipt>
    where
        H: FnMut(&ProactiveNotification) -> Result<String, String>,
    {
        let mut receipts = Vec::new();
        let mut keep = Vec::new();

        for notification in std::mem::take(&mut self.queue) {
            if notification.is_dismissed {
                continue;
            }
            if notification.is_expired(now) {
                debug!(id = %notification.id, "notification expired before delivery");
                continue;
            }
            if !notification.is_due(now) {
                keep.push(notification);
                continue;
            }

            match should_deliver(&notification, &self.created_history, &self.config, now) {
                DeliveryDecision::Deliver => {}
                decision @ (DeliveryDecision::QuietHours | DeliveryDecision::RateLimited) => {
                    debug!(id = %notification.id, ?decision, "delivery deferred");
                    keep.push(notification);
                    continue;
                }
                decision => {
                    debug!(id = %notification.id, ?decision, "notification dropped by policy");
                    continue;
                }
            }

            match handler(&notification) {
                Ok(channel) => {
                    receipts.push(DeliveryReceipt {
                        notification_id: notification.id.clone(),
                        success: true,
                        delivered_at: now,
                        channel,
                        error: None,
                    });
                    self.active.push(notification);
                }
                Err(error) => {
                    warn!(id = %notification.id, %error, "delivery handler failed");
                    receipts.push(DeliveryReceipt {
                        notification_id: notification.id.clone(),
                        success: false,
                        delivered_at: now,
                        channel: String::new(),
                        error: Some(error),
                    });
                }
            }
        }

        self.queue = keep;
        receipts
    }

    /// Mark an active notification as read. Returns false when unknown.
    pub fn mark_read(&mut self, id: &str) -> bool {
        if let Some(n) = self.active.iter_mut().find(|n| n.id == id) {
            n.is_read = true;
            true
        } else {
            false
        }
    }

    /// Dismiss a notification, active or still queued.
    pub fn dismiss(&mut self, id: &str) -> bool {
        if let Some(n) = self.active.iter_mut().find(|n| n.id == id) {
            n.is_dismissed = true;
            return true;
        }
        if let Some(n) = self.queue.iter_mut().find(|n| n.id == id) {
            n.is_dismissed = true;
            return true;
        }
        false
    }

    /// Delivered, undismissed notifications.
    pub fn active_notifications(&self) -> Vec<&ProactiveNotification> {
        self.active.iter().filter(|n| !n.is_dismissed).collect()
    }

    /// Queued notifications awaiting delivery.
    pub fn pending_notifications(&self) -> &[ProactiveNotification] {
        &self.queue
    }
}
