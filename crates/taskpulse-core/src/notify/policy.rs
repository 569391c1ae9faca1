//! Delivery gating: quiet hours, hourly rate limit, tier toggles.
//!
//! `should_deliver` is a pure function of (notification, recent history,
//! config, now); it mutates nothing.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::notify::notification::ProactiveNotification;
use crate::storage::NotifierConfig;

/// Outcome of the delivery gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryDecision {
    Deliver,
    QuietHours,
    RateLimited,
    PriorityDisabled,
    CategoryDisabled,
}

impl DeliveryDecision {
    pub fn allowed(self) -> bool {
        self == DeliveryDecision::Deliver
    }
}

/// Whether `hour` falls inside the configured quiet window.
///
/// The window may wrap midnight: start 22, end 8 covers 22,23,0..7.
/// A degenerate window (start == end) is treated as disabled.
pub fn is_quiet_hour(hour: u32, start: u8, end: u8) -> bool {
    let (start, end) = (start as u32, end as u32);
    if start == end {
        return false;
    }
    if start > end {
        hour >= start || hour < end
    } else {
        hour >= start && hour < end
    }
}

/// Count of timestamps in the same clock-hour bucket as `now`.
fn same_hour_count(history: &[DateTime<Utc>], now: DateTime<Utc>) -> usize {
    history
        .iter()
        .filter(|t| t.date_naive() == now.date_naive() && t.hour() == now.hour())
        .count()
}

/// Decide whether a notification may be delivered right now.
///
/// `recent_created` holds the creation times of notifications already
/// produced; those in the current clock-hour bucket count against
/// `max_notifications_per_hour`.
pub fn should_deliver(
    notification: &ProactiveNotification,
    recent_created: &[DateTime<Utc>],
    config: &NotifierConfig,
    now: DateTime<Utc>,
) -> DeliveryDecision {
    if !config.category_enabled(notification.category) {
        return DeliveryDecision::CategoryDisabled;
    }
    if !config.priority_enabled(notification.priority) {
        return DeliveryDecision::PriorityDisabled;
    }
    if is_quiet_hour(now.hour(), config.quiet_hours_start, config.quiet_hours_end) {
        return DeliveryDecision::QuietHours;
    }
    if same_hour_count(recent_created, now) >= config.max_notifications_per_hour as usize {
        return DeliveryDecision::RateLimited;
    }
    DeliveryDecision::Deliver
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::notification::{NotificationCategory, NotificationKind, NotificationPriority};
    use chrono::{Duration, TimeZone};

    fn notification(
        category: NotificationCategory,
        priority: NotificationPriority,
        now: DateTime<Utc>,
    ) -> ProactiveNotification {
        ProactiveNotification {
            id: "n1".to_string(),
            kind: NotificationKind::Alert,
            category,
            title: "t".to_string(),
            message: "m".to_string(),
            priority,
            trigger_time: now,
            expires_at: None,
            is_read: false,
            is_dismissed: false,
            actions: Vec::new(),
            metadata: serde_json::Value::Null,
            created_at: now,
        }
    }

    #[test]
    fn quiet_hours_wrap_around_midnight() {
        // start 22, end 8: hours 22,23,0..7 quiet; 8..21 not.
        for hour in [22, 23, 0, 3, 7] {
            assert!(is_quiet_hour(hour, 22, 8), "hour {hour} should be quiet");
        }
        for hour in [8, 12, 21] {
            assert!(!is_quiet_hour(hour, 22, 8), "hour {hour} should not be quiet");
        }
    }

    #[test]
    fn quiet_hours_daytime_window() {
        for hour in [12, 13, 16] {
            assert!(is_quiet_hour(hour, 12, 17));
        }
        for hour in [11, 17, 22] {
            assert!(!is_quiet_hour(hour, 12, 17));
        }
    }

    #[test]
    fn degenerate_window_never_quiet() {
        for hour in 0..24 {
            assert!(!is_quiet_hour(hour, 9, 9));
        }
    }

    #[test]
    fn quiet_hours_block_delivery_regardless_of_other_conditions() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 23, 0, 0).unwrap();
        let config = NotifierConfig::default(); // quiet 22 -> 8
        let n = notification(NotificationCategory::Deadline, NotificationPriority::High, now);
        assert_eq!(should_deliver(&n, &[], &config, now), DeliveryDecision::QuietHours);
    }

    #[test]
    fn rate_limit_uses_hour_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 14, 40, 0).unwrap();
        let mut config = NotifierConfig::default();
        config.max_notifications_per_hour = 2;
        let n = notification(NotificationCategory::Deadline, NotificationPriority::High, now);

        // Two already created this hour: third rejected.
        let history = vec![now - Duration::minutes(30), now - Duration::minutes(10)];
        assert_eq!(should_deliver(&n, &history, &config, now), DeliveryDecision::RateLimited);

        // Next hour bucket: accepted again.
        let next_hour = now + Duration::hours(1);
        assert_eq!(should_deliver(&n, &history, &config, next_hour), DeliveryDecision::Deliver);
    }

    #[test]
    fn rate_limit_default_cap_of_five() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 14, 40, 0).unwrap();
        let config = NotifierConfig::default();
        let n = notification(NotificationCategory::Deadline, NotificationPriority::High, now);

        let history: Vec<_> = (0..5).map(|i| now - Duration::minutes(i * 5)).collect();
        assert_eq!(should_deliver(&n, &history, &config, now), DeliveryDecision::RateLimited);
        assert_eq!(
            should_deliver(&n, &history[..4], &config, now),
            DeliveryDecision::Deliver
        );
    }

    #[test]
    fn disabled_tier_and_category_block() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 14, 0, 0).unwrap();
        let mut config = NotifierConfig::default();
        config.priorities.enable_low = false;
        config.enable_achievement_celebrations = false;

        let low = notification(NotificationCategory::Deadline, NotificationPriority::Low, now);
        assert_eq!(should_deliver(&low, &[], &config, now), DeliveryDecision::PriorityDisabled);

        let achievement =
            notification(NotificationCategory::Achievement, NotificationPriority::High, now);
        assert_eq!(
            should_deliver(&achievement, &[], &config, now),
            DeliveryDecision::CategoryDisabled
        );
    }
}
