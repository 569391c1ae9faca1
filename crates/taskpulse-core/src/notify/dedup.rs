//! Deduplication of recently emitted messages.
//!
//! The dedup key is the exact message content plus its kind. Interpolated
//! data (different counts, ratios) produces a different key and is NOT
//! deduplicated even when semantically equivalent. That literal-equality
//! behaviour is intentional; keep it unless requirements change.

use chrono::{DateTime, Duration, Utc};

/// Default trailing window during which an identical message is suppressed.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
struct SentMessage {
    content: String,
    kind: String,
    at: DateTime<Utc>,
}

/// Rolling log of sent messages with a duplicate check.
///
/// `is_duplicate` is read-only; the caller records a message only after
/// it was actually emitted.
#[derive(Debug, Clone)]
pub struct DedupFilter {
    window: Duration,
    log: Vec<SentMessage>,
}

impl DedupFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            log: Vec::new(),
        }
    }

    /// True if an identical (content, kind) message was emitted within
    /// the trailing window.
    pub fn is_duplicate(&self, content: &str, kind: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        self.log
            .iter()
            .any(|m| m.at > cutoff && m.kind == kind && m.content == content)
    }

    /// Record an emitted message and drop entries past the window.
    pub fn record(&mut self, content: &str, kind: &str, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        self.log.retain(|m| m.at > cutoff);
        self.log.push(SentMessage {
            content: content.to_string(),
            kind: kind.to_string(),
            at: now,
        });
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS))
    }
}
