//! Intake counters (no exporter, logged at debug level)

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    quotes_accepted: AtomicU64,
    quotes_rejected: AtomicU64,
    captcha_failures: AtomicU64,
    emails_sent: AtomicU64,
    contacts_received: AtomicU64,
    subscribers_added: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn quote_accepted(&self) {
        Self::bump(&self.quotes_accepted, "quotes_accepted");
    }

    /// Validation or size rejection before any external call
    pub fn quote_rejected(&self) {
        Self::bump(&self.quotes_rejected, "quotes_rejected");
    }

    pub fn captcha_failed(&self) {
        Self::bump(&self.captcha_failures, "captcha_failures");
    }

    pub fn email_sent(&self) {
        Self::bump(&self.emails_sent, "emails_sent");
    }

    pub fn contact_received(&self) {
        Self::bump(&self.contacts_received, "contacts_received");
    }

    pub fn subscriber_added(&self) {
        Self::bump(&self.subscribers_added, "subscribers_added");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            quotes_accepted: self.quotes_accepted.load(Ordering::Relaxed),
            quotes_rejected: self.quotes_rejected.load(Ordering::Relaxed),
            captcha_failures: self.captcha_failures.load(Ordering::Relaxed),
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            contacts_received: self.contacts_received.load(Ordering::Relaxed),
            subscribers_added: self.subscribers_added.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub quotes_accepted: u64,
    pub quotes_rejected: u64,
    pub captcha_failures: u64,
    pub emails_sent: u64,
    pub contacts_received: u64,
    pub subscribers_added: u64,
}
