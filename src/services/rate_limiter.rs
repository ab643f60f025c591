//! Sliding-window attempt limiter
//!
//! Used for failed logins: at most 5 failures per email within 15 minutes.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct AttemptLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl AttemptLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Limiter for failed logins (5 per 15 minutes)
    pub fn for_logins() -> Self {
        Self::new(5, Duration::minutes(15))
    }

    /// Whether the key has used up its attempts in the current window
    pub async fn is_limited(&self, key: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(&key.to_lowercase()) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.max_attempts
            }
            None => false,
        }
    }

    pub async fn record(&self, key: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.entry(key.to_lowercase()).or_default().push(Utc::now());
    }

    pub async fn clear(&self, key: &str) {
        self.attempts.write().await.remove(&key.to_lowercase());
    }

    /// Drop keys without attempts in the current window
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

impl Default for AttemptLimiter {
    fn default() -> Self {
        Self::for_logins()
    }
}
