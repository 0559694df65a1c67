//! Pipeline configuration.

use std::time::Duration;

/// Knobs for the checkout pipeline and its background task queue.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Name of the affiliate attribution cookie.
    pub affiliate_cookie: String,
    /// Timeout for the remote fraud-score call.
    pub fraud_timeout: Duration,
    /// Capacity of the background job channel.
    pub queue_capacity: usize,
    /// Retry policy for background jobs.
    pub retry: RetryPolicy,
    /// Display name used in customer emails.
    pub store_name: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            affiliate_cookie: "affiliate_ref".to_string(),
            fraud_timeout: Duration::from_secs(10),
            queue_capacity: 1024,
            retry: RetryPolicy::default(),
            store_name: "Our store".to_string(),
        }
    }
}

/// Exponential backoff settings for background jobs.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy with no delay between attempts, for tests.
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}
