//! Bounded retry policy for failed messages.
//!
//! A failed message is retried by republishing a copy with an incremented
//! `x-retry-count` header. Once the counter reaches the policy maximum the
//! message is dropped. Every error kind is retried the same way.

use serde::{Deserialize, Serialize};

/// Default maximum attempt number before a message is dropped.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 3;

/// Retry policy for failed message handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempt number at which the message is rejected instead of
    /// republished.
    pub max_retry_count: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retry_count: DEFAULT_MAX_RETRY_COUNT }
    }
}

/// What to do with a message whose handling failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Publish a copy carrying the next attempt number.
    Republish {
        /// Value for the `x-retry-count` header of the copy
        next_retry_count: u32,
    },
    /// Drop the message.
    GiveUp {
        /// Reason why the message is not retried
        reason: String,
    },
}

impl RetryPolicy {
    /// Creates a policy with the given maximum attempt number.
    pub fn new(max_retry_count: u32) -> Self {
        Self { max_retry_count }
    }

    /// Decides the fate of a failed message on attempt `retry_count`.
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retry_count {
            return RetryDecision::GiveUp {
                reason: format!("maximum retry count ({}) reached", self.max_retry_count),
            };
        }

        RetryDecision::Republish { next_retry_count: retry_count.saturating_add(1) }
    }
}
