use std::time::Duration;

/// Statuses worth another attempt.
const TRANSIENT_STATUSES: [u16; 2] = [429, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Bounded exponential backoff: retry `n` waits `base_delay * 2^n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Decides what follows failed attempt number `attempt` (1-based).
    /// `last_status` is `None` when no HTTP response was received.
    pub fn next_action(&self, attempt: u32, last_status: Option<u16>) -> RetryDecision {
        let transient = last_status.is_some_and(|s| TRANSIENT_STATUSES.contains(&s));
        if !transient || attempt > self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.base_delay * 2u32.pow(attempt))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
