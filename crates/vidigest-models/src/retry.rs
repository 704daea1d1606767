//! Retry scheduling for transcript-missing failures.
//!
//! NO_TRANSCRIPT is the only failure reason with a retry path: transcripts
//! often appear hours or days after upload, so failed videos get a small
//! fixed number of widely spaced retries before becoming permanent.

use chrono::{DateTime, Duration, Utc};

/// Maximum NO_TRANSCRIPT attempts before a video is marked permanent.
pub const MAX_RETRIES: u32 = 3;

/// Days to wait before each retry, indexed by the pre-increment retry count.
const RETRY_SCHEDULE_DAYS: [i64; 3] = [1, 3, 5];

/// Outcome of a retry-policy decision for one recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Another retry is allowed; the caller should record the new count and
    /// the scheduled wake-up time.
    Schedule {
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// The retry budget is spent; the failure is permanent.
    Exhausted { retry_count: u32 },
}

/// Fixed-schedule retry policy for NO_TRANSCRIPT failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// Decide what to do about a NO_TRANSCRIPT failure observed at `now`,
    /// given the retry count *before* this failure.
    ///
    /// The wait is looked up by the pre-increment count, clamped to the last
    /// schedule entry, so the first failure waits 1 day and the second 3;
    /// the third exhausts the budget.
    pub fn decide(&self, current_retry_count: u32, now: DateTime<Utc>) -> RetryDecision {
        let new_count = current_retry_count + 1;
        if new_count >= MAX_RETRIES {
            return RetryDecision::Exhausted {
                retry_count: new_count,
            };
        }
        let idx = (current_retry_count as usize).min(RETRY_SCHEDULE_DAYS.len() - 1);
        RetryDecision::Schedule {
            retry_count: new_count,
            next_retry_at: now + Duration::days(RETRY_SCHEDULE_DAYS[idx]),
        }
    }
}
