//! Rolling-period match counter with notification throttling.

use std::time::Duration;

/// Thresholds for one target's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Matches within a period needed to notify.
    pub boundary: u64,
    /// Double the effective boundary after every notification.
    pub increasing: bool,
    /// Maximum notifications per period. Zero disables notification.
    pub limit: u64,
    /// Period length. Must be non-zero.
    pub period: Duration,
}

/// Outcome of feeding one scan into the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdate {
    /// A notification should be sent for this cycle.
    pub should_notify: bool,
    /// The period rolled over before counting.
    pub period_reset: bool,
    /// Matches accumulated in the current period, including this scan.
    pub found_in_period: u64,
}

/// Per-target rolling-window state.
///
/// `escalated_boundary` is never decayed; it only returns to `boundary`
/// when the counter is recreated.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    policy: WindowPolicy,
    period_index: u64,
    found_in_period: u64,
    notifications_sent_in_period: u64,
    escalated_boundary: u64,
}

impl WindowCounter {
    /// Create a counter in period 0.
    #[must_use]
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            policy,
            period_index: 0,
            found_in_period: 0,
            notifications_sent_in_period: 0,
            escalated_boundary: policy.boundary,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    #[must_use]
    pub fn period_index(&self) -> u64 {
        self.period_index
    }

    #[must_use]
    pub fn found_in_period(&self) -> u64 {
        self.found_in_period
    }

    #[must_use]
    pub fn notifications_sent_in_period(&self) -> u64 {
        self.notifications_sent_in_period
    }

    /// The boundary currently compared against.
    #[must_use]
    pub fn escalated_boundary(&self) -> u64 {
        self.escalated_boundary
    }

    /// Index of the period containing `elapsed`.
    #[must_use]
    pub fn period_for(&self, elapsed: Duration) -> u64 {
        let period = self.policy.period.as_secs().max(1);
        elapsed.as_secs() / period
    }

    /// Record `new_matches` found `elapsed` after the watch started.
    pub fn update(&mut self, elapsed: Duration, new_matches: u64) -> WindowUpdate {
        let period_index = self.period_for(elapsed);
        let period_reset = period_index != self.period_index;
        if period_reset {
            tracing::debug!(
                from = self.period_index,
                to = period_index,
                "Period reset"
            );
            self.period_index = period_index;
            self.found_in_period = 0;
            self.notifications_sent_in_period = 0;
        }

        self.found_in_period = self.found_in_period.saturating_add(new_matches);

        let should_notify = self.found_in_period >= self.escalated_boundary
            && self.notifications_sent_in_period < self.policy.limit;

        if should_notify {
            self.notifications_sent_in_period += 1;
            if self.policy.increasing {
                self.escalated_boundary = self.escalated_boundary.saturating_mul(2);
            }
        }

        WindowUpdate {
            should_notify,
            period_reset,
            found_in_period: self.found_in_period,
        }
    }
}
