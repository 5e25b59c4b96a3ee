//! Flush-trigger configuration and arithmetic.
//!
//! Four independent conditions can trigger the departure of the buffered
//! bundle: a packet count, a size threshold, an idle timeout measured
//! from the previous flush, and a hard period. The first three are
//! evaluated when a packet arrives; the period drives the event-loop
//! wait. If `timeout >= period` the timeout is dominated and never fires.
//!
//! All times are monotonic microseconds supplied by the caller.

use crate::constants::{DEFAULT_SIZE_THRESHOLD, MAX_BUNDLE_PACKETS, TRIGGER_DISABLED_US};

/// Immutable trigger configuration, normalized at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triggers {
    /// Flush when this many packets are buffered. 1..=100.
    pub limit_packets: u32,
    /// Flush when the buffered size exceeds this many bytes.
    pub size_threshold: usize,
    /// Flush on arrival if this many microseconds passed since the last
    /// flush. [`TRIGGER_DISABLED_US`] disables the trigger.
    pub timeout: u64,
    /// Hard upper bound between flushes regardless of arrivals.
    pub period: u64,
}

/// Which arrival-time triggers fired. Several may hold at once; they are
/// reported together in the flush log line, in this order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReasons {
    pub numpacket_limit: bool,
    pub size_limit: bool,
    pub timeout: bool,
}

impl FlushReasons {
    pub fn any(&self) -> bool {
        self.numpacket_limit || self.size_limit || self.timeout
    }
}

impl Triggers {
    /// Normalize raw settings into an effective configuration.
    ///
    /// `limit_packets == 0` means the user left the count trigger unset:
    /// it becomes 100 when any other trigger was tightened from its
    /// default, and 1 (send every packet immediately) when none was.
    /// Values above 100 are clamped.
    pub fn normalize(
        limit_packets: u32,
        size_threshold: usize,
        timeout: u64,
        period: u64,
    ) -> Self {
        let any_tightened = size_threshold < DEFAULT_SIZE_THRESHOLD
            || timeout < TRIGGER_DISABLED_US
            || period < TRIGGER_DISABLED_US;

        let limit_packets = match limit_packets {
            0 if any_tightened => MAX_BUNDLE_PACKETS,
            0 => 1,
            n => n.min(MAX_BUNDLE_PACKETS),
        };

        Self {
            limit_packets,
            size_threshold,
            timeout,
            period,
        }
    }

    /// Microseconds until the period expires, measured from the last flush.
    pub fn time_until_period(&self, now: u64, last_sent: u64) -> u64 {
        self.period.saturating_sub(now.saturating_sub(last_sent))
    }

    /// Evaluate the arrival-time triggers against the buffer state.
    pub fn flush_reasons(&self, now: u64, last_sent: u64, count: u32, size: usize) -> FlushReasons {
        FlushReasons {
            numpacket_limit: count >= self.limit_packets,
            size_limit: size > self.size_threshold,
            timeout: now.saturating_sub(last_sent) > self.timeout,
        }
    }
}

impl Default for Triggers {
    /// The all-defaults configuration: every packet is sent immediately.
    fn default() -> Self {
        Self::normalize(
            0,
            DEFAULT_SIZE_THRESHOLD,
            TRIGGER_DISABLED_US,
            TRIGGER_DISABLED_US,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_triggers_set_sends_every_packet() {
        let t = Triggers::default();
        assert_eq!(t.limit_packets, 1);
        assert!(t.flush_reasons(0, 0, 1, 41).numpacket_limit);
    }

    #[test]
    fn tightening_any_trigger_raises_unset_limit_to_max() {
        let t = Triggers::normalize(0, 500, TRIGGER_DISABLED_US, TRIGGER_DISABLED_US);
        assert_eq!(t.limit_packets, 100);

        let t = Triggers::normalize(0, DEFAULT_SIZE_THRESHOLD, 30_000, TRIGGER_DISABLED_US);
        assert_eq!(t.limit_packets, 100);

        let t = Triggers::normalize(0, DEFAULT_SIZE_THRESHOLD, TRIGGER_DISABLED_US, 50_000);
        assert_eq!(t.limit_packets, 100);
    }

    #[test]
    fn explicit_limit_is_kept_and_clamped() {
        let t = Triggers::normalize(3, DEFAULT_SIZE_THRESHOLD, TRIGGER_DISABLED_US, 50_000);
        assert_eq!(t.limit_packets, 3);

        let t = Triggers::normalize(500, DEFAULT_SIZE_THRESHOLD, TRIGGER_DISABLED_US, 50_000);
        assert_eq!(t.limit_packets, 100);
    }

    #[test]
    fn time_until_period_counts_down_and_floors_at_zero() {
        let t = Triggers::normalize(0, DEFAULT_SIZE_THRESHOLD, TRIGGER_DISABLED_US, 10_000);
        assert_eq!(t.time_until_period(1_000, 0), 9_000);
        assert_eq!(t.time_until_period(10_000, 0), 0);
        assert_eq!(t.time_until_period(25_000, 0), 0);
        assert_eq!(t.time_until_period(25_000, 20_000), 5_000);
    }

    #[test]
    fn reasons_fire_independently_and_together() {
        let t = Triggers {
            limit_packets: 2,
            size_threshold: 100,
            timeout: 1_000,
            period: TRIGGER_DISABLED_US,
        };

        let r = t.flush_reasons(500, 0, 1, 50);
        assert!(!r.any());

        let r = t.flush_reasons(500, 0, 2, 50);
        assert!(r.numpacket_limit && !r.size_limit && !r.timeout);

        let r = t.flush_reasons(500, 0, 1, 101);
        assert!(!r.numpacket_limit && r.size_limit && !r.timeout);

        let r = t.flush_reasons(1_501, 0, 1, 50);
        assert!(!r.numpacket_limit && !r.size_limit && r.timeout);

        let r = t.flush_reasons(2_000, 0, 2, 200);
        assert!(r.numpacket_limit && r.size_limit && r.timeout);
    }

    #[test]
    fn size_trigger_is_strictly_greater_than() {
        let t = Triggers {
            limit_packets: 100,
            size_threshold: 100,
            timeout: TRIGGER_DISABLED_US,
            period: TRIGGER_DISABLED_US,
        };
        assert!(!t.flush_reasons(0, 0, 1, 100).any());
        assert!(t.flush_reasons(0, 0, 1, 101).size_limit);
    }

    #[test]
    fn reasons_are_monotone_in_count_size_and_elapsed() {
        let t = Triggers {
            limit_packets: 5,
            size_threshold: 200,
            timeout: 10_000,
            period: TRIGGER_DISABLED_US,
        };
        // Once a reason holds, growing its input keeps it holding.
        for count in 5..10 {
            assert!(t.flush_reasons(0, 0, count, 0).numpacket_limit);
        }
        for size in 201..400 {
            assert!(t.flush_reasons(0, 0, 1, size).size_limit);
        }
        for now in 10_001..10_100 {
            assert!(t.flush_reasons(now, 0, 1, 0).timeout);
        }
    }

    #[test]
    fn dominated_timeout_never_fires_before_period() {
        // timeout >= period: the wait always expires first, and every
        // expiry resets last_sent, so elapsed never exceeds the timeout.
        let t = Triggers::normalize(0, DEFAULT_SIZE_THRESHOLD, 20_000, 10_000);
        let mut last_sent = 0;
        let mut now = 0;
        for _ in 0..10 {
            now += t.time_until_period(now, last_sent);
            assert!(!t.flush_reasons(now, last_sent, 1, 41).timeout);
            last_sent = now;
        }
    }
}
