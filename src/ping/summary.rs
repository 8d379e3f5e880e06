use std::time::Duration;

/// Aggregated counters for one ping run, as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingSummary {
    pub sent: u32,
    pub received: u32,
    pub errors: u32,
    pub timeouts: u32,
    pub min_time: Duration,
    pub max_time: Duration,
    /// Sum of the round-trip times of all received replies
    pub total_time: Duration,
    /// Round-trip time of the most recent reply
    pub resp_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    Success,
    Failure,
}

impl PingSummary {
    /// Mean round-trip time, `None` when nothing came back.
    pub fn average(&self) -> Option<Duration> {
        if self.received == 0 {
            None
        } else {
            Some(self.total_time / self.received)
        }
    }

    /// Pass/fail for a run that was asked to send `expected` requests.
    ///
    /// `None` while the run is incomplete (`sent != expected`); no verdict is
    /// given for an engine that stopped early.
    pub fn classify(&self, expected: u32) -> Option<PingOutcome> {
        if self.sent != expected {
            return None;
        }
        if self.received == expected {
            Some(PingOutcome::Success)
        } else {
            Some(PingOutcome::Failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summary(sent: u32, received: u32) -> PingSummary {
        PingSummary {
            sent,
            received,
            ..Default::default()
        }
    }

    #[test]
    fn average_uses_received_replies() {
        let s = PingSummary {
            sent: 2,
            received: 2,
            total_time: Duration::from_millis(180),
            ..Default::default()
        };
        assert_eq!(s.average(), Some(Duration::from_millis(90)));
        assert_eq!(summary(2, 0).average(), None);
    }

    #[test]
    fn early_abort_has_no_verdict() {
        assert_eq!(summary(1, 1).classify(2), None);
        assert_eq!(summary(0, 0).classify(2), None);
    }

    proptest! {
        #[test]
        fn all_replies_is_success(count in 1u32..64) {
            prop_assert_eq!(summary(count, count).classify(count), Some(PingOutcome::Success));
        }

        #[test]
        fn missing_replies_is_failure(count in 1u32..64, lost in 1u32..64) {
            let received = count.saturating_sub(lost);
            prop_assume!(received < count);
            prop_assert_eq!(summary(count, received).classify(count), Some(PingOutcome::Failure));
        }
    }
}
