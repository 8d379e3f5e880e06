use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLoopConfig {
    pub max_test_count: u32,
    pub max_fail_count: u32,
    /// Pause at the end of every iteration
    pub pacing: Duration,
    pub do_ping_test: bool,
    pub do_mqtt_test: bool,
    pub do_http_test: bool,
}

impl Default for TestLoopConfig {
    fn default() -> Self {
        Self {
            max_test_count: 20,
            max_fail_count: 10,
            pacing: Duration::from_secs(1),
            do_ping_test: true,
            do_mqtt_test: true,
            do_http_test: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// All iterations ran
    Completed,
    /// The ping failure budget ran out first
    TooManyFailures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub test_count: u32,
    pub fail_count: u32,
    pub stop_reason: StopReason,
}

/// The checks exercised once per iteration.
///
/// Only `ping` feeds the failure budget. Publish and HTTP outcomes are
/// reported by the implementation but never counted.
pub trait TestSuite {
    fn ping(&mut self) -> bool;
    fn publish(&mut self);
    fn http(&mut self);
    fn pace(&mut self, delay: Duration);
}

pub struct TestLoop {
    config: TestLoopConfig,
    test_count: u32,
    fail_count: u32,
}

impl TestLoop {
    pub fn new(config: TestLoopConfig) -> Self {
        Self {
            config,
            test_count: 0,
            fail_count: 0,
        }
    }

    pub fn test_count(&self) -> u32 {
        self.test_count
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    fn should_continue(&self) -> bool {
        self.test_count < self.config.max_test_count && self.fail_count < self.config.max_fail_count
    }

    /// Runs iterations until either budget is exhausted.
    pub fn run<T: TestSuite>(&mut self, suite: &mut T) -> LoopReport {
        while self.should_continue() {
            if self.config.do_ping_test && !suite.ping() {
                self.fail_count += 1;
            }

            if self.config.do_mqtt_test {
                suite.publish();
            }

            if self.config.do_http_test {
                suite.http();
            }

            suite.pace(self.config.pacing);
            self.test_count += 1;

            info!(
                "Test iteration {}/{} done, {} ping failures",
                self.test_count, self.config.max_test_count, self.fail_count
            );
        }

        let stop_reason = if self.fail_count >= self.config.max_fail_count {
            warn!(
                "Stopping tests after {} ping failures ({} iterations)",
                self.fail_count, self.test_count
            );
            StopReason::TooManyFailures
        } else {
            StopReason::Completed
        };

        LoopReport {
            test_count: self.test_count,
            fail_count: self.fail_count,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Ping results are taken from `pings` in order, publish/http/pace are counted.
    #[derive(Default)]
    struct Recorder {
        pings: Vec<bool>,
        next: usize,
        publishes: u32,
        http_runs: u32,
        paced: Duration,
    }

    impl Recorder {
        fn with_pings(pings: Vec<bool>) -> Self {
            Self {
                pings,
                ..Default::default()
            }
        }
    }

    impl TestSuite for Recorder {
        fn ping(&mut self) -> bool {
            let ok = self.pings.get(self.next).copied().unwrap_or(true);
            self.next += 1;
            ok
        }

        fn publish(&mut self) {
            self.publishes += 1;
        }

        fn http(&mut self) {
            self.http_runs += 1;
        }

        fn pace(&mut self, delay: Duration) {
            self.paced += delay;
        }
    }

    #[test]
    fn twenty_successes_run_every_iteration() {
        let mut suite = Recorder::with_pings(vec![true; 20]);
        let report = TestLoop::new(TestLoopConfig::default()).run(&mut suite);

        assert_eq!(
            report,
            LoopReport {
                test_count: 20,
                fail_count: 0,
                stop_reason: StopReason::Completed,
            }
        );
        assert_eq!(suite.next, 20);
        assert_eq!(suite.publishes, 20);
        assert_eq!(suite.http_runs, 20);
        assert_eq!(suite.paced, Duration::from_secs(20));
    }

    #[test]
    fn stops_on_tenth_failure_interleaved_with_successes() {
        // Fail every other iteration: the 10th failure lands on iteration 19
        let pings = (0..20).map(|i| i % 2 == 0).collect::<Vec<_>>();
        let mut suite = Recorder::with_pings(pings);
        let report = TestLoop::new(TestLoopConfig::default()).run(&mut suite);

        assert_eq!(report.fail_count, 10);
        assert_eq!(report.test_count, 20);
        assert_eq!(report.stop_reason, StopReason::TooManyFailures);
    }

    #[test]
    fn stops_early_when_failures_come_first() {
        let mut suite = Recorder::with_pings(vec![false; 20]);
        let report = TestLoop::new(TestLoopConfig::default()).run(&mut suite);

        assert_eq!(report.test_count, 10);
        assert_eq!(report.fail_count, 10);
        assert_eq!(report.stop_reason, StopReason::TooManyFailures);
        // The failing iteration still publishes and runs HTTP before stopping
        assert_eq!(suite.publishes, 10);
        assert_eq!(suite.http_runs, 10);
    }

    #[test]
    fn disabled_checks_are_skipped() {
        let config = TestLoopConfig {
            do_ping_test: false,
            do_http_test: false,
            max_test_count: 3,
            ..Default::default()
        };
        let mut suite = Recorder::with_pings(vec![false; 3]);
        let report = TestLoop::new(config).run(&mut suite);

        assert_eq!(report.test_count, 3);
        assert_eq!(report.fail_count, 0);
        assert_eq!(suite.next, 0);
        assert_eq!(suite.publishes, 3);
        assert_eq!(suite.http_runs, 0);
    }

    proptest! {
        #[test]
        fn never_exceeds_either_bound(pings in proptest::collection::vec(any::<bool>(), 20)) {
            let mut suite = Recorder::with_pings(pings.clone());
            let report = TestLoop::new(TestLoopConfig::default()).run(&mut suite);

            prop_assert!(report.test_count <= 20);
            prop_assert!(report.fail_count <= 10);

            // The loop ends exactly at the iteration holding the 10th failure, if any
            let tenth_failure = pings
                .iter()
                .enumerate()
                .filter(|(_, ok)| !**ok)
                .nth(9)
                .map(|(i, _)| i as u32 + 1);
            match tenth_failure {
                Some(iteration) => {
                    prop_assert_eq!(report.test_count, iteration);
                    prop_assert_eq!(report.stop_reason, StopReason::TooManyFailures);
                }
                None => {
                    prop_assert_eq!(report.test_count, 20);
                    prop_assert_eq!(report.stop_reason, StopReason::Completed);
                }
            }
        }
    }
}
