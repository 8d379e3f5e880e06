use super::config::PingConfig;
use super::summary::{PingOutcome, PingSummary};
use crate::events::{EventGroup, BIT0, BIT1};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

pub const PING_SUCCESS_BIT: u32 = BIT0;
pub const PING_FAILURE_BIT: u32 = BIT1;

/// Invoked by the engine with the aggregated counters of a run.
pub type ResultCallback = Box<dyn FnMut(&PingSummary) + Send + 'static>;

/// ICMP echo engine driven by the runner.
///
/// `start` must return once the run is under way; results arrive later
/// through the callback, possibly from another thread.
pub trait PingEngine {
    fn start(&mut self, config: &PingConfig, on_result: ResultCallback) -> anyhow::Result<()>;

    /// Releases everything `start` acquired. Safe to call after a failed start.
    fn deinit(&mut self);
}

/// Reachability check against a well-known host.
pub struct PingTestRunner<E: PingEngine> {
    engine: E,
    events: Arc<EventGroup>,
    config: PingConfig,
}

impl<E: PingEngine> PingTestRunner<E> {
    pub fn new(engine: E, events: Arc<EventGroup>, config: PingConfig) -> Self {
        Self {
            engine,
            events,
            config,
        }
    }

    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    /// Runs one ping test and reports whether every request was answered.
    ///
    /// Gives up and reports failure after `completion_timeout` if the engine
    /// never produces a complete result.
    pub fn run_ping_test(&mut self) -> bool {
        self.run_ping_test_with(std::thread::sleep)
    }

    /// Same as [`run_ping_test`](Self::run_ping_test), with the settle
    /// delay before the session is released handed to `delay`.
    pub fn run_ping_test_with(&mut self, delay: impl FnOnce(Duration)) -> bool {
        self.events.clear(PING_SUCCESS_BIT | PING_FAILURE_BIT);

        let expected = self.config.count;
        let events = Arc::clone(&self.events);
        let on_result: ResultCallback = Box::new(move |summary: &PingSummary| {
            report_summary(summary);
            match summary.classify(expected) {
                Some(PingOutcome::Success) => {
                    events.set(PING_SUCCESS_BIT);
                }
                Some(PingOutcome::Failure) => {
                    events.set(PING_FAILURE_BIT);
                }
                None => {}
            }
        });

        debug!("Pinging well-known IP {} ...", self.config.target);

        let result = match self.engine.start(&self.config, on_result) {
            Ok(()) => {
                let bits = self.events.wait_bits(
                    PING_SUCCESS_BIT | PING_FAILURE_BIT,
                    true,
                    false,
                    Some(self.config.completion_timeout),
                );

                if bits & PING_SUCCESS_BIT != 0 {
                    info!("✅ ping test successful");
                    true
                } else if bits & PING_FAILURE_BIT != 0 {
                    error!("❌ ping test failed");
                    false
                } else {
                    warn!(
                        "❌ ping test failed: no complete result within {:?}",
                        self.config.completion_timeout
                    );
                    false
                }
            }
            Err(e) => {
                error!("❌ ping test failed to start: {:?}", e);
                false
            }
        };

        delay(self.config.settle_delay);
        self.engine.deinit();

        result
    }
}

fn report_summary(summary: &PingSummary) {
    let avg_ms = summary
        .average()
        .map(|avg| avg.as_secs_f32() * 1000.0)
        .unwrap_or(0.0);
    debug!(
        "AvgTime:{:.1}mS Sent:{} Rec:{} Err:{} min(mS):{} max(mS):{}",
        avg_ms,
        summary.sent,
        summary.received,
        summary.errors,
        summary.min_time.as_millis(),
        summary.max_time.as_millis()
    );
    debug!(
        "Resp(mS):{} Timeouts:{} Total Time:{}",
        summary.resp_time.as_millis(),
        summary.timeouts,
        summary.total_time.as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Engine that reports a fixed summary from a worker thread.
    struct ScriptedEngine {
        summary: Option<PingSummary>,
        fail_start: bool,
        starts: Arc<AtomicUsize>,
        deinits: Arc<AtomicUsize>,
        worker: Option<thread::JoinHandle<()>>,
    }

    impl ScriptedEngine {
        fn reporting(summary: Option<PingSummary>) -> Self {
            Self {
                summary,
                fail_start: false,
                starts: Arc::new(AtomicUsize::new(0)),
                deinits: Arc::new(AtomicUsize::new(0)),
                worker: None,
            }
        }
    }

    impl PingEngine for ScriptedEngine {
        fn start(&mut self, _config: &PingConfig, mut on_result: ResultCallback) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                anyhow::bail!("ping session create failed");
            }
            let summary = self.summary;
            self.worker = Some(thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                if let Some(summary) = summary {
                    on_result(&summary);
                }
            }));
            Ok(())
        }

        fn deinit(&mut self) {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
            self.deinits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> PingConfig {
        PingConfig {
            completion_timeout: Duration::from_millis(200),
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn summary(sent: u32, received: u32) -> PingSummary {
        PingSummary {
            sent,
            received,
            ..Default::default()
        }
    }

    #[test]
    fn all_replies_pass() {
        let engine = ScriptedEngine::reporting(Some(summary(2, 2)));
        let deinits = Arc::clone(&engine.deinits);
        let mut runner = PingTestRunner::new(engine, Arc::new(EventGroup::new()), fast_config());

        assert!(runner.run_ping_test());
        assert_eq!(deinits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lost_reply_fails() {
        let engine = ScriptedEngine::reporting(Some(summary(2, 1)));
        let mut runner = PingTestRunner::new(engine, Arc::new(EventGroup::new()), fast_config());

        assert!(!runner.run_ping_test());
    }

    #[test]
    fn incomplete_run_times_out_as_failure() {
        let engine = ScriptedEngine::reporting(Some(summary(1, 1)));
        let deinits = Arc::clone(&engine.deinits);
        let mut runner = PingTestRunner::new(engine, Arc::new(EventGroup::new()), fast_config());

        assert!(!runner.run_ping_test());
        assert_eq!(deinits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_error_fails_and_still_deinits() {
        let mut engine = ScriptedEngine::reporting(None);
        engine.fail_start = true;
        let deinits = Arc::clone(&engine.deinits);
        let mut runner = PingTestRunner::new(engine, Arc::new(EventGroup::new()), fast_config());

        assert!(!runner.run_ping_test());
        assert_eq!(deinits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn settle_delay_runs_before_the_session_is_released() {
        let engine = ScriptedEngine::reporting(Some(summary(2, 2)));
        let deinits = Arc::clone(&engine.deinits);
        let config = PingConfig {
            settle_delay: Duration::from_secs(1),
            ..fast_config()
        };
        let mut runner = PingTestRunner::new(engine, Arc::new(EventGroup::new()), config);

        let mut settled = None;
        assert!(runner.run_ping_test_with(|d| {
            settled = Some((d, deinits.load(Ordering::SeqCst)));
        }));
        assert_eq!(settled, Some((Duration::from_secs(1), 0)));
        assert_eq!(deinits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_flags_are_cleared_between_runs() {
        let events = Arc::new(EventGroup::new());
        // A leftover success must not leak into a run that never completes
        events.set(PING_SUCCESS_BIT);

        let engine = ScriptedEngine::reporting(None);
        let starts = Arc::clone(&engine.starts);
        let mut runner = PingTestRunner::new(engine, Arc::clone(&events), fast_config());

        assert!(!runner.run_ping_test());
        assert!(!runner.run_ping_test());
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(events.get() & (PING_SUCCESS_BIT | PING_FAILURE_BIT), 0);
    }
}
