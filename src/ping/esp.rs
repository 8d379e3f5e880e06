use super::config::PingConfig;
use super::runner::{PingEngine, ResultCallback};
use super::summary::PingSummary;
use esp_idf_svc::ping::{Configuration, EspPing, Reply};
use log::{info, warn};
use std::thread::JoinHandle;

/// Ping engine backed by the ESP-IDF lwIP ping session.
///
/// Each run happens on its own thread so `start` returns immediately, the
/// aggregated result is delivered through the callback when the session ends.
pub struct EspPingEngine {
    interface_index: u32,
    worker: Option<JoinHandle<()>>,
}

impl EspPingEngine {
    /// `interface_index` 0 lets lwIP route through the default netif (PPP).
    pub fn new(interface_index: u32) -> Self {
        Self {
            interface_index,
            worker: None,
        }
    }
}

impl Default for EspPingEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PingEngine for EspPingEngine {
    fn start(&mut self, config: &PingConfig, mut on_result: ResultCallback) -> anyhow::Result<()> {
        // A previous run that was never deinitialized still owns the session
        self.deinit();

        let conf = Configuration {
            count: config.count,
            interval: config.delay,
            timeout: config.timeout,
            data_size: config.data_size,
            tos: 0,
        };
        let target = config.target;
        let interface_index = self.interface_index;

        let worker = std::thread::Builder::new()
            .stack_size(6144)
            .name("ping".to_string())
            .spawn(move || {
                let mut ping = EspPing::new(interface_index);
                let mut stats = PingSummary::default();

                let outcome = ping.ping_details(target, &conf, |_summary, reply| match reply {
                    Reply::Success(reply_info) => {
                        let elapsed = reply_info.elapsed_time;
                        if stats.received == 0 || elapsed < stats.min_time {
                            stats.min_time = elapsed;
                        }
                        stats.max_time = stats.max_time.max(elapsed);
                        stats.total_time += elapsed;
                        stats.resp_time = elapsed;
                        stats.received += 1;
                        stats.sent += 1;
                    }
                    Reply::Timeout => {
                        stats.timeouts += 1;
                        stats.sent += 1;
                    }
                });

                match outcome {
                    Ok(summary) => {
                        stats.sent = summary.transmitted;
                        stats.received = summary.received;
                        info!(
                            "Ping session to {} done: {}/{} replies in {:?}",
                            target, summary.received, summary.transmitted, summary.time
                        );
                    }
                    Err(e) => {
                        warn!("Ping session to {} aborted: {:?}", target, e);
                        stats.errors += 1;
                    }
                }

                on_result(&stats);
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn deinit(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Ping worker panicked");
            }
        }
    }
}
