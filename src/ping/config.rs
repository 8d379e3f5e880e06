use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingConfig {
    /// Echo requests per run
    pub count: u32,

    /// Time to wait for each reply before counting it as timed out
    pub timeout: Duration,

    /// Gap between consecutive echo requests
    pub delay: Duration,

    /// Well-known host used to prove internet reachability
    pub target: Ipv4Addr,

    /// ICMP payload size in bytes
    pub data_size: u32,

    /// Upper bound on the wait for the engine's aggregated result
    pub completion_timeout: Duration,

    /// Pause between reading the result and releasing the engine
    pub settle_delay: Duration,
}

impl PingConfig {
    /// Worst case for a run where every reply times out, plus margin.
    pub fn worst_case_duration(count: u32, timeout: Duration, delay: Duration) -> Duration {
        (timeout + delay) * count + Duration::from_secs(5)
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        let count = 2;
        let timeout = Duration::from_millis(5000);
        let delay = Duration::from_millis(500);

        Self {
            count,
            timeout,
            delay,
            target: Ipv4Addr::new(8, 8, 8, 8),
            data_size: 64,
            completion_timeout: Self::worst_case_duration(count, timeout, delay),
            settle_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_connectivity_check() {
        let config = PingConfig::default();
        assert_eq!(config.count, 2);
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.delay, Duration::from_millis(500));
        assert_eq!(config.target, Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(config.completion_timeout, Duration::from_millis(16_000));
        assert_eq!(config.settle_delay, Duration::from_secs(1));
    }
}
