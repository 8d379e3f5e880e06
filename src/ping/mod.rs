pub mod config;
pub mod runner;
pub mod summary;

#[cfg(target_os = "espidf")]
pub mod esp;

pub use config::PingConfig;
pub use runner::{PingEngine, PingTestRunner, ResultCallback, PING_FAILURE_BIT, PING_SUCCESS_BIT};
pub use summary::{PingOutcome, PingSummary};

#[cfg(target_os = "espidf")]
pub use esp::EspPingEngine;
