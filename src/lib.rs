//! ESP32 Cellular PPPoS Client Library
//!
//! Brings up a SIM800/BG96 modem over PPP, connects MQTT and runs a bounded
//! ping/publish/HTTP connectivity test loop.

pub mod app;
pub mod error;
pub mod events;
pub mod http_test;
pub mod modem;
pub mod mqtt;
pub mod network_config;
pub mod ping;

pub use app::{Application, DriverConfig, LoopReport, Platform, StopReason, TestLoopConfig};
pub use error::{StepError, StepResult, StepResultExt};
pub use events::EventGroup;
pub use http_test::HttpProbe;
pub use modem::{Dce, Dte, Modem, ModemDevice, ModemEvent};
pub use mqtt::{MqttSession, MqttStatus};
pub use network_config::{HttpTestConfig, ModemConfig, MqttConfig};
pub use ping::{PingConfig, PingEngine, PingSummary, PingTestRunner};

#[cfg(target_os = "espidf")]
pub use app::EspPlatform;
#[cfg(target_os = "espidf")]
pub use http_test::EspHttpProbe;
#[cfg(target_os = "espidf")]
pub use modem::EspModem;
#[cfg(target_os = "espidf")]
pub use mqtt::MqttClient;
#[cfg(target_os = "espidf")]
pub use ping::EspPingEngine;
