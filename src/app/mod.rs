pub mod driver;
pub mod platform;
pub mod test_loop;

pub use driver::{Application, DriverConfig};
pub use platform::Platform;
pub use test_loop::{LoopReport, StopReason, TestLoop, TestLoopConfig, TestSuite};

#[cfg(target_os = "espidf")]
pub use platform::EspPlatform;
