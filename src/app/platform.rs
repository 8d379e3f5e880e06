use std::time::Duration;

/// Device services the driver needs besides the network collaborators.
pub trait Platform {
    fn delay(&self, duration: Duration);

    /// Reboots the device. Test doubles may return.
    fn restart(&self);
}

#[cfg(target_os = "espidf")]
pub use esp::EspPlatform;

#[cfg(target_os = "espidf")]
mod esp {
    use super::Platform;
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_svc::sys;
    use std::time::Duration;

    #[derive(Debug, Default, Clone, Copy)]
    pub struct EspPlatform;

    impl Platform for EspPlatform {
        fn delay(&self, duration: Duration) {
            FreeRtos::delay_ms(duration.as_millis().min(u32::MAX as u128) as u32);
        }

        fn restart(&self) {
            unsafe {
                sys::esp_restart();
            }
        }
    }
}
