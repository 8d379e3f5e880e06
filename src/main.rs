#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp32_pppos_client::{EspPlatform, Platform};
    use esp_idf_svc::sys;

    // Initialize ESP-IDF system services
    sys::link_patches();

    // Initialize logging
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("ESP32 Cellular PPPoS Client");
    log::info!("Initializing...");

    let platform = EspPlatform;
    if let Err(e) = firmware::run(platform) {
        // Fatal path: nothing sensible is left to do but start over
        log::error!("❌ {:#}", e);
        platform.restart();
    }

    Ok(())
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp32_pppos_client::ping::PingTestRunner;
    use esp32_pppos_client::{
        Application, DriverConfig, EspHttpProbe, EspModem, EspPingEngine, EspPlatform, EventGroup,
        HttpTestConfig, ModemConfig, MqttClient, MqttConfig, PingConfig,
    };
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use std::sync::Arc;

    pub fn run(platform: EspPlatform) -> anyhow::Result<()> {
        let sysloop = EspSystemEventLoop::take()?;
        let events = Arc::new(EventGroup::new());
        log::info!("✅ System event loop ready");

        let modem_config = ModemConfig::default();
        let modem = EspModem::new(sysloop, &modem_config)?;

        let mqtt_config = MqttConfig::default();
        let driver_config = DriverConfig::new(&mqtt_config, &modem_config);
        let mqtt = MqttClient::new(mqtt_config, Arc::clone(&events));

        // The ping runner gets its own group so its bits never alias the driver's
        let ping = PingTestRunner::new(
            EspPingEngine::default(),
            Arc::new(EventGroup::new()),
            PingConfig::default(),
        );
        let http = EspHttpProbe::new(HttpTestConfig::default());

        let mut app = Application::new(modem, mqtt, ping, http, platform, events, driver_config);
        app.run()?;
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("pppos_client only runs on ESP-IDF targets (target_os = \"espidf\")");
}
