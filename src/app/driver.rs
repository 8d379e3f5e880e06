use super::platform::Platform;
use super::test_loop::{LoopReport, TestLoop, TestLoopConfig, TestSuite};
use crate::error::{StepError, StepResult, StepResultExt};
use crate::events::{EventBits, EventGroup, CONNECT_BIT, STOP_BIT, SUBSCRIBED_BIT};
use crate::http_test::HttpProbe;
use crate::modem::{event_handler, FlowControl, Modem};
use crate::mqtt::MqttSession;
use crate::network_config::{ModemConfig, MqttConfig};
use crate::ping::{PingEngine, PingTestRunner};
use anyhow::anyhow;
use log::{info, warn};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub test_loop: TestLoopConfig,
    pub flow_control: FlowControl,
    pub mqtt_topic: String,
    pub mqtt_payload: String,
    /// `None` waits forever for the PPP link
    pub connect_timeout: Option<Duration>,
    pub subscribe_timeout: Option<Duration>,
    pub stop_timeout: Option<Duration>,
    /// First value of the "Restarting in N seconds" countdown
    pub restart_countdown_secs: u32,
}

impl DriverConfig {
    /// Flow control follows the UART setup of `modem` so the DTE and DCE
    /// always agree.
    pub fn new(mqtt: &MqttConfig, modem: &ModemConfig) -> Self {
        Self {
            test_loop: TestLoopConfig::default(),
            flow_control: modem.flow_control,
            mqtt_topic: mqtt.topic.to_string(),
            mqtt_payload: mqtt.payload.to_string(),
            connect_timeout: None,
            subscribe_timeout: None,
            stop_timeout: None,
            restart_countdown_secs: 5,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new(&MqttConfig::default(), &ModemConfig::default())
    }
}

/// Top-level sequence: modem and PPP up, MQTT up, connectivity tests,
/// orderly teardown, restart.
pub struct Application<M, S, E, H, P>
where
    M: Modem,
    S: MqttSession,
    E: PingEngine,
    H: HttpProbe,
    P: Platform,
{
    modem: M,
    mqtt: S,
    ping: PingTestRunner<E>,
    http: H,
    platform: P,
    events: Arc<EventGroup>,
    config: DriverConfig,
}

impl<M, S, E, H, P> Application<M, S, E, H, P>
where
    M: Modem,
    S: MqttSession,
    E: PingEngine,
    H: HttpProbe,
    P: Platform,
{
    pub fn new(
        modem: M,
        mqtt: S,
        ping: PingTestRunner<E>,
        http: H,
        platform: P,
        events: Arc<EventGroup>,
        config: DriverConfig,
    ) -> Self {
        Self {
            modem,
            mqtt,
            ping,
            http,
            platform,
            events,
            config,
        }
    }

    /// Runs the whole sequence, including the restart countdown.
    ///
    /// Returns early with a fatal error if any bring-up or teardown step
    /// fails. The countdown and restart are skipped in that case.
    pub fn run(&mut self) -> StepResult<LoopReport> {
        self.bring_up()?;
        let report = self.run_tests();
        info!(
            "Tests finished: {} iterations, {} ping failures ({:?})",
            report.test_count, report.fail_count, report.stop_reason
        );
        self.tear_down()?;
        self.restart_countdown();
        Ok(report)
    }

    /// Configures the modem, brings up PPP and waits for the MQTT
    /// subscription.
    pub fn bring_up(&mut self) -> StepResult<()> {
        info!("📶 Bringing up {} modem", self.modem.device().name());
        self.modem
            .add_event_handler(event_handler(Arc::clone(&self.events)))
            .fatal("add_event_handler")?;

        self.modem
            .set_flow_ctrl(self.config.flow_control)
            .fatal("set_flow_ctrl")?;
        self.modem.store_profile().fatal("store_profile")?;

        let identity = self.modem.identity().fatal("identity")?;
        info!("Module: {}", identity.module_name);
        info!("Operator: {}", identity.operator);
        info!("IMEI: {}", identity.imei);
        info!("IMSI: {}", identity.imsi);

        let signal = self.modem.get_signal_quality().fatal("get_signal_quality")?;
        info!("rssi: {}, ber: {}", signal.rssi, signal.ber);

        let battery = self.modem.get_battery_status().fatal("get_battery_status")?;
        info!("Battery voltage: {} mV", battery.voltage_mv);

        self.modem.setup_ppp().fatal("setup_ppp")?;
        self.wait_for(CONNECT_BIT, self.config.connect_timeout, "ppp_connect")?;

        self.mqtt.start().fatal("mqtt_start")?;
        self.wait_for(SUBSCRIBED_BIT, self.config.subscribe_timeout, "mqtt_subscribe")?;

        Ok(())
    }

    /// Runs the bounded connectivity test loop.
    pub fn run_tests(&mut self) -> LoopReport {
        let mut suite = LoopSuite {
            ping: &mut self.ping,
            mqtt: &mut self.mqtt,
            http: &mut self.http,
            platform: &self.platform,
            topic: &self.config.mqtt_topic,
            payload: &self.config.mqtt_payload,
        };
        TestLoop::new(self.config.test_loop.clone()).run(&mut suite)
    }

    /// Destroys the MQTT client, leaves PPP and powers the modem down.
    pub fn tear_down(&mut self) -> StepResult<()> {
        info!("shutting down MQTT client...");
        self.mqtt.destroy();

        info!("exiting modem PPP...");
        self.modem.exit_ppp().fatal("exit_ppp")?;
        info!("waiting for modem to stop...");
        self.wait_for(STOP_BIT, self.config.stop_timeout, "ppp_stop")?;
        info!("modem stopped");

        self.modem.power_down().fatal("power_down")?;
        info!("Power down");
        self.modem.deinit_dce().fatal("deinit_dce")?;
        self.modem.deinit_dte().fatal("deinit_dte")?;
        Ok(())
    }

    /// Counts down once per second, then restarts the device.
    pub fn restart_countdown(&self) {
        for remaining in (0..=self.config.restart_countdown_secs).rev() {
            println!("Restarting in {} seconds...", remaining);
            let _ = std::io::stdout().flush();
            self.platform.delay(Duration::from_secs(1));
        }
        self.platform.restart();
    }

    pub fn events(&self) -> &Arc<EventGroup> {
        &self.events
    }

    pub fn modem(&self) -> &M {
        &self.modem
    }

    pub fn mqtt(&self) -> &S {
        &self.mqtt
    }

    fn wait_for(&self, bit: EventBits, timeout: Option<Duration>, step: &'static str) -> StepResult<()> {
        let bits = self.events.wait_bits(bit, true, true, timeout);
        if bits & bit == bit {
            Ok(())
        } else {
            let reason = match timeout {
                Some(timeout) => anyhow!("no event within {:?}", timeout),
                None => anyhow!("wait for {} ended without the event", step),
            };
            Err(StepError::fatal(step, reason))
        }
    }
}

struct LoopSuite<'a, S, E, H, P>
where
    S: MqttSession,
    E: PingEngine,
    H: HttpProbe,
    P: Platform,
{
    ping: &'a mut PingTestRunner<E>,
    mqtt: &'a mut S,
    http: &'a mut H,
    platform: &'a P,
    topic: &'a str,
    payload: &'a str,
}

impl<S, E, H, P> TestSuite for LoopSuite<'_, S, E, H, P>
where
    S: MqttSession,
    E: PingEngine,
    H: HttpProbe,
    P: Platform,
{
    fn ping(&mut self) -> bool {
        let platform = self.platform;
        self.ping.run_ping_test_with(|settle| platform.delay(settle))
    }

    fn publish(&mut self) {
        // Publish failures do not count towards the failure budget
        if let Err(e) = self.mqtt.publish(self.topic, self.payload.as_bytes()) {
            warn!("{}", StepError::retryable("mqtt_publish", e));
        }
    }

    fn http(&mut self) {
        match self.http.run_http_test() {
            Ok(status) => info!("HTTP test finished with status {}", status),
            Err(e) => warn!("{}", StepError::retryable("http_test", e)),
        }
    }

    fn pace(&mut self, delay: Duration) {
        self.platform.delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_control_comes_from_modem_config() {
        let modem = ModemConfig {
            flow_control: FlowControl::Hardware,
            ..Default::default()
        };
        let config = DriverConfig::new(&MqttConfig::default(), &modem);
        assert_eq!(config.flow_control, FlowControl::Hardware);
        assert_eq!(config.mqtt_topic, "/topic/stackcare-pppos");

        assert_eq!(DriverConfig::default().flow_control, FlowControl::None);
    }
}
