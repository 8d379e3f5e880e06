use crate::modem::{FlowControl, ModemDevice};
use crate::mqtt::MqttQos;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_url: heapless::String<128>,
    pub client_id: heapless::String<32>,
    pub username: Option<heapless::String<32>>,
    pub password: Option<heapless::String<64>>,
    /// Topic subscribed on connect and published to by the test loop
    pub topic: heapless::String<64>,
    pub payload: heapless::String<64>,
    pub qos: MqttQos,
    pub retain: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    pub device: ModemDevice,
    pub apn: heapless::String<64>,
    pub flow_control: FlowControl,

    /// UART port wired to the modem
    pub uart_port: i32,
    pub baud_rate: u32,
    pub tx_pin: i32,
    pub rx_pin: i32,
    pub rts_pin: i32,
    pub cts_pin: i32,
    pub rx_buffer_size: i32,
    pub tx_buffer_size: i32,
    pub event_queue_size: i32,

    /// DTE receive task settings
    pub dte_buffer_size: usize,
    pub task_stack_size: usize,
    pub task_priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTestConfig {
    pub url: heapless::String<128>,
    pub timeout: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        let mut broker_url = heapless::String::new();
        let mut client_id = heapless::String::new();
        let mut topic = heapless::String::new();
        let mut payload = heapless::String::new();
        let _ = broker_url.push_str("mqtt://mqtt.eclipse.org");
        let _ = client_id.push_str("esp32-pppos");
        let _ = topic.push_str("/topic/stackcare-pppos");
        let _ = payload.push_str("esp32-pppos");

        Self {
            broker_url,
            client_id,
            username: None,
            password: None,
            topic,
            payload,
            qos: MqttQos::AtMostOnce,
            retain: false,
        }
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        let mut apn = heapless::String::new();
        let _ = apn.push_str("internet");

        Self {
            device: ModemDevice::selected(),
            apn,
            flow_control: FlowControl::None,
            uart_port: 1,
            baud_rate: 115_200,
            tx_pin: 25,
            rx_pin: 26,
            rts_pin: 27,
            cts_pin: 23,
            rx_buffer_size: 4096,
            tx_buffer_size: 512,
            event_queue_size: 30,
            dte_buffer_size: 512,
            task_stack_size: 4096,
            task_priority: 5,
        }
    }
}

impl Default for HttpTestConfig {
    fn default() -> Self {
        let mut url = heapless::String::new();
        let _ = url.push_str("http://example.com/");

        Self {
            url,
            timeout: Duration::from_secs(10),
        }
    }
}
