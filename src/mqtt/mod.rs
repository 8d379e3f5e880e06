#[cfg(target_os = "espidf")]
pub mod client;

use crate::events::{EventGroup, SUBSCRIBED_BIT};
use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[cfg(target_os = "espidf")]
pub use client::MqttClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MqttQos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Connection to the broker as seen by the application driver.
pub trait MqttSession {
    /// Starts connecting. Subscription is acknowledged through
    /// [`SUBSCRIBED_BIT`].
    fn start(&mut self) -> Result<()>;

    /// Queues a message and returns its message id.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<u32>;

    /// Disconnects and frees the client. Further calls are no-ops.
    fn destroy(&mut self);
}

/// Client-side events, decoupled from the MQTT library's payload types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    BeforeConnect,
    Connected,
    Disconnected,
    Subscribed(u32),
    Unsubscribed(u32),
    Published(u32),
    Received { topic: String, data: Vec<u8> },
    Error(String),
    Other(String),
}

/// Follow-up the client must perform on behalf of the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttAction {
    Subscribe(String),
}

#[derive(Clone)]
pub struct MqttStatus {
    pub connected: Arc<AtomicBool>,
    pub shutdown: Arc<AtomicBool>, // Signal to stop connection handler thread
    pub last_received_topic: Arc<Mutex<String>>,
    pub last_received_message: Arc<Mutex<String>>,
    pub receive_count: Arc<Mutex<u32>>,
}

impl Default for MqttStatus {
    fn default() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            last_received_topic: Arc::new(Mutex::new(String::new())),
            last_received_message: Arc::new(Mutex::new(String::new())),
            receive_count: Arc::new(Mutex::new(0)),
        }
    }
}

impl MqttStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn receive_count(&self) -> u32 {
        *self.receive_count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reacts to client events: subscribes to the test topic once connected and
/// raises [`SUBSCRIBED_BIT`] when the broker acknowledges it.
pub struct MqttEventHandler {
    events: Arc<EventGroup>,
    topic: String,
    status: MqttStatus,
}

impl MqttEventHandler {
    pub fn new(events: Arc<EventGroup>, topic: &str, status: MqttStatus) -> Self {
        Self {
            events,
            topic: topic.to_string(),
            status,
        }
    }

    pub fn handle(&self, event: MqttEvent) -> Option<MqttAction> {
        match event {
            MqttEvent::BeforeConnect => {
                info!("🔄 MQTT attempting to connect...");
                None
            }
            MqttEvent::Connected => {
                info!("MQTT_EVENT_CONNECTED");
                self.status.connected.store(true, Ordering::Relaxed);
                Some(MqttAction::Subscribe(self.topic.clone()))
            }
            MqttEvent::Disconnected => {
                info!("MQTT_EVENT_DISCONNECTED");
                self.status.connected.store(false, Ordering::Relaxed);
                None
            }
            MqttEvent::Subscribed(msg_id) => {
                info!("MQTT_EVENT_SUBSCRIBED, msg_id={}", msg_id);
                self.events.set(SUBSCRIBED_BIT);
                None
            }
            MqttEvent::Unsubscribed(msg_id) => {
                info!("MQTT_EVENT_UNSUBSCRIBED, msg_id={}", msg_id);
                None
            }
            MqttEvent::Published(msg_id) => {
                info!("MQTT_EVENT_PUBLISHED, msg_id={}", msg_id);
                None
            }
            MqttEvent::Received { topic, data } => {
                info!("MQTT_EVENT_DATA");
                let message = String::from_utf8_lossy(&data).into_owned();
                info!("TOPIC={}", topic);
                info!("DATA={}", message);
                *self
                    .status
                    .last_received_topic
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = topic;
                *self
                    .status
                    .last_received_message
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = message;
                *self
                    .status
                    .receive_count
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) += 1;
                None
            }
            MqttEvent::Error(e) => {
                warn!("MQTT_EVENT_ERROR: {}", e);
                None
            }
            MqttEvent::Other(name) => {
                info!("MQTT other event: {}", name);
                None
            }
        }
    }
}
