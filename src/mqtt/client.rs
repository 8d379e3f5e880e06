use super::{MqttAction, MqttEvent, MqttEventHandler, MqttQos, MqttSession, MqttStatus};
use crate::events::EventGroup;
use crate::network_config::MqttConfig;
use anyhow::{anyhow, Result};
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{info, warn};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};

type SharedClient = Arc<Mutex<EspMqttClient<'static>>>;

/// MQTT client on top of ESP-IDF's esp-mqtt.
///
/// Events are drained on a connection thread. Requests the handler makes
/// (subscribing after connect) go through a second thread, since the client
/// must not be called from the thread that is blocking the event delivery.
pub struct MqttClient {
    config: MqttConfig,
    events: Arc<EventGroup>,
    client: Option<SharedClient>,
    status: MqttStatus,
}

impl MqttClient {
    pub fn new(config: MqttConfig, events: Arc<EventGroup>) -> Self {
        Self {
            config,
            events,
            client: None,
            status: MqttStatus::default(),
        }
    }
}

impl MqttSession for MqttClient {
    fn start(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Err(anyhow!("MQTT client already started"));
        }

        info!("Initializing MQTT client...");
        info!("  Broker: {}", self.config.broker_url);
        info!("  Client ID: {}", self.config.client_id);

        let mqtt_config = MqttClientConfiguration {
            client_id: Some(self.config.client_id.as_str()),
            username: self.config.username.as_ref().map(|u| u.as_str()),
            password: self.config.password.as_ref().map(|p| p.as_str()),
            keep_alive_interval: Some(std::time::Duration::from_secs(30)),
            reconnect_timeout: Some(std::time::Duration::from_secs(5)),
            ..Default::default()
        };

        let (client, connection) = EspMqttClient::new(self.config.broker_url.as_str(), &mqtt_config)?;

        // Transmute to 'static - the client lives until destroy()
        let client_static: EspMqttClient<'static> = unsafe { std::mem::transmute(client) };
        let client = Arc::new(Mutex::new(client_static));

        let (actions_tx, actions_rx) = channel::<MqttAction>();
        let handler = MqttEventHandler::new(
            Arc::clone(&self.events),
            self.config.topic.as_str(),
            self.status.clone(),
        );

        info!("MQTT client created, spawning connection handler");

        let status = self.status.clone();
        std::thread::Builder::new()
            .stack_size(8192)
            .name("mqtt_conn".to_string())
            .spawn(move || run_connection(connection, handler, actions_tx, status))?;

        let weak_client = Arc::downgrade(&client);
        let qos = esp_qos(self.config.qos);
        std::thread::Builder::new()
            .stack_size(4096)
            .name("mqtt_req".to_string())
            .spawn(move || run_requests(actions_rx, weak_client, qos))?;

        self.client = Some(client);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<u32> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("MQTT client not started"))?;

        let msg_id = client
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .enqueue(topic, esp_qos(self.config.qos), self.config.retain, payload)?;

        info!("sent publish successful, msg_id={}", msg_id);
        Ok(msg_id)
    }

    fn destroy(&mut self) {
        info!("🔌 MQTT: Signaling connection handler to shutdown...");
        self.status.shutdown.store(true, Ordering::Relaxed);
        self.status.connected.store(false, Ordering::Relaxed);

        // Dropping the last strong reference stops and destroys esp-mqtt,
        // which ends the connection thread
        if let Some(client) = self.client.take() {
            drop(client);
        }

        // Give the threads a moment to see the shutdown signal and exit
        std::thread::sleep(std::time::Duration::from_millis(100));
        info!("✅ MQTT: client destroyed");
    }
}

fn run_connection(
    mut connection: EspMqttConnection,
    handler: MqttEventHandler,
    actions: Sender<MqttAction>,
    status: MqttStatus,
) {
    info!("MQTT connection handler started");

    loop {
        if status.shutdown.load(Ordering::Relaxed) {
            info!("🔌 MQTT connection handler received shutdown signal, exiting cleanly");
            break;
        }

        match connection.next() {
            Ok(event) => {
                let event = match event.payload() {
                    EventPayload::BeforeConnect => MqttEvent::BeforeConnect,
                    EventPayload::Connected(_) => MqttEvent::Connected,
                    EventPayload::Disconnected => MqttEvent::Disconnected,
                    EventPayload::Subscribed(id) => MqttEvent::Subscribed(id),
                    EventPayload::Unsubscribed(id) => MqttEvent::Unsubscribed(id),
                    EventPayload::Published(id) => MqttEvent::Published(id),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        ..
                    } => MqttEvent::Received {
                        topic: topic.to_string(),
                        data: data.to_vec(),
                    },
                    EventPayload::Error(e) => MqttEvent::Error(format!("{:?}", e)),
                    other => MqttEvent::Other(format!("{:?}", other)),
                };

                if let Some(action) = handler.handle(event) {
                    if actions.send(action).is_err() {
                        warn!("MQTT request thread gone, dropping request");
                    }
                }
            }
            Err(e) => {
                status.connected.store(false, Ordering::Relaxed);
                info!("🔌 MQTT connection handler exiting: {:?}", e);
                break;
            }
        }
    }
}

fn run_requests(actions: Receiver<MqttAction>, client: Weak<Mutex<EspMqttClient<'static>>>, qos: QoS) {
    while let Ok(action) = actions.recv() {
        let Some(client) = client.upgrade() else {
            break;
        };

        match action {
            MqttAction::Subscribe(topic) => {
                let result = client
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .subscribe(&topic, qos);
                match result {
                    Ok(msg_id) => info!("sent subscribe successful, msg_id={}", msg_id),
                    Err(e) => warn!("❌ MQTT subscribe to '{}' failed: {:?}", topic, e),
                }
            }
        }
    }
}

fn esp_qos(qos: MqttQos) -> QoS {
    match qos {
        MqttQos::AtMostOnce => QoS::AtMostOnce,
        MqttQos::AtLeastOnce => QoS::AtLeastOnce,
        MqttQos::ExactlyOnce => QoS::ExactlyOnce,
    }
}
