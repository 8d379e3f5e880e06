use super::PppIpInfo;
use crate::events::{EventGroup, CONNECT_BIT, STOP_BIT};
use log::{info, warn};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemEvent {
    PppStart,
    PppConnect(PppIpInfo),
    PppDisconnect,
    PppStop,
    /// A line from the modem that no parser claimed
    Unknown(String),
}

pub type ModemEventHandler = Box<dyn FnMut(ModemEvent) + Send + 'static>;

/// Builds the handler that turns PPP lifecycle events into driver bits.
pub fn event_handler(events: Arc<EventGroup>) -> ModemEventHandler {
    Box::new(move |event| handle_event(&events, event))
}

fn handle_event(events: &EventGroup, event: ModemEvent) {
    match event {
        ModemEvent::PppStart => {
            info!("Modem PPP Started");
        }
        ModemEvent::PppConnect(ip_info) => {
            info!("Modem Connect to PPP Server");
            info!("~~~~~~~~~~~~~~");
            info!("IP          : {}", ip_info.ip);
            info!("Netmask     : {}", ip_info.netmask);
            info!("Gateway     : {}", ip_info.gateway);
            info!("Name Server1: {}", ip_info.ns1);
            info!("Name Server2: {}", ip_info.ns2);
            info!("~~~~~~~~~~~~~~");
            events.set(CONNECT_BIT);
        }
        ModemEvent::PppDisconnect => {
            warn!("Modem Disconnect from PPP Server");
        }
        ModemEvent::PppStop => {
            warn!("Modem PPP Stopped");
            events.set(STOP_BIT);
        }
        ModemEvent::Unknown(line) => {
            warn!("Unknown line received: {}", line);
        }
    }
}
