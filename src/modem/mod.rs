//! Cellular modem roles: the host-side DTE (serial link, PPP framing) and the
//! modem-side DCE (device commands).

pub mod events;

#[cfg(target_os = "espidf")]
pub mod esp;

use anyhow::{anyhow, Result};
use std::ffi::CStr;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub use events::{event_handler, ModemEvent, ModemEventHandler};

#[cfg(target_os = "espidf")]
pub use esp::EspModem;

#[cfg(all(feature = "sim800", feature = "bg96"))]
compile_error!("features `sim800` and `bg96` are mutually exclusive");

#[cfg(not(any(feature = "sim800", feature = "bg96")))]
compile_error!("Unsupported DCE: enable feature `sim800` or `bg96`");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModemDevice {
    /// SIMCom SIM800 (2G)
    Sim800,
    /// Quectel BG96 (LTE Cat M1 / NB-IoT)
    Bg96,
}

impl ModemDevice {
    /// The variant this firmware was built for.
    pub const fn selected() -> Self {
        if cfg!(feature = "bg96") {
            ModemDevice::Bg96
        } else {
            ModemDevice::Sim800
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModemDevice::Sim800 => "SIM800",
            ModemDevice::Bg96 => "BG96",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModemIdentity {
    pub module_name: String,
    pub operator: String,
    pub imei: String,
    pub imsi: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalQuality {
    pub rssi: u32,
    pub ber: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryStatus {
    /// Charge status
    pub bcs: u32,
    /// Charge level, percent
    pub bcl: u32,
    pub voltage_mv: u32,
}

/// Addressing handed out by the PPP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PppIpInfo {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub ns1: Ipv4Addr,
    pub ns2: Ipv4Addr,
}

/// Expands a CIDR prefix length into a dotted netmask.
pub fn netmask_from_prefix(prefix: u8) -> Ipv4Addr {
    let bits = u32::MAX.checked_shl(32 - u32::from(prefix.min(32))).unwrap_or(0);
    Ipv4Addr::from(bits)
}

/// Converts an lwIP address word, stored in network byte order.
pub fn ipv4_from_lwip(addr: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from_be(addr))
}

/// Decodes a NUL-terminated reply the modem wrote into `buf`.
pub fn modem_string(what: &str, buf: &[u8]) -> Result<String> {
    let value =
        CStr::from_bytes_until_nul(buf).map_err(|_| anyhow!("{} is not NUL-terminated", what))?;
    Ok(value.to_string_lossy().trim().to_string())
}

/// Host side of the serial link.
pub trait Dte {
    fn add_event_handler(&mut self, handler: ModemEventHandler) -> Result<()>;

    /// Switches the link to data mode. Completion is signalled by
    /// [`ModemEvent::PppConnect`].
    fn setup_ppp(&mut self) -> Result<()>;

    /// Returns the link to command mode. Completion is signalled by
    /// [`ModemEvent::PppStop`].
    fn exit_ppp(&mut self) -> Result<()>;

    fn deinit_dte(&mut self) -> Result<()>;
}

/// Modem side of the serial link.
pub trait Dce {
    fn device(&self) -> ModemDevice;
    fn identity(&mut self) -> Result<ModemIdentity>;
    fn set_flow_ctrl(&mut self, flow_control: FlowControl) -> Result<()>;
    /// Persists the current configuration as the modem's power-on profile
    fn store_profile(&mut self) -> Result<()>;
    fn get_signal_quality(&mut self) -> Result<SignalQuality>;
    fn get_battery_status(&mut self) -> Result<BatteryStatus>;
    fn power_down(&mut self) -> Result<()>;
    fn deinit_dce(&mut self) -> Result<()>;
}

/// A modem stack that plays both roles.
pub trait Modem: Dte + Dce {}

impl<T: Dte + Dce> Modem for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_targets_sim800() {
        #[cfg(not(feature = "bg96"))]
        assert_eq!(ModemDevice::selected(), ModemDevice::Sim800);
        #[cfg(feature = "bg96")]
        assert_eq!(ModemDevice::selected(), ModemDevice::Bg96);
    }

    #[test]
    fn netmask_covers_prefix_bounds() {
        assert_eq!(netmask_from_prefix(0), Ipv4Addr::UNSPECIFIED);
        assert_eq!(netmask_from_prefix(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(netmask_from_prefix(20), Ipv4Addr::new(255, 255, 240, 0));
        assert_eq!(netmask_from_prefix(32), Ipv4Addr::BROADCAST);
        // PPP links often report a host route; anything larger clamps to /32
        assert_eq!(netmask_from_prefix(40), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn lwip_words_keep_octet_order() {
        let word = u32::from_ne_bytes([8, 8, 4, 4]);
        assert_eq!(ipv4_from_lwip(word), Ipv4Addr::new(8, 8, 4, 4));
        assert_eq!(ipv4_from_lwip(0), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn modem_strings_stop_at_terminator() {
        let mut buf = [0u8; 128];
        buf[..18].copy_from_slice(b"867273020000000\r\n\0");
        buf[20] = b'x';
        assert_eq!(modem_string("IMEI", &buf).unwrap(), "867273020000000");
    }

    #[test]
    fn unterminated_modem_string_is_rejected() {
        let err = modem_string("IMSI", &[b'2'; 64]).unwrap_err();
        assert_eq!(err.to_string(), "IMSI is not NUL-terminated");
    }

    #[test]
    fn device_names() {
        assert_eq!(ModemDevice::Sim800.name(), "SIM800");
        assert_eq!(ModemDevice::Bg96.name(), "BG96");
    }
}
