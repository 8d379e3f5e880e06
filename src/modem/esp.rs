use super::{
    ipv4_from_lwip, modem_string, netmask_from_prefix, BatteryStatus, Dce, Dte, FlowControl,
    ModemDevice, ModemEvent, ModemEventHandler, ModemIdentity, PppIpInfo, SignalQuality,
};
use crate::network_config::ModemConfig;
use anyhow::{anyhow, Result};
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::handle::RawHandle;
use esp_idf_svc::netif::{EspNetif, IpEvent, NetifStack};
use esp_idf_svc::sys::{self, esp};
use log::info;
use std::ffi::{c_char, c_int, CString};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// The component copies at most `ESP_MODEM_C_API_STR_MAX` (64) bytes,
/// terminator included, into caller buffers.
const MODEM_STR_BUF_LEN: usize = 128;

/// SIM800/BG96 modem driven through the ESP-IDF `esp_modem` component.
///
/// One handle serves both roles: the component owns the UART DTE and the
/// device-specific DCE, and attaches the PPP netif when switched to data mode.
pub struct EspModem {
    dce: *mut sys::esp_modem_dce_t,
    device: ModemDevice,
    netif: Option<EspNetif>,
    sysloop: EspSystemEventLoop,
    handler: Option<Arc<Mutex<ModemEventHandler>>>,
    subscription: Option<EspSubscription<'static, System>>,
    _apn: CString,
}

impl EspModem {
    pub fn new(sysloop: EspSystemEventLoop, config: &ModemConfig) -> Result<Self> {
        info!("📶 Modem: Creating PPP network interface...");
        let netif = EspNetif::new(NetifStack::Ppp)?;
        info!("✅ Modem: PPP netif created");

        let apn = CString::new(config.apn.as_str())?;

        let mut dte_config = sys::esp_modem_dte_config_t {
            dte_buffer_size: config.dte_buffer_size,
            task_stack_size: config.task_stack_size as _,
            task_priority: config.task_priority as _,
            ..Default::default()
        };
        dte_config.__bindgen_anon_1.uart_config = sys::esp_modem_uart_term_config {
            port_num: config.uart_port,
            data_bits: sys::uart_word_length_t_UART_DATA_8_BITS,
            stop_bits: sys::uart_stop_bits_t_UART_STOP_BITS_1,
            parity: sys::uart_parity_t_UART_PARITY_DISABLE,
            flow_control: esp_flow_control(config.flow_control),
            baud_rate: config.baud_rate as _,
            tx_io_num: config.tx_pin,
            rx_io_num: config.rx_pin,
            rts_io_num: config.rts_pin,
            cts_io_num: config.cts_pin,
            rx_buffer_size: config.rx_buffer_size,
            tx_buffer_size: config.tx_buffer_size,
            event_queue_size: config.event_queue_size,
            ..Default::default()
        };

        let dce_config = sys::esp_modem_dce_config_t { apn: apn.as_ptr() };

        let module = match config.device {
            ModemDevice::Sim800 => sys::esp_modem_dce_device_t_ESP_MODEM_DCE_SIM800,
            ModemDevice::Bg96 => sys::esp_modem_dce_device_t_ESP_MODEM_DCE_BG96,
        };

        info!(
            "📶 Modem: Creating {} DTE/DCE on UART{} ({} baud, TX {}, RX {})...",
            config.device.name(),
            config.uart_port,
            config.baud_rate,
            config.tx_pin,
            config.rx_pin
        );
        let dce = unsafe { sys::esp_modem_new_dev(module, &dte_config, &dce_config, netif.handle()) };
        if dce.is_null() {
            return Err(anyhow!("esp_modem_new_dev returned no DCE for {}", config.device.name()));
        }
        info!("✅ Modem: DTE/DCE created");

        Ok(Self {
            dce,
            device: config.device,
            netif: Some(netif),
            sysloop,
            handler: None,
            subscription: None,
            _apn: apn,
        })
    }

    fn dispatch(&self, event: ModemEvent) {
        if let Some(handler) = &self.handler {
            let mut handler = handler.lock().unwrap_or_else(|e| e.into_inner());
            (*handler)(event);
        }
    }

    fn read_string(
        &self,
        what: &str,
        f: impl FnOnce(*mut sys::esp_modem_dce_t, *mut c_char) -> sys::esp_err_t,
    ) -> Result<String> {
        // SAFETY: the buffer outlives the call and is larger than anything the
        // component writes into it
        let mut buf = [0u8; MODEM_STR_BUF_LEN];
        esp!(f(self.dce, buf.as_mut_ptr() as *mut c_char))
            .map_err(|e| anyhow!("reading {} failed: {:?}", what, e))?;
        modem_string(what, &buf)
    }

    fn ensure_dce(&self) -> Result<()> {
        if self.dce.is_null() {
            Err(anyhow!("modem DCE already deinitialized"))
        } else {
            Ok(())
        }
    }
}

impl Dte for EspModem {
    fn add_event_handler(&mut self, handler: ModemEventHandler) -> Result<()> {
        let ppp_netif = self
            .netif
            .as_ref()
            .ok_or_else(|| anyhow!("PPP netif already released"))?
            .handle() as usize;
        let handler = Arc::new(Mutex::new(handler));
        let for_ip_events = Arc::clone(&handler);

        let subscription = self.sysloop.subscribe::<IpEvent, _>(move |event| {
            if !event.is_for_handle(ppp_netif as *mut sys::esp_netif_t) {
                return;
            }
            let modem_event = match event {
                IpEvent::DhcpIpAssigned(assignment) => {
                    let netif = assignment.netif_handle();
                    ModemEvent::PppConnect(PppIpInfo {
                        ip: assignment.ip(),
                        netmask: netmask_from_prefix(assignment.mask().0),
                        gateway: assignment.gateway(),
                        ns1: read_dns(netif, sys::esp_netif_dns_type_t_ESP_NETIF_DNS_MAIN),
                        ns2: read_dns(netif, sys::esp_netif_dns_type_t_ESP_NETIF_DNS_BACKUP),
                    })
                }
                IpEvent::DhcpIpDeassigned(_) => ModemEvent::PppStop,
                _ => return,
            };
            let mut handler = for_ip_events.lock().unwrap_or_else(|e| e.into_inner());
            (*handler)(modem_event);
        })?;

        self.handler = Some(handler);
        self.subscription = Some(subscription);
        Ok(())
    }

    fn setup_ppp(&mut self) -> Result<()> {
        self.ensure_dce()?;
        esp!(unsafe { sys::esp_modem_set_mode(self.dce, sys::esp_modem_dce_mode_t_ESP_MODEM_MODE_DATA) })?;
        self.dispatch(ModemEvent::PppStart);
        Ok(())
    }

    fn exit_ppp(&mut self) -> Result<()> {
        self.ensure_dce()?;
        esp!(unsafe {
            sys::esp_modem_set_mode(self.dce, sys::esp_modem_dce_mode_t_ESP_MODEM_MODE_COMMAND)
        })?;
        self.dispatch(ModemEvent::PppDisconnect);
        Ok(())
    }

    fn deinit_dte(&mut self) -> Result<()> {
        // The UART terminal is released together with the DCE, only the
        // event subscription and the netif remain
        self.subscription = None;
        self.handler = None;
        self.netif = None;
        info!("✅ Modem: DTE released");
        Ok(())
    }
}

impl Dce for EspModem {
    fn device(&self) -> ModemDevice {
        self.device
    }

    fn identity(&mut self) -> Result<ModemIdentity> {
        self.ensure_dce()?;
        let module_name =
            self.read_string("module name", |dce, buf| unsafe { sys::esp_modem_get_module_name(dce, buf) })?;
        let operator = self.read_string("operator", |dce, buf| {
            let mut act: c_int = 0;
            unsafe { sys::esp_modem_get_operator_name(dce, buf, &mut act) }
        })?;
        let imei = self.read_string("IMEI", |dce, buf| unsafe { sys::esp_modem_get_imei(dce, buf) })?;
        let imsi = self.read_string("IMSI", |dce, buf| unsafe { sys::esp_modem_get_imsi(dce, buf) })?;

        Ok(ModemIdentity {
            module_name,
            operator,
            imei,
            imsi,
        })
    }

    fn set_flow_ctrl(&mut self, flow_control: FlowControl) -> Result<()> {
        self.ensure_dce()?;
        let flow = esp_flow_control(flow_control) as c_int;
        esp!(unsafe { sys::esp_modem_set_flow_control(self.dce, flow, flow) })?;
        Ok(())
    }

    fn store_profile(&mut self) -> Result<()> {
        self.ensure_dce()?;
        esp!(unsafe { sys::esp_modem_store_profile(self.dce) })?;
        Ok(())
    }

    fn get_signal_quality(&mut self) -> Result<SignalQuality> {
        self.ensure_dce()?;
        let (mut rssi, mut ber): (c_int, c_int) = (0, 0);
        esp!(unsafe { sys::esp_modem_get_signal_quality(self.dce, &mut rssi, &mut ber) })?;
        Ok(SignalQuality {
            rssi: rssi.max(0) as u32,
            ber: ber.max(0) as u32,
        })
    }

    fn get_battery_status(&mut self) -> Result<BatteryStatus> {
        self.ensure_dce()?;
        let (mut voltage, mut bcs, mut bcl): (c_int, c_int, c_int) = (0, 0, 0);
        esp!(unsafe { sys::esp_modem_get_battery_status(self.dce, &mut voltage, &mut bcs, &mut bcl) })?;
        Ok(BatteryStatus {
            bcs: bcs.max(0) as u32,
            bcl: bcl.max(0) as u32,
            voltage_mv: voltage.max(0) as u32,
        })
    }

    fn power_down(&mut self) -> Result<()> {
        self.ensure_dce()?;
        esp!(unsafe { sys::esp_modem_power_down(self.dce) })?;
        Ok(())
    }

    fn deinit_dce(&mut self) -> Result<()> {
        self.ensure_dce()?;
        unsafe { sys::esp_modem_destroy(self.dce) };
        self.dce = core::ptr::null_mut();
        info!("✅ Modem: DCE destroyed");
        Ok(())
    }
}

impl Drop for EspModem {
    fn drop(&mut self) {
        if !self.dce.is_null() {
            unsafe { sys::esp_modem_destroy(self.dce) };
        }
    }
}

fn esp_flow_control(flow_control: FlowControl) -> sys::esp_modem_flow_ctrl_t {
    match flow_control {
        FlowControl::None => sys::esp_modem_flow_ctrl_t_ESP_MODEM_FLOW_CONTROL_NONE,
        FlowControl::Software => sys::esp_modem_flow_ctrl_t_ESP_MODEM_FLOW_CONTROL_SW,
        FlowControl::Hardware => sys::esp_modem_flow_ctrl_t_ESP_MODEM_FLOW_CONTROL_HW,
    }
}

/// Name server the PPP peer negotiated, `0.0.0.0` when none was offered.
fn read_dns(netif: *mut sys::esp_netif_t, kind: sys::esp_netif_dns_type_t) -> Ipv4Addr {
    let mut info: sys::esp_netif_dns_info_t = Default::default();
    // SAFETY: the handle comes from a live IP event and `info` is a local
    match esp!(unsafe { sys::esp_netif_get_dns_info(netif, kind, &mut info) }) {
        Ok(()) => ipv4_from_lwip(unsafe { info.ip.u_addr.ip4.addr }),
        Err(_) => Ipv4Addr::UNSPECIFIED,
    }
}
