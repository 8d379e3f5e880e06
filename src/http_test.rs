use anyhow::Result;

/// One HTTP round trip over the PPP link.
pub trait HttpProbe {
    /// Fetches the configured URL and returns the response status.
    fn run_http_test(&mut self) -> Result<u16>;
}

#[cfg(target_os = "espidf")]
pub use esp::EspHttpProbe;

#[cfg(target_os = "espidf")]
mod esp {
    use super::HttpProbe;
    use crate::network_config::HttpTestConfig;
    use anyhow::Result;
    use embedded_svc::http::client::Client;
    use embedded_svc::io::Read;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use log::info;

    pub struct EspHttpProbe {
        config: HttpTestConfig,
    }

    impl EspHttpProbe {
        pub fn new(config: HttpTestConfig) -> Self {
            Self { config }
        }
    }

    impl HttpProbe for EspHttpProbe {
        fn run_http_test(&mut self) -> Result<u16> {
            info!("🌐 HTTP: GET {}", self.config.url);

            let connection = EspHttpConnection::new(&Configuration {
                timeout: Some(self.config.timeout),
                ..Default::default()
            })?;
            let mut client = Client::wrap(connection);

            let request = client.get(self.config.url.as_str())?;
            let mut response = request.submit()?;
            let status = response.status();

            let mut buf = [0u8; 512];
            let mut body_len = 0usize;
            loop {
                let read = response.read(&mut buf)?;
                if read == 0 {
                    break;
                }
                body_len += read;
            }

            info!("✅ HTTP: status {}, {} bytes", status, body_len);
            Ok(status)
        }
    }
}
