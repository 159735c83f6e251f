//! mDNS responder.
//!
//! Registers `<hostname>.local` and an `_http._tcp` service. The responder
//! is kept alive for as long as this value lives.

use esp_idf_svc::mdns::EspMdns;
use esp_idf_sys::EspError;
use log::info;

use crate::traits::ServiceAdvertiser;

/// ESP-IDF mDNS responder.
#[derive(Default)]
pub struct Esp32Mdns {
    mdns: Option<EspMdns>,
}

impl Esp32Mdns {
    /// Creates an inactive responder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the responder is running.
    pub fn is_active(&self) -> bool {
        self.mdns.is_some()
    }
}

impl ServiceAdvertiser for Esp32Mdns {
    type Error = EspError;

    fn advertise(&mut self, hostname: &str, http_port: u16) -> Result<(), EspError> {
        if self.mdns.is_some() {
            return Ok(());
        }
        let mut mdns = EspMdns::take()?;
        mdns.set_hostname(hostname)?;
        mdns.set_instance_name(hostname)?;
        mdns.add_service(None, "_http", "_tcp", http_port, &[])?;
        info!("mdns: {hostname}.local -> _http._tcp:{http_port}");
        self.mdns = Some(mdns);
        Ok(())
    }
}
