//! A single discovered BLE advertisement, as handed over by a scanner backend.

use crate::mac_address::MacAddress;
use std::time::SystemTime;

/// One broadcast record surfaced by the radio stack.
///
/// Backends build a fresh record per discovery event. Service data payloads are
/// stored in the order the backend found them, with any UUID prefix stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Address of the advertiser
    pub address: MacAddress,
    /// Complete or shortened local name, if advertised
    pub name: Option<String>,
    /// Service data payloads, keyed by position
    pub service_data: Vec<Vec<u8>>,
    /// Received signal strength in dBm
    pub rssi: Option<i16>,
    /// When the backend received the advertisement
    pub received_at: SystemTime,
}

impl Advertisement {
    /// Create a record with no name, no service data and no RSSI.
    pub fn new(address: MacAddress, received_at: SystemTime) -> Self {
        Self {
            address,
            name: None,
            service_data: Vec::new(),
            rssi: None,
            received_at,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn has_service_data(&self) -> bool {
        !self.service_data.is_empty()
    }

    /// Service data payload at `index`, if present.
    pub fn service_data(&self, index: usize) -> Option<&[u8]> {
        self.service_data.get(index).map(Vec::as_slice)
    }
}
