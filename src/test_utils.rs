use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use std::time::{Duration, SystemTime};

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0xA1, 0xB2, 0xC3]);

/// Fixed receive time used by test records.
pub fn test_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000)
}

/// Payload decoding to 10.00 °C, 100.00 %, 2.932 V, 100 %.
pub fn reference_payload() -> Vec<u8> {
    vec![
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // Device address (ignored)
        0xE8, 0x03, // Temperature: 0x03E8 = 1000 → 10.00 °C
        0x10, 0x27, // Humidity: 0x2710 = 10000 → 100.00 %
        0x74, 0x0B, // Battery: 0x0B74 = 2932 mV
        0x64, // Battery level: 100 %
    ]
}

/// Build an advertisement with the given name and service data payloads.
///
/// Tests can override just the fields they care about.
pub fn record(name: Option<&str>, service_data: Vec<Vec<u8>>) -> Advertisement {
    Advertisement {
        name: name.map(str::to_string),
        service_data,
        ..Advertisement::new(TEST_MAC, test_time())
    }
}
