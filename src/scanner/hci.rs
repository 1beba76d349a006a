//! Raw HCI socket backend.
//!
//! This backend uses raw Linux HCI sockets to scan for BLE advertisements
//! without requiring the BlueZ daemon. It requires CAP_NET_RAW and
//! CAP_NET_ADMIN capabilities or root privileges.
//!
//! Sensors running the ATC/pvvx firmware usually carry their name only in the
//! scan response, which the controller requests in active mode (`--active`).
//! Names learned from any report are remembered per address and filled into
//! later reports from the same advertiser that lack one.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, ScanError, ScanParameters};
use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use log::{error, info};
use std::collections::HashMap;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::SystemTime;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const HCI_FILTER: c_int = 2;

// HCI packet types
const HCI_EVENT_PKT: u8 = 0x04;

// HCI events
const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta event sub-events
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// Scan types
const LE_SCAN_PASSIVE: u8 = 0x00;
const LE_SCAN_ACTIVE: u8 = 0x01;

// Own address type
const LE_PUBLIC_ADDRESS: u8 = 0x00;

// Filter policy
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

// AD types
const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_TYPE_SERVICE_DATA_UUID16: u8 = 0x16;
const AD_TYPE_SERVICE_DATA_UUID32: u8 = 0x20;
const AD_TYPE_SERVICE_DATA_UUID128: u8 = 0x21;

/// Offset of the first report's fields within an LE advertising report event,
/// after the 4-byte HCI header: num_reports, event_type, addr_type.
const REPORT_ADDRESS_OFFSET: usize = 3;
const REPORT_DATA_LEN_OFFSET: usize = 9;
const REPORT_DATA_OFFSET: usize = 10;

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn new() -> Self {
        Self {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        }
    }

    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype as u32);
    }

    fn set_event(&mut self, event: u8) {
        let bit = event as usize;
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

/// LE Set Scan Parameters command
#[repr(C, packed)]
struct LeSetScanParametersCmd {
    scan_type: u8,
    interval: u16,
    window: u16,
    own_address_type: u8,
    filter_policy: u8,
}

/// LE Set Scan Enable command
#[repr(C, packed)]
struct LeSetScanEnableCmd {
    enable: u8,
    filter_dup: u8,
}

/// Create an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(0x01); // HCI command packet type
    packet.push((opcode & 0xFF) as u8);
    packet.push((opcode >> 8) as u8);
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// Open a raw HCI socket
fn open_hci_socket() -> Result<OwnedFd, ScanError> {
    // Create a raw Bluetooth HCI socket using libc directly
    // since nix doesn't support BTPROTO_HCI
    // SOCK_NONBLOCK is required for AsyncFd to work properly
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            SOCK_RAW | SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            BTPROTO_HCI,
        )
    };

    if fd < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to create HCI socket: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Bind HCI socket to a device
fn bind_hci_socket(fd: &OwnedFd, dev_id: u16) -> Result<(), ScanError> {
    let addr = SockaddrHci {
        hci_family: AF_BLUETOOTH as u16,
        hci_dev: dev_id,
        hci_channel: 0, // HCI_CHANNEL_RAW
    };

    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const SockaddrHci as *const sockaddr,
            mem::size_of::<SockaddrHci>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to bind HCI socket: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Set HCI socket filter
fn set_hci_filter(fd: &OwnedFd) -> Result<(), ScanError> {
    let mut filter = HciFilter::new();
    filter.set_ptype(HCI_EVENT_PKT);
    filter.set_event(EVT_LE_META_EVENT);

    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            0, // SOL_HCI
            HCI_FILTER,
            &filter as *const HciFilter as *const c_void,
            mem::size_of::<HciFilter>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to set HCI filter: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Send an HCI command
fn send_hci_command(fd: &OwnedFd, packet: &[u8]) -> Result<(), ScanError> {
    let ret = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const c_void,
            packet.len(),
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to send HCI command: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

impl LeSetScanParametersCmd {
    fn from_parameters(parameters: &ScanParameters) -> Self {
        Self {
            scan_type: if parameters.active() {
                LE_SCAN_ACTIVE
            } else {
                LE_SCAN_PASSIVE
            },
            interval: parameters.interval_units(),
            window: parameters.window_units(),
            own_address_type: LE_PUBLIC_ADDRESS,
            filter_policy: FILTER_POLICY_ACCEPT_ALL,
        }
    }

    /// Command parameters in HCI (little-endian) byte order.
    fn to_bytes(&self) -> [u8; mem::size_of::<LeSetScanParametersCmd>()] {
        let interval = { self.interval }.to_le_bytes();
        let window = { self.window }.to_le_bytes();
        [
            self.scan_type,
            interval[0],
            interval[1],
            window[0],
            window[1],
            self.own_address_type,
            self.filter_policy,
        ]
    }
}

impl LeSetScanEnableCmd {
    fn to_bytes(&self) -> [u8; mem::size_of::<LeSetScanEnableCmd>()] {
        [self.enable, self.filter_dup]
    }
}

/// Configure LE scanning parameters and enable scanning
fn configure_le_scan(fd: &OwnedFd, parameters: &ScanParameters) -> Result<(), ScanError> {
    let params = LeSetScanParametersCmd::from_parameters(parameters);
    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, &params.to_bytes());
    send_hci_command(fd, &packet)?;

    let enable = LeSetScanEnableCmd {
        enable: 0x01,
        filter_dup: 0x00, // Sensors repeat the same address; keep every report
    };
    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &enable.to_bytes());
    send_hci_command(fd, &packet)?;

    Ok(())
}

/// Apply the AD structures in `ad_data` to `record`.
///
/// Names come from the complete or shortened local name; service data
/// payloads are stored without their UUID, in the order they appear.
fn parse_ad_structures(ad_data: &[u8], record: &mut Advertisement) {
    let mut offset = 0;
    while offset + 2 <= ad_data.len() {
        let len = ad_data[offset] as usize;
        if len == 0 || offset + 1 + len > ad_data.len() {
            break;
        }

        let ad_type = ad_data[offset + 1];
        let value = &ad_data[offset + 2..offset + 1 + len];

        match ad_type {
            AD_TYPE_COMPLETE_LOCAL_NAME => {
                record.name = Some(String::from_utf8_lossy(value).into_owned());
            }
            // A complete name elsewhere in the packet wins
            AD_TYPE_SHORTENED_LOCAL_NAME if record.name.is_none() => {
                record.name = Some(String::from_utf8_lossy(value).into_owned());
            }
            AD_TYPE_SERVICE_DATA_UUID16 => push_service_data(record, value, 2),
            AD_TYPE_SERVICE_DATA_UUID32 => push_service_data(record, value, 4),
            AD_TYPE_SERVICE_DATA_UUID128 => push_service_data(record, value, 16),
            _ => {}
        }

        offset += 1 + len;
    }
}

fn push_service_data(record: &mut Advertisement, value: &[u8], uuid_len: usize) {
    if let Some(data) = value.get(uuid_len..) {
        record.service_data.push(data.to_vec());
    }
}

/// Parse an LE advertising report event into an advertisement record.
///
/// Only the first report of the event is used; controllers deliver one
/// report per event in practice.
fn parse_advertising_report(data: &[u8], received_at: SystemTime) -> Option<Advertisement> {
    // Skip HCI header (1 byte packet type + 1 byte event code + 1 byte param len + 1 byte subevent)
    let report = data.get(4..)?;

    // Number of reports
    if *report.first()? == 0 {
        return None;
    }

    // Extract address (6 bytes, little-endian on the wire)
    let addr: [u8; 6] = report
        .get(REPORT_ADDRESS_OFFSET..REPORT_DATA_LEN_OFFSET)?
        .try_into()
        .ok()?;

    let data_len = *report.get(REPORT_DATA_LEN_OFFSET)? as usize;
    let ad_data = report.get(REPORT_DATA_OFFSET..REPORT_DATA_OFFSET + data_len)?;

    let mut record = Advertisement::new(MacAddress::from_le_bytes(addr), received_at);
    parse_ad_structures(ad_data, &mut record);
    record.rssi = report
        .get(REPORT_DATA_OFFSET + data_len)
        .map(|&rssi| i16::from(rssi as i8));

    Some(record)
}

/// Upper bound on remembered names; advertisers with rotating random addresses
/// would otherwise grow the cache without limit.
const NAME_CACHE_CAPACITY: usize = 1024;

/// Advertised names seen so far, keyed by advertiser address.
#[derive(Debug, Default)]
struct NameCache {
    names: HashMap<MacAddress, String>,
}

impl NameCache {
    /// Remember the name carried by `record`, or fill in a remembered one.
    fn resolve(&mut self, record: &mut Advertisement) {
        match &record.name {
            Some(name) => {
                if self.names.len() >= NAME_CACHE_CAPACITY
                    && !self.names.contains_key(&record.address)
                {
                    self.names.clear();
                }
                self.names.insert(record.address, name.clone());
            }
            None => record.name = self.names.get(&record.address).cloned(),
        }
    }
}

/// What the reader does after one `read(2)` on the HCI socket.
#[derive(Debug)]
enum ReadOutcome {
    Packet(usize),
    Retry,
    Stop(String),
}

fn read_outcome(result: io::Result<usize>) -> ReadOutcome {
    match result {
        Ok(0) => ReadOutcome::Stop("HCI socket closed".to_string()),
        Ok(n) => ReadOutcome::Packet(n),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => ReadOutcome::Retry,
        Err(e) => ReadOutcome::Stop(format!("HCI socket read failed: {e}")),
    }
}

/// Start scanning for advertisements using raw HCI sockets.
///
/// This function opens a raw HCI socket, configures LE scanning with the given
/// parameters, and forwards each advertising report through the returned
/// channel. Runs until the receiver is dropped.
///
/// # Requirements
/// - CAP_NET_RAW and CAP_NET_ADMIN capabilities or root privileges
/// - An available HCI device (typically hci0)
pub async fn start_scan(
    parameters: ScanParameters,
) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    // Open and configure HCI socket for receiving events
    let fd = open_hci_socket()?;
    bind_hci_socket(&fd, 0)?; // Bind to hci0 to receive advertising events
    set_hci_filter(&fd)?;

    // We need a separate socket for sending commands (bound to specific device)
    let cmd_fd = open_hci_socket()?;
    bind_hci_socket(&cmd_fd, 0)?; // Bind to hci0
    configure_le_scan(&cmd_fd, &parameters)?;

    info!(
        "HCI scan enabled on hci0 (interval {:?}, window {:?}, {})",
        parameters.interval(),
        parameters.window(),
        if parameters.active() { "active" } else { "passive" }
    );

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    // Wrap in AsyncFd for async I/O
    let async_fd = AsyncFd::new(fd)
        .map_err(|e| ScanError::Bluetooth(format!("Failed to create async fd: {}", e)))?;

    // Spawn a task to read and process HCI events
    tokio::spawn(async move {
        let _cmd_fd = cmd_fd; // Keep command socket alive
        let mut buf = [0u8; 258]; // Max HCI event size
        let mut names = NameCache::default();

        'events: loop {
            // Wait for the socket to be readable
            let mut guard = match async_fd.readable().await {
                Ok(guard) => guard,
                Err(e) => {
                    error!("HCI socket no longer readable: {e}");
                    break;
                }
            };

            // Drain all available packets before waiting again
            loop {
                let result = match guard.try_io(|inner| {
                    let ret = unsafe {
                        libc::read(
                            inner.as_raw_fd(),
                            buf.as_mut_ptr() as *mut c_void,
                            buf.len(),
                        )
                    };
                    if ret < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(ret as usize)
                    }
                }) {
                    Ok(result) => result,
                    Err(_would_block) => break,
                };

                let n = match read_outcome(result) {
                    ReadOutcome::Packet(n) => n,
                    ReadOutcome::Retry => continue,
                    ReadOutcome::Stop(reason) => {
                        error!("{reason}, stopping HCI scan");
                        break 'events;
                    }
                };

                // Check if this is an LE advertising report
                if n >= 4
                    && buf[0] == HCI_EVENT_PKT
                    && buf[1] == EVT_LE_META_EVENT
                    && buf[3] == EVT_LE_ADVERTISING_REPORT
                    && let Some(mut record) = parse_advertising_report(&buf[..n], SystemTime::now())
                {
                    names.resolve(&mut record);
                    if tx.send(record).await.is_err() {
                        break 'events;
                    }
                }
            }
        }
    });

    Ok(rx)
}
