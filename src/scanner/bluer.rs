//! BlueZ D-Bus backend.
//!
//! This backend uses the `bluer` crate to run LE discovery through the BlueZ
//! daemon. It requires the `bluetoothd` daemon to be running. BlueZ chooses
//! its own scan timing, so [`ScanParameters`] are not applied here.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, ScanError, ScanParameters};
use crate::advertisement::Advertisement;
use bluer::{
    Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty, DiscoveryFilter,
    DiscoveryTransport, Session, Uuid,
};
use futures::stream::{BoxStream, SelectAll};
use futures::{StreamExt, pin_mut};
use log::{debug, error, info};
use std::collections::HashSet;
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start LE discovery using the BlueZ D-Bus backend.
///
/// Returns once discovery is running. A record is sent through the returned
/// channel each time a device reports new service data, so one broadcast
/// yields one record no matter how many other properties (RSSI, name) changed
/// with it. Devices BlueZ already knew about before discovery started are only
/// reported once they broadcast again. Runs until the receiver is dropped.
pub async fn start_scan(
    parameters: ScanParameters,
) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    adapter
        .set_discovery_filter(DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        })
        .await?;

    if parameters != ScanParameters::default() {
        info!("Scan interval and window are managed by BlueZ, ignoring configured values");
    }

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);
    let (started_tx, started_rx) = oneshot::channel();

    // Spawn a task that owns all Bluetooth state and runs the event loop
    tokio::spawn(async move {
        let _session = session;

        let devices = match adapter.discover_devices().await {
            Ok(devices) => {
                let _ = started_tx.send(Ok(()));
                devices
            }
            Err(e) => {
                let _ = started_tx.send(Err(ScanError::from(e)));
                return;
            }
        };
        pin_mut!(devices);

        let mut subscribed = HashSet::new();
        let mut changes: SelectAll<BoxStream<'static, (Address, DeviceEvent)>> = SelectAll::new();

        loop {
            tokio::select! {
                event = devices.next() => match event {
                    Some(AdapterEvent::DeviceAdded(address)) if subscribed.insert(address) => {
                        match subscribe(&adapter, address).await {
                            Ok(events) => changes.push(events),
                            Err(e) => {
                                subscribed.remove(&address);
                                debug!("Failed to watch device {address}: {e}");
                            }
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
                Some((address, event)) = changes.next() => {
                    let Some(service_data) = service_data_update(event) else {
                        continue;
                    };
                    match read_advertisement(&adapter, address, service_data).await {
                        Ok(record) => {
                            if tx.send(record).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => debug!("Failed to read device {address}: {e}"),
                    }
                }
            }
        }

        error!("BlueZ discovery stream ended");
    });

    started_rx
        .await
        .map_err(|_| ScanError::Bluetooth("discovery task exited during startup".into()))??;

    Ok(rx)
}

/// Property changes of one device, tagged with its address.
async fn subscribe(
    adapter: &Adapter,
    address: Address,
) -> Result<BoxStream<'static, (Address, DeviceEvent)>, ScanError> {
    let events = adapter.device(address)?.events().await?;
    Ok(events.map(move |event| (address, event)).boxed())
}

/// Service data payloads carried by a device event, ordered by UUID.
///
/// Only a service data change is a new broadcast worth decoding; other
/// property changes (RSSI, name, ...) yield `None`. BlueZ keys service data
/// by UUID, so payloads are sorted to keep payload 0 the same from one event
/// to the next.
fn service_data_update(event: DeviceEvent) -> Option<Vec<Vec<u8>>> {
    let DeviceEvent::PropertyChanged(DeviceProperty::ServiceData(map)) = event else {
        return None;
    };

    let mut entries: Vec<(Uuid, Vec<u8>)> = map.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    Some(entries.into_iter().map(|(_, data)| data).collect())
}

/// Build a record from fresh service data plus the device's current name and RSSI.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
    service_data: Vec<Vec<u8>>,
) -> Result<Advertisement, ScanError> {
    let device = adapter.device(address)?;

    Ok(Advertisement {
        name: device.name().await?,
        service_data,
        rssi: device.rssi().await?,
        ..Advertisement::new(address.into(), SystemTime::now())
    })
}
