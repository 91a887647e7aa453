/// BlueZ-backed transport for the sensor session
use std::cell::RefCell;
use std::collections::HashSet;

use bluer::gatt::remote::{Characteristic, Service};
use bluer::{AdapterEvent, Device, DeviceEvent, DeviceProperty, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::AbortHandle;
use tokio::time::{sleep, Duration, Instant};

use crate::bluetooth::transport::{DeviceFilter, EventSender, SessionEvent, Transport};
use crate::error::TransportError;
use crate::models::Channel;

/// How long to wait for BlueZ to finish resolving GATT services after connecting
const SERVICE_RESOLVE_TIMEOUT_SECS: u64 = 10;
const SERVICE_RESOLVE_POLL_MS: u64 = 250;

/// The single disconnect watcher task; starting a new one aborts the old one
#[derive(Debug, Default)]
struct WatcherSlot {
    current: RefCell<Option<AbortHandle>>,
}

impl WatcherSlot {
    fn replace(&self, watcher: AbortHandle) {
        if let Some(previous) = self.current.replace(Some(watcher)) {
            debug!("Stopping previous disconnect watcher");
            previous.abort();
        }
    }
}

impl Drop for WatcherSlot {
    fn drop(&mut self) {
        if let Some(watcher) = self.current.get_mut().take() {
            watcher.abort();
        }
    }
}

pub struct BluezTransport {
    _session: bluer::Session,
    adapter: bluer::Adapter,
    scan_duration: Duration,
    watcher: WatcherSlot,
}

impl BluezTransport {
    /// Open a BlueZ session on the default adapter and power it on
    pub async fn new(scan_duration: Duration) -> Result<Self, TransportError> {
        // Initialize Bluetooth session
        let session = match bluer::Session::new().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create Bluetooth session: {}", e);
                return Err(e.into());
            }
        };

        // Get the default Bluetooth adapter
        let adapter = match session.default_adapter().await {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("Failed to get default Bluetooth adapter: {}", e);
                return Err(e.into());
            }
        };

        // Ensure Bluetooth adapter is powered on
        if let Err(e) = adapter.set_powered(true).await {
            error!("Failed to power on adapter: {}", e);
            return Err(e.into());
        }

        info!("Using Bluetooth adapter {}", adapter.name());

        Ok(BluezTransport {
            _session: session,
            adapter,
            scan_duration,
            watcher: WatcherSlot::default(),
        })
    }

    async fn matches(device: &Device, filter: &DeviceFilter) -> bool {
        match device.name().await {
            Ok(Some(name)) => name == filter.name,
            Ok(None) => false,
            Err(e) => {
                debug!("Failed to read name of {}: {}", device.address(), e);
                false
            }
        }
    }
}

impl Transport for BluezTransport {
    type Device = Device;
    type Service = Service;
    type Characteristic = Characteristic;

    async fn discover_device(&self, filter: &DeviceFilter) -> Result<Device, TransportError> {
        // Low Energy devices advertising the sensing service only
        let discovery_filter = bluer::DiscoveryFilter {
            transport: bluer::DiscoveryTransport::Le,
            uuids: HashSet::from([filter.service]),
            duplicate_data: false,
            ..Default::default()
        };

        // Apply the discovery filter (warn if it fails, but continue)
        if let Err(e) = self.adapter.set_discovery_filter(discovery_filter).await {
            warn!("Failed to set discovery filter: {}", e);
        }

        let mut discovery = Box::pin(self.adapter.discover_devices().await?);
        let deadline = Instant::now() + self.scan_duration;

        // Discovery stops when the stream is dropped
        loop {
            let event = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => None,
                event = discovery.next() => event,
            };

            match event {
                Some(AdapterEvent::DeviceAdded(addr)) => {
                    let device = match self.adapter.device(addr) {
                        Ok(device) => device,
                        Err(_) => continue,
                    };
                    debug!("Discovered {}", addr);
                    if Self::matches(&device, filter).await {
                        info!("Found '{}' at {}", filter.name, addr);
                        return Ok(device);
                    }
                }
                Some(other) => debug!("Discovery event: {:?}", other),
                None => {
                    return Err(TransportError::NotFound {
                        name: filter.name.clone(),
                    })
                }
            }
        }
    }

    async fn watch_disconnect(
        &self,
        device: &Device,
        epoch: u64,
        events: EventSender,
    ) -> Result<(), TransportError> {
        let mut device_events = Box::pin(device.events().await?);
        let addr = device.address();

        let watcher = tokio::spawn(async move {
            while let Some(event) = device_events.next().await {
                if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                    debug!("{} reported disconnect", addr);
                    if events.send(SessionEvent::LinkLost { epoch }).is_err() {
                        break;
                    }
                }
            }
        });
        self.watcher.replace(watcher.abort_handle());

        Ok(())
    }

    async fn connect(&self, device: &Device) -> Result<(), TransportError> {
        device
            .connect()
            .await
            .map_err(|e| TransportError::Link(e.to_string()))
    }

    async fn disconnect(&self, device: &Device) -> Result<(), TransportError> {
        device
            .disconnect()
            .await
            .map_err(|e| TransportError::Link(e.to_string()))
    }

    async fn service(&self, device: &Device, uuid: Uuid) -> Result<Service, TransportError> {
        let deadline = Instant::now() + Duration::from_secs(SERVICE_RESOLVE_TIMEOUT_SECS);
        while !device.is_services_resolved().await? {
            if Instant::now() >= deadline {
                warn!("Services of {} not resolved in time", device.address());
                break;
            }
            sleep(Duration::from_millis(SERVICE_RESOLVE_POLL_MS)).await;
        }

        for service in device.services().await? {
            if service.uuid().await? == uuid {
                return Ok(service);
            }
        }

        Err(TransportError::MissingAttribute {
            kind: "service",
            uuid: uuid.to_string(),
        })
    }

    async fn characteristic(
        &self,
        service: &Service,
        uuid: Uuid,
    ) -> Result<Characteristic, TransportError> {
        for characteristic in service.characteristics().await? {
            if characteristic.uuid().await? == uuid {
                return Ok(characteristic);
            }
        }

        Err(TransportError::MissingAttribute {
            kind: "characteristic",
            uuid: uuid.to_string(),
        })
    }

    async fn read(&self, characteristic: &Characteristic) -> Result<Vec<u8>, TransportError> {
        characteristic
            .read()
            .await
            .map_err(|e| TransportError::Read(e.to_string()))
    }

    async fn write(
        &self,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        characteristic
            .write(value)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn subscribe(
        &self,
        characteristic: &Characteristic,
        channel: Channel,
        events: EventSender,
    ) -> Result<(), TransportError> {
        let notifications = characteristic
            .notify()
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        let mut notifications = Box::pin(notifications);

        tokio::spawn(async move {
            while let Some(value) = notifications.next().await {
                if events
                    .send(SessionEvent::Notification { channel, value })
                    .is_err()
                {
                    break;
                }
            }
            debug!("{} notifications ended", channel);
        });

        Ok(())
    }
}
