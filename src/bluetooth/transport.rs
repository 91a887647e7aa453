/// Capability surface the session needs from a Bluetooth stack
use bluer::Uuid;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::models::Channel;

/// Events pushed from transport tasks into the session loop
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A subscribed characteristic notified a new value
    Notification { channel: Channel, value: Vec<u8> },
    /// The link to the device acquired in `epoch` dropped
    LinkLost { epoch: u64 },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Criteria a device must match to be acquired
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFilter {
    pub name: String,
    pub service: Uuid,
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    type Device: Clone;
    type Service: Clone;
    type Characteristic: Clone;

    /// Find one device matching `filter`
    async fn discover_device(&self, filter: &DeviceFilter) -> Result<Self::Device, TransportError>;

    /// Emit `SessionEvent::LinkLost { epoch }` whenever `device` disconnects
    async fn watch_disconnect(
        &self,
        device: &Self::Device,
        epoch: u64,
        events: EventSender,
    ) -> Result<(), TransportError>;

    async fn connect(&self, device: &Self::Device) -> Result<(), TransportError>;

    async fn disconnect(&self, device: &Self::Device) -> Result<(), TransportError>;

    async fn service(&self, device: &Self::Device, uuid: Uuid)
        -> Result<Self::Service, TransportError>;

    async fn characteristic(
        &self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Self::Characteristic, TransportError>;

    async fn read(&self, characteristic: &Self::Characteristic) -> Result<Vec<u8>, TransportError>;

    async fn write(
        &self,
        characteristic: &Self::Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Start notifications and forward each value as `SessionEvent::Notification`
    async fn subscribe(
        &self,
        characteristic: &Self::Characteristic,
        channel: Channel,
        events: EventSender,
    ) -> Result<(), TransportError>;
}
