pub mod bluez;
pub mod decoder;
pub mod history;
pub mod transport;
pub mod uuids;

pub use bluez::BluezTransport;
