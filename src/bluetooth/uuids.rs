/// GATT identifiers exposed by the sensor firmware
///
/// Standard ids are the 16-bit assigned numbers expanded over the Bluetooth base UUID.
use bluer::Uuid;

use crate::models::Channel;

/// org.bluetooth.service.environmental_sensing (0x181A)
pub const ENVIRONMENTAL_SENSING: Uuid = Uuid::from_u128(0x0000181a_0000_1000_8000_00805f9b34fb);

/// Vendor characteristic holding the packed CO2 history
pub const CO2_HISTORY: Uuid = Uuid::from_u128(0x00006969_0000_1000_8000_00805f9b34fb);

/// org.bluetooth.characteristic.co2_concentration (0x2B8C)
pub const CO2: Uuid = Uuid::from_u128(0x00002b8c_0000_1000_8000_00805f9b34fb);

/// org.bluetooth.characteristic.temperature (0x2A6E)
pub const TEMPERATURE: Uuid = Uuid::from_u128(0x00002a6e_0000_1000_8000_00805f9b34fb);

/// org.bluetooth.characteristic.humidity (0x2A6F)
pub const HUMIDITY: Uuid = Uuid::from_u128(0x00002a6f_0000_1000_8000_00805f9b34fb);

/// org.bluetooth.characteristic.pressure (0x2A6D)
pub const PRESSURE: Uuid = Uuid::from_u128(0x00002a6d_0000_1000_8000_00805f9b34fb);

/// Vendor characteristic accepting the JSON config document
pub const CONFIG: Uuid = Uuid::from_u128(0x00006970_0000_1000_8000_00805f9b34fb);

/// Live notification characteristic for a channel
pub fn characteristic_for(channel: Channel) -> Uuid {
    match channel {
        Channel::Co2 => CO2,
        Channel::Temperature => TEMPERATURE,
        Channel::RelativeHumidity => HUMIDITY,
        Channel::Pressure => PRESSURE,
    }
}
