/// Decoding of live notification payloads into typed readings
use crate::error::DecodeError;
use crate::models::{Channel, Co2Value, Reading};

/// Standard sea-level pressure in Pa
const SEA_LEVEL_PA: f64 = 101_325.0;

/// Signature shared by every per-channel decoder
pub type Decoder = fn(&[u8]) -> Result<Reading, DecodeError>;

/// Decoder bound to each channel's notifications
pub fn decoder_for(channel: Channel) -> Decoder {
    match channel {
        Channel::Co2 => decode_co2,
        Channel::Temperature => decode_temperature,
        Channel::RelativeHumidity => decode_humidity,
        Channel::Pressure => decode_pressure,
    }
}

/// Decode a CO2 notification
///
/// The firmware sends either a little-endian u16 (ppm) or, when configured to,
/// the reading as text. Exactly two bytes are taken as the packed form.
pub fn decode_co2(data: &[u8]) -> Result<Reading, DecodeError> {
    if let [lo, hi] = *data {
        return Ok(Reading::Co2(Co2Value::Ppm(u16::from_le_bytes([lo, hi]))));
    }

    let text = std::str::from_utf8(data).map_err(|_| DecodeError::Text)?;
    Ok(Reading::Co2(Co2Value::Text(text.to_string())))
}

/// Decode a temperature notification: u16 LE in hundredths of °C
pub fn decode_temperature(data: &[u8]) -> Result<Reading, DecodeError> {
    let raw = read_u16_le(Channel::Temperature, data)?;
    Ok(Reading::Temperature(f64::from(raw) / 100.0))
}

/// Decode a humidity notification: u16 LE in hundredths of a percent
pub fn decode_humidity(data: &[u8]) -> Result<Reading, DecodeError> {
    let raw = read_u16_le(Channel::RelativeHumidity, data)?;
    Ok(Reading::RelativeHumidity(f64::from(raw) / 100.0))
}

/// Decode a pressure notification: u32 LE in tenths of Pa
pub fn decode_pressure(data: &[u8]) -> Result<Reading, DecodeError> {
    let bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Length {
            channel: Channel::Pressure,
            expected: 4,
            actual: data.len(),
        })?;
    let pascal = f64::from(u32::from_le_bytes(bytes)) / 10.0;

    Ok(Reading::Pressure {
        pascal,
        elevation_m: pa_to_elevation(pascal),
    })
}

/// Barometric elevation estimate in metres for a pressure in Pa
pub fn pa_to_elevation(pascal: f64) -> f64 {
    44_330.0 * (1.0 - (pascal / SEA_LEVEL_PA).powf(0.1903))
}

// The humidity characteristic is written as a u32 by some firmware builds; the
// reading only ever occupies the low two bytes, so longer payloads are accepted.
fn read_u16_le(channel: Channel, data: &[u8]) -> Result<u16, DecodeError> {
    match data {
        [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(DecodeError::Length {
            channel,
            expected: 2,
            actual: data.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn co2_two_bytes_is_packed_ppm() {
        assert_eq!(
            decode_co2(&[0xE8, 0x03]).unwrap(),
            Reading::Co2(Co2Value::Ppm(1000))
        );
    }

    #[test]
    fn co2_other_lengths_are_text() {
        let reading = decode_co2(b"1234").unwrap();
        assert_eq!(reading, Reading::Co2(Co2Value::Text("1234".to_string())));
        assert_eq!(reading.value(), Some(1234.0));

        assert_eq!(decode_co2(&[0xFF, 0xFE, 0xFD]), Err(DecodeError::Text));
    }

    #[test]
    fn temperature_and_humidity_are_hundredths() {
        // 2345 -> 23.45
        assert_eq!(
            decode_temperature(&[0x29, 0x09]).unwrap(),
            Reading::Temperature(23.45)
        );
        // 4512 -> 45.12, trailing padding from a u32 write is ignored
        assert_eq!(
            decode_humidity(&[0xA0, 0x11, 0x00, 0x00]).unwrap(),
            Reading::RelativeHumidity(45.12)
        );
    }

    #[test]
    fn short_payloads_are_rejected() {
        assert_eq!(
            decode_temperature(&[0x01]),
            Err(DecodeError::Length {
                channel: Channel::Temperature,
                expected: 2,
                actual: 1
            })
        );
        assert!(decode_pressure(&[0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn sea_level_pressure_gives_zero_elevation() {
        let bytes = 1_013_250u32.to_le_bytes();
        match decode_pressure(&bytes).unwrap() {
            Reading::Pressure {
                pascal,
                elevation_m,
            } => {
                assert!((pascal - 101_325.0).abs() < f64::EPSILON);
                assert!(elevation_m.abs() < 0.1);
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn lower_pressure_means_higher_elevation() {
        let elevation = pa_to_elevation(89_875.0);
        assert!((elevation - 1_000.0).abs() < 10.0, "got {}", elevation);
    }

    #[test]
    fn decoder_table_covers_every_channel() {
        for channel in Channel::ALL {
            let decode = decoder_for(channel);
            let reading = decode(b"1234").unwrap();
            assert_eq!(reading.channel(), channel);
        }
    }
}
