use std::fmt;

use time::OffsetDateTime;

/// One of the four live sensor series exposed by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Co2,
    Temperature,
    RelativeHumidity,
    Pressure,
}

impl Channel {
    /// Subscription order used when a connection comes up
    pub const ALL: [Channel; 4] = [
        Channel::Co2,
        Channel::Temperature,
        Channel::RelativeHumidity,
        Channel::Pressure,
    ];

    pub fn unit(self) -> &'static str {
        match self {
            Channel::Co2 => "ppm",
            Channel::Temperature => "°C",
            Channel::RelativeHumidity => "%",
            Channel::Pressure => "Pa",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Channel::Co2 => 0,
            Channel::Temperature => 1,
            Channel::RelativeHumidity => 2,
            Channel::Pressure => 3,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Co2 => "CO2",
            Channel::Temperature => "Temp",
            Channel::RelativeHumidity => "Relative Humidity",
            Channel::Pressure => "Pressure",
        };
        f.write_str(name)
    }
}

/// A single timestamped reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: OffsetDateTime,
    pub value: f64,
}

/// CO2 notifications arrive either as a packed integer or as the firmware's text form
#[derive(Debug, Clone, PartialEq)]
pub enum Co2Value {
    Ppm(u16),
    Text(String),
}

impl Co2Value {
    /// Numeric value for the rolling window, if the text form holds a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Co2Value::Ppm(ppm) => Some(f64::from(*ppm)),
            Co2Value::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Co2Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Co2Value::Ppm(ppm) => write!(f, "{}", ppm),
            Co2Value::Text(text) => f.write_str(text),
        }
    }
}

/// Decoded notification payload for one channel
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Co2(Co2Value),
    Temperature(f64),
    RelativeHumidity(f64),
    Pressure { pascal: f64, elevation_m: f64 },
}

impl Reading {
    pub fn channel(&self) -> Channel {
        match self {
            Reading::Co2(_) => Channel::Co2,
            Reading::Temperature(_) => Channel::Temperature,
            Reading::RelativeHumidity(_) => Channel::RelativeHumidity,
            Reading::Pressure { .. } => Channel::Pressure,
        }
    }

    /// Value appended to the channel's rolling window
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Co2(co2) => co2.as_number(),
            Reading::Temperature(celsius) => Some(*celsius),
            Reading::RelativeHumidity(percent) => Some(*percent),
            Reading::Pressure { pascal, .. } => Some(*pascal),
        }
    }
}
