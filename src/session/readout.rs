/// Latest human-readable line per channel, plus link status
use log::info;

use crate::models::{Channel, Reading};
use crate::utils::round2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readout {
    pub connected: bool,
    pub co2: Option<String>,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub pressure: Option<String>,
    pub elevation: Option<String>,
}

impl Readout {
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        info!(
            "Status: {}",
            if connected { "connected" } else { "disconnected" }
        );
    }

    pub fn update(&mut self, reading: &Reading) {
        let line = format_reading(reading);
        info!("{}", line);

        match reading {
            Reading::Co2(_) => self.co2 = Some(line),
            Reading::Temperature(_) => self.temperature = Some(line),
            Reading::RelativeHumidity(_) => self.humidity = Some(line),
            Reading::Pressure { elevation_m, .. } => {
                self.pressure = Some(line);
                let elevation = format!("Elevation: {:.2}m", elevation_m);
                info!("{}", elevation);
                self.elevation = Some(elevation);
            }
        }
    }

    pub fn line(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Co2 => self.co2.as_deref(),
            Channel::Temperature => self.temperature.as_deref(),
            Channel::RelativeHumidity => self.humidity.as_deref(),
            Channel::Pressure => self.pressure.as_deref(),
        }
    }
}

fn format_reading(reading: &Reading) -> String {
    let channel = reading.channel();
    match reading {
        Reading::Co2(co2) => format!("{}: {}{}", channel, co2, channel.unit()),
        Reading::Temperature(value) | Reading::RelativeHumidity(value) => {
            format!("{}: {}{}", channel, round2(*value), channel.unit())
        }
        Reading::Pressure { pascal, .. } => format!("{}: {}{}", channel, pascal, channel.unit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Co2Value;

    #[test]
    fn lines_carry_units() {
        let mut display = Readout::default();
        display.update(&Reading::Co2(Co2Value::Ppm(812)));
        display.update(&Reading::Temperature(21.5));
        display.update(&Reading::RelativeHumidity(40.25));

        assert_eq!(display.line(Channel::Co2), Some("CO2: 812ppm"));
        assert_eq!(display.line(Channel::Temperature), Some("Temp: 21.5°C"));
        assert_eq!(
            display.line(Channel::RelativeHumidity),
            Some("Relative Humidity: 40.25%")
        );
    }

    #[test]
    fn pressure_also_updates_elevation() {
        let mut display = Readout::default();
        display.update(&Reading::Pressure {
            pascal: 101_325.0,
            elevation_m: 0.0,
        });

        assert_eq!(display.pressure.as_deref(), Some("Pressure: 101325Pa"));
        assert_eq!(display.elevation.as_deref(), Some("Elevation: 0.00m"));
    }
}
