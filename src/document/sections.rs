/// Config document sections and the field edits that build them
use serde::Serialize;

use crate::document::ConfigDocument;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WlanSection {
    pub ssid: String,
    pub password: String,
    pub connection_wait_s: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BluetoothSection {
    pub name: String,
    pub advertisement_freq_us: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scd41Section {
    pub low_power: bool,
    pub asc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bmp180Section {
    pub upper_pressure: i64,
    pub lower_pressure: i64,
    pub oversampling: i64,
    pub oversampling_wlan: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfluxSection {
    pub host: String,
    pub bucket: String,
    pub username: String,
    pub password: String,
    pub datapoint: String,
}

/// Field values for each section that should be (re)applied
///
/// A section is present when its leading field is set; the remaining string
/// fields default to empty and booleans to false, numbers must be given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldEdits {
    pub debug_level: Option<i64>,
    pub logs: Option<Vec<String>>,
    pub history_size: Option<u32>,
    pub wlan: Option<WlanSection>,
    pub bluetooth: Option<BluetoothSection>,
    pub scd41: Option<Scd41Section>,
    pub bmp180: Option<Bmp180Section>,
    pub influx: Option<InfluxSection>,
}

impl FieldEdits {
    /// Read `AVENET_CFG_*` field values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = Fields { lookup };

        let wlan = match fields.text("AVENET_CFG_WLAN_SSID") {
            Some(ssid) => Some(WlanSection {
                ssid,
                password: fields.text_or_empty("AVENET_CFG_WLAN_PASSWORD"),
                connection_wait_s: fields.required("AVENET_CFG_WLAN_CONNECTION_WAIT_S")?,
            }),
            None => None,
        };

        let bluetooth = match fields.text("AVENET_CFG_BT_NAME") {
            Some(name) => Some(BluetoothSection {
                name,
                advertisement_freq_us: fields.required("AVENET_CFG_BT_ADVERTISEMENT_FREQ_US")?,
            }),
            None => None,
        };

        let scd41 = match fields.flag("AVENET_CFG_SCD41_LOW_POWER")? {
            Some(low_power) => Some(Scd41Section {
                low_power,
                asc: fields.flag("AVENET_CFG_SCD41_ASC")?.unwrap_or(false),
            }),
            None => None,
        };

        let bmp180 = match fields.number("AVENET_CFG_BMP180_UPPER_PRESSURE")? {
            Some(upper_pressure) => Some(Bmp180Section {
                upper_pressure,
                lower_pressure: fields.required("AVENET_CFG_BMP180_LOWER_PRESSURE")?,
                oversampling: fields.required("AVENET_CFG_BMP180_OVERSAMPLING")?,
                oversampling_wlan: fields.required("AVENET_CFG_BMP180_OVERSAMPLING_WLAN")?,
            }),
            None => None,
        };

        let influx = match fields.text("AVENET_CFG_INFLUX_HOST") {
            Some(host) => Some(InfluxSection {
                host,
                bucket: fields.text_or_empty("AVENET_CFG_INFLUX_BUCKET"),
                username: fields.text_or_empty("AVENET_CFG_INFLUX_USERNAME"),
                password: fields.text_or_empty("AVENET_CFG_INFLUX_PASSWORD"),
                datapoint: fields.text_or_empty("AVENET_CFG_INFLUX_DATAPOINT"),
            }),
            None => None,
        };

        let logs = fields.text("AVENET_CFG_LOGS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        });

        Ok(FieldEdits {
            debug_level: fields.number("AVENET_CFG_DEBUG_LEVEL")?,
            logs,
            history_size: fields.number("AVENET_CFG_HISTORY_SIZE")?,
            wlan,
            bluetooth,
            scd41,
            bmp180,
            influx,
        })
    }

    /// Apply every present section in document order; returns how many were applied
    pub fn apply_to(&self, document: &mut ConfigDocument) -> Result<usize, ConfigError> {
        let mut applied = 0;

        if let Some(level) = self.debug_level {
            document.apply_debug_level(level)?;
            applied += 1;
        }
        if let Some(logs) = &self.logs {
            document.apply_logs(logs)?;
            applied += 1;
        }
        if let Some(size) = self.history_size {
            document.apply_history_size(size)?;
            applied += 1;
        }
        if let Some(wlan) = &self.wlan {
            document.apply_wlan(wlan)?;
            applied += 1;
        }
        if let Some(bluetooth) = &self.bluetooth {
            document.apply_bluetooth(bluetooth)?;
            applied += 1;
        }
        if let Some(scd41) = &self.scd41 {
            document.apply_scd41(scd41)?;
            applied += 1;
        }
        if let Some(bmp180) = &self.bmp180 {
            document.apply_bmp180(bmp180)?;
            applied += 1;
        }
        if let Some(influx) = &self.influx {
            document.apply_influx(influx)?;
            applied += 1;
        }

        Ok(applied)
    }
}

struct Fields<F> {
    lookup: F,
}

impl<F> Fields<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    fn text_or_empty(&self, key: &str) -> String {
        (self.lookup)(key).unwrap_or_default()
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.text(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, &raw)),
            None => Ok(None),
        }
    }

    fn required<T: std::str::FromStr>(&self, key: &str) -> Result<T, ConfigError> {
        self.number(key)?.ok_or_else(|| invalid(key, ""))
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.text(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(invalid(key, &raw)),
            },
            None => Ok(None),
        }
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_fields_means_no_edits() {
        let edits = FieldEdits::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(edits, FieldEdits::default());
    }

    #[test]
    fn sections_are_built_from_fields() {
        let edits = FieldEdits::from_lookup(lookup_from(&[
            ("AVENET_CFG_LOGS", "co2, rh,,pressure"),
            ("AVENET_CFG_WLAN_SSID", "home"),
            ("AVENET_CFG_WLAN_CONNECTION_WAIT_S", "15"),
            ("AVENET_CFG_SCD41_LOW_POWER", "on"),
        ]))
        .unwrap();

        assert_eq!(
            edits.logs,
            Some(vec!["co2".to_string(), "rh".to_string(), "pressure".to_string()])
        );
        assert_eq!(
            edits.wlan,
            Some(WlanSection {
                ssid: "home".to_string(),
                password: String::new(),
                connection_wait_s: 15,
            })
        );
        assert_eq!(
            edits.scd41,
            Some(Scd41Section {
                low_power: true,
                asc: false
            })
        );
        assert!(edits.bmp180.is_none());
    }

    #[test]
    fn bad_numbers_are_reported_with_their_field() {
        let err = FieldEdits::from_lookup(lookup_from(&[("AVENET_CFG_HISTORY_SIZE", "lots")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidField { field, value } => {
                assert_eq!(field, "AVENET_CFG_HISTORY_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let missing_freq = lookup_from(&[("AVENET_CFG_BT_NAME", "avenet42")]);
        assert!(FieldEdits::from_lookup(missing_freq).is_err());
    }

    #[test]
    fn apply_to_counts_sections() {
        let edits = FieldEdits::from_lookup(lookup_from(&[
            ("AVENET_CFG_DEBUG_LEVEL", "2"),
            ("AVENET_CFG_INFLUX_HOST", "http://influx:8086"),
        ]))
        .unwrap();
        let mut document = ConfigDocument::new();

        assert_eq!(edits.apply_to(&mut document).unwrap(), 2);
        assert_eq!(
            document.as_str(),
            r#"{"debug_level":2,"influx":{"host":"http://influx:8086","bucket":"","username":"","password":"","datapoint":""}}"#
        );
    }
}
