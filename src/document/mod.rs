pub mod sections;

/// JSON config document pushed to the device's config characteristic
///
/// Every apply parses the current serialized document, replaces one top-level
/// section wholesale and serializes the whole document again. Sections are never
/// merged field by field.
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::ConfigError;

pub use sections::{
    BluetoothSection, Bmp180Section, FieldEdits, InfluxSection, Scd41Section, WlanSection,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    serialized: String,
}

impl ConfigDocument {
    /// An empty document: `{}`
    pub fn new() -> Self {
        ConfigDocument {
            serialized: "{}".to_string(),
        }
    }

    /// Start from existing JSON text, which must hold an object
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text)?;
        if !root.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(ConfigDocument {
            serialized: serde_json::to_string(&root)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    pub fn into_string(self) -> String {
        self.serialized
    }

    pub fn apply_debug_level(&mut self, level: i64) -> Result<(), ConfigError> {
        self.replace_section("debug_level", &level)
    }

    pub fn apply_logs(&mut self, logs: &[String]) -> Result<(), ConfigError> {
        self.replace_section("logs", &logs)
    }

    pub fn apply_history_size(&mut self, size: u32) -> Result<(), ConfigError> {
        self.replace_section("history_size", &size)
    }

    pub fn apply_wlan(&mut self, wlan: &WlanSection) -> Result<(), ConfigError> {
        self.replace_section("wlan", wlan)
    }

    pub fn apply_bluetooth(&mut self, bluetooth: &BluetoothSection) -> Result<(), ConfigError> {
        self.replace_section("bluetooth", bluetooth)
    }

    pub fn apply_scd41(&mut self, scd41: &Scd41Section) -> Result<(), ConfigError> {
        self.replace_section("scd41", scd41)
    }

    pub fn apply_bmp180(&mut self, bmp180: &Bmp180Section) -> Result<(), ConfigError> {
        self.replace_section("bmp180", bmp180)
    }

    pub fn apply_influx(&mut self, influx: &InfluxSection) -> Result<(), ConfigError> {
        self.replace_section("influx", influx)
    }

    fn replace_section<S: Serialize + ?Sized>(
        &mut self,
        key: &str,
        section: &S,
    ) -> Result<(), ConfigError> {
        let mut root: Value = serde_json::from_str(&self.serialized)?;
        let object = root.as_object_mut().ok_or(ConfigError::NotAnObject)?;
        // An existing key keeps its position
        object.insert(key.to_string(), serde_json::to_value(section)?);
        self.serialized = serde_json::to_string(&root)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wlan(password: &str) -> WlanSection {
        WlanSection {
            ssid: "X".to_string(),
            password: password.to_string(),
            connection_wait_s: 10,
        }
    }

    fn parsed(document: &ConfigDocument) -> Value {
        serde_json::from_str(document.as_str()).unwrap()
    }

    #[test]
    fn section_is_replaced_not_merged() {
        let mut document =
            ConfigDocument::from_json(r#"{"wlan":{"ssid":"old","extra":true}}"#).unwrap();

        document.apply_wlan(&wlan("first")).unwrap();
        document.apply_wlan(&wlan("second")).unwrap();

        assert_eq!(
            parsed(&document)["wlan"],
            json!({"ssid": "X", "password": "second", "connection_wait_s": 10})
        );
    }

    #[test]
    fn other_sections_and_order_survive() {
        let mut document = ConfigDocument::from_json(
            r#"{"debug_level":0,"screen":{"enabled":true},"history_size":120}"#,
        )
        .unwrap();

        document.apply_debug_level(3).unwrap();
        document
            .apply_scd41(&Scd41Section {
                low_power: true,
                asc: false,
            })
            .unwrap();

        assert_eq!(
            document.as_str(),
            r#"{"debug_level":3,"screen":{"enabled":true},"history_size":120,"scd41":{"low_power":true,"asc":false}}"#
        );
    }

    #[test]
    fn reapplying_unchanged_input_is_idempotent() {
        let bmp180 = Bmp180Section {
            upper_pressure: 110_000,
            lower_pressure: 30_000,
            oversampling: 3,
            oversampling_wlan: 1,
        };
        let mut document = ConfigDocument::new();
        document.apply_bmp180(&bmp180).unwrap();
        let once = document.clone();
        document.apply_bmp180(&bmp180).unwrap();

        assert_eq!(document, once);
    }

    #[test]
    fn logs_and_bluetooth_sections() {
        let mut document = ConfigDocument::new();
        document
            .apply_logs(&["co2".to_string(), "c".to_string()])
            .unwrap();
        document
            .apply_bluetooth(&BluetoothSection {
                name: "avenet42".to_string(),
                advertisement_freq_us: 250_000,
            })
            .unwrap();

        assert_eq!(
            parsed(&document),
            json!({
                "logs": ["co2", "c"],
                "bluetooth": {"name": "avenet42", "advertisement_freq_us": 250000}
            })
        );
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(matches!(
            ConfigDocument::from_json("[1, 2]"),
            Err(ConfigError::NotAnObject)
        ));
        assert!(matches!(
            ConfigDocument::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
