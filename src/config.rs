use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::bluetooth::history::ByteOrder;

const DEFAULT_DEVICE_NAME: &str = "avenet42";
const DEFAULT_SCAN_SECS: u64 = 20;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
const DEFAULT_CHART_X_MAX: usize = 50;

/// Client settings loaded from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub device_name: String,
    pub scan_duration: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub chart_x_max: usize,
    pub history_byte_order: ByteOrder,
    pub config_file: Option<PathBuf>,
    pub send_config: bool,
}

impl ClientConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the settings from any key lookup; `new` uses the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device_name = lookup("AVENET_DEVICE_NAME")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());

        let scan_secs = parse_or(&lookup, "AVENET_SCAN_SECS", DEFAULT_SCAN_SECS)?;
        let reconnect_attempts =
            parse_or(&lookup, "AVENET_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS)?;
        let reconnect_delay_secs = parse_or(
            &lookup,
            "AVENET_RECONNECT_DELAY_SECS",
            DEFAULT_RECONNECT_DELAY_SECS,
        )?;

        let chart_x_max = parse_or(&lookup, "AVENET_CHART_X_MAX", DEFAULT_CHART_X_MAX)?;
        if chart_x_max == 0 {
            return Err("AVENET_CHART_X_MAX must be greater than zero".into());
        }

        let history_byte_order = if parse_or(&lookup, "AVENET_HISTORY_BIG_ENDIAN", false)? {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        };

        let config_file = lookup("AVENET_CONFIG_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let send_config = parse_or(&lookup, "AVENET_SEND_CONFIG", false)?;

        Ok(ClientConfig {
            device_name,
            scan_duration: Duration::from_secs(scan_secs),
            reconnect_attempts,
            reconnect_delay: Duration::from_secs(reconnect_delay_secs),
            chart_x_max,
            history_byte_order,
            config_file,
            send_config,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has invalid value '{}'", key, raw).into()),
        _ => Ok(default),
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
    fn defaults_match_device_protocol() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.device_name, "avenet42");
        assert_eq!(config.reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.chart_x_max, 50);
        assert_eq!(config.history_byte_order, ByteOrder::Little);
        assert!(config.config_file.is_none());
        assert!(!config.send_config);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("AVENET_DEVICE_NAME", " kitchen "),
            ("AVENET_RECONNECT_ATTEMPTS", "3"),
            ("AVENET_HISTORY_BIG_ENDIAN", "true"),
            ("AVENET_CONFIG_FILE", "/tmp/avenet.json"),
        ]))
        .unwrap();
        assert_eq!(config.device_name, "kitchen");
        assert_eq!(config.reconnect_attempts, 3);
        assert_eq!(config.history_byte_order, ByteOrder::Big);
        assert_eq!(config.config_file, Some(PathBuf::from("/tmp/avenet.json")));
    }

    #[test]
    fn rejects_bad_numbers_and_zero_capacity() {
        assert!(ClientConfig::from_lookup(lookup_from(&[("AVENET_SCAN_SECS", "soon")])).is_err());
        assert!(ClientConfig::from_lookup(lookup_from(&[("AVENET_CHART_X_MAX", "0")])).is_err());
    }
}
