mod bluetooth;
mod config;
mod document;
mod error;
mod models;
mod session;
mod utils;

use log::{debug, error, info, warn};
use std::env;
use time::OffsetDateTime;

use bluetooth::BluezTransport;
use config::ClientConfig;
use document::{ConfigDocument, FieldEdits};
use error::{ConfigError, SessionError};
use models::Channel;
use session::{SendOutcome, Session, SessionHandle, SessionSettings, Snapshot};
use utils::format_datetime;

/// Assemble the config document from the optional file plus `AVENET_CFG_*` edits
fn prepare_document(config: &ClientConfig) -> Result<Option<ConfigDocument>, ConfigError> {
    let edits = FieldEdits::from_lookup(|key| env::var(key).ok())?;

    let mut document = match &config.config_file {
        Some(path) => ConfigDocument::load(path)?,
        None => ConfigDocument::new(),
    };
    let applied = edits.apply_to(&mut document)?;
    debug!("Config document: {}", document.as_str());

    if !config.send_config {
        if applied > 0 || config.config_file.is_some() {
            warn!("Config document assembled but AVENET_SEND_CONFIG is not set, not sending");
        }
        return Ok(None);
    }

    info!("Config document ready ({} sections applied)", applied);
    Ok(Some(document))
}

fn log_summary(snapshot: &Snapshot) {
    info!(
        "Session summary ({:?}, {}):",
        snapshot.state,
        if snapshot.readout.connected {
            "connected"
        } else {
            "disconnected"
        }
    );
    for channel in Channel::ALL {
        let window = snapshot.windows.get(channel);
        if window.is_empty() {
            info!("  {}: no samples", channel);
            continue;
        }

        let (min, max) = window
            .values()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
                (min.min(value), max.max(value))
            });
        info!(
            "  {}: {} samples from {} to {}, range {}..{}{}",
            channel,
            window.len(),
            window.labels().next().unwrap_or("-"),
            window.labels().last().unwrap_or("-"),
            min,
            max,
            channel.unit()
        );
        if let Some(line) = snapshot.readout.line(channel) {
            info!("  latest {}", line);
        }
    }
    if let Some(elevation) = &snapshot.readout.elevation {
        info!("  {}", elevation);
    }
}

/// Push the config once connected, then stay up until recovery gives up
async fn stay_connected(
    handle: &mut SessionHandle,
    document: Option<ConfigDocument>,
) -> Result<(), SessionError> {
    handle.wait_for_connection().await?;

    if let Some(document) = document {
        if handle.is_connected() {
            match handle.send_config(document.into_string()).await {
                Ok(SendOutcome::Sent) => info!("Config pushed to device"),
                Ok(SendOutcome::Skipped) => warn!("Device disconnected, config not sent"),
                Err(e) => error!("Config push failed: {}", e),
            }
        } else {
            warn!("Link dropped before the config could be sent");
        }
    }

    let state = handle.wait_for_idle().await?;
    error!("Session stopped ({:?}), giving up", state);
    Err(SessionError::Unreachable)
}

async fn drive(
    mut handle: SessionHandle,
    document: Option<ConfigDocument>,
) -> Result<(), SessionError> {
    handle.request_connect()?;

    let outcome = tokio::select! {
        outcome = stay_connected(&mut handle, document) => outcome,
        _ = wait_for_ctrl_c() => {
            info!("Program terminated by user. Disconnecting.");
            Ok(())
        }
    };

    if let Err(e) = handle.request_disconnect() {
        error!("Failed to request disconnect: {}", e);
    }

    match handle.snapshot().await {
        Ok(snapshot) => log_summary(&snapshot),
        Err(e) => warn!("No session summary: {}", e),
    }

    if let Err(e) = handle.shutdown() {
        debug!("Session already stopped: {}", e);
    }

    outcome
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
}

async fn run_client(
    config: ClientConfig,
    document: Option<ConfigDocument>,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = BluezTransport::new(config.scan_duration).await?;
    let (session, handle) = Session::new(transport, SessionSettings::from(&config));

    info!(
        "Looking for '{}' (reconnect: {} retries from {}s)",
        config.device_name,
        config.reconnect_attempts,
        config.reconnect_delay.as_secs()
    );

    // Session loop and driver share this one task
    let ((), outcome) = tokio::join!(session.run(), drive(handle, document));
    outcome?;

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ClientConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let document = match prepare_document(&config) {
        Ok(document) => document,
        Err(e) => {
            error!("Failed to assemble config document: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Starting avenet42 client at: {}",
        format_datetime(&OffsetDateTime::now_utc())
    );

    if let Err(e) = run_client(config, document).await {
        error!("Fatal error: {}", e);
        return Err(e);
    }

    info!("Program completed successfully");
    Ok(())
}
