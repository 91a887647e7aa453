pub mod backoff;
pub mod readout;
pub mod window;

/// Device session: acquisition, connection with backoff recovery, history
/// backfill and live notification decoding
use std::collections::HashMap;

use log::{debug, error, info, warn};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Duration, Instant};

use crate::bluetooth::decoder::{decoder_for, Decoder};
use crate::bluetooth::history::{decode_history, ByteOrder};
use crate::bluetooth::transport::{DeviceFilter, EventSender, SessionEvent, Transport};
use crate::bluetooth::uuids;
use crate::config::ClientConfig;
use crate::error::{SessionError, TransportError};
use crate::models::{Channel, Sample};

pub use backoff::{Backoff, BackoffPolicy, ReconnectFlag};
pub use readout::Readout;
pub use window::ChannelWindows;

/// What happens after the link is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Reconnecting,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Connecting,
    Connected,
    Disconnected(Recovery),
}

impl SessionState {
    /// No connection is up and none is being attempted
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Disconnected(Recovery::Idle)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not connected; nothing was written or queued
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub device_name: String,
    pub policy: BackoffPolicy,
    pub chart_x_max: usize,
    pub history_byte_order: ByteOrder,
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        SessionSettings {
            device_name: config.device_name.clone(),
            policy: BackoffPolicy::new(config.reconnect_attempts, config.reconnect_delay),
            chart_x_max: config.chart_x_max,
            history_byte_order: config.history_byte_order,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            device_name: "avenet42".to_string(),
            policy: BackoffPolicy::new(10, Duration::from_secs(5)),
            chart_x_max: 50,
            history_byte_order: ByteOrder::Little,
        }
    }
}

/// Copy of everything downstream consumers read
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: SessionState,
    pub windows: ChannelWindows,
    pub readout: Readout,
}

#[derive(Debug)]
pub enum Command {
    Connect,
    Disconnect,
    SendConfig {
        document: String,
        reply: oneshot::Sender<Result<SendOutcome, SessionError>>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Connection attempt waiting out its backoff delay
#[derive(Debug)]
struct PendingRetry {
    backoff: Backoff,
    at: Instant,
}

pub struct Session<T: Transport> {
    transport: T,
    settings: SessionSettings,
    state: SessionState,
    device: Option<T::Device>,
    /// Bumped on every acquisition so stale disconnect observers are ignored
    epoch: u64,
    reconnect: ReconnectFlag,
    pending: Option<PendingRetry>,
    history_pending: bool,
    handlers: HashMap<Channel, Decoder>,
    windows: ChannelWindows,
    readout: Readout,
    state_tx: watch::Sender<SessionState>,
    events_tx: EventSender,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    commands_rx: Option<mpsc::UnboundedReceiver<Command>>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, settings: SessionSettings) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let reconnect = ReconnectFlag::new(true);

        let handle = SessionHandle {
            commands: commands_tx,
            reconnect: reconnect.clone(),
            state: state_rx,
        };

        let session = Session {
            transport,
            windows: ChannelWindows::new(settings.chart_x_max),
            settings,
            state: SessionState::Idle,
            device: None,
            epoch: 0,
            reconnect,
            pending: None,
            history_pending: true,
            handlers: HashMap::new(),
            readout: Readout::default(),
            state_tx,
            events_tx,
            events_rx: Some(events_rx),
            commands_rx: Some(commands_rx),
        };

        (session, handle)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            windows: self.windows.clone(),
            readout: self.readout.clone(),
        }
    }

    /// Process commands, transport events and due retries until shutdown or
    /// all handles drop
    pub async fn run(mut self) {
        let (mut commands, mut events) = match (self.commands_rx.take(), self.events_rx.take()) {
            (Some(commands), Some(events)) => (commands, events),
            _ => {
                error!("Session loop already started");
                return;
            }
        };
        let reconnect = self.reconnect.clone();

        loop {
            let next_attempt = self.pending.as_ref().map(|retry| retry.at);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = events.recv() => self.handle_event(event).await,
                _ = sleep_until(next_attempt.unwrap_or_else(Instant::now)),
                    if next_attempt.is_some() => self.retry_connect().await,
                _ = reconnect.cleared(), if next_attempt.is_some() => self.cancel_retry(),
            }
        }

        info!("Session loop stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.request_connect().await,
            Command::Disconnect => {
                if let Err(e) = self.request_disconnect().await {
                    error!("Disconnect failed: {}", e);
                }
            }
            Command::SendConfig { document, reply } => {
                let result = self.send_config(&document).await;
                if let Err(e) = &result {
                    error!("Failed to send config: {}", e);
                }
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Notification { channel, value } => self.on_notification(channel, &value),
            SessionEvent::LinkLost { epoch } => self.on_link_lost(epoch).await,
        }
    }

    /// Acquire the device and make the first connection attempt
    ///
    /// Acquisition failures are logged and not retried. A failed connection
    /// attempt leaves a retry pending for [`Session::run`] to fire.
    pub async fn request_connect(&mut self) {
        if !self.state.is_idle() {
            info!("Connect requested while {:?}, ignoring", self.state);
            return;
        }

        self.reconnect.enable();
        self.set_state(SessionState::Acquiring);
        self.device = None;

        let filter = DeviceFilter {
            name: self.settings.device_name.clone(),
            service: uuids::ENVIRONMENTAL_SENSING,
        };

        let device = match self.transport.discover_device(&filter).await {
            Ok(device) => device,
            Err(e) => {
                error!("Device acquisition failed: {}", e);
                self.set_state(SessionState::Idle);
                return;
            }
        };

        self.epoch += 1;
        if let Err(e) = self
            .transport
            .watch_disconnect(&device, self.epoch, self.events_tx.clone())
            .await
        {
            warn!("Failed to watch for disconnects, link drops will go unnoticed: {}", e);
        }
        self.device = Some(device);

        self.begin_connecting().await;
    }

    /// Stop recovery and drop the link
    ///
    /// The reconnect flag is cleared before the transport is asked to disconnect,
    /// so the resulting link-lost event does not start a new connection cycle.
    pub async fn request_disconnect(&mut self) -> Result<(), SessionError> {
        self.reconnect.clear();
        self.pending = None;

        if self.state.is_idle() {
            debug!("Already disconnected");
            return Ok(());
        }

        let was_connected = self.state == SessionState::Connected;
        self.handlers.clear();
        self.set_state(SessionState::Idle);

        match (&self.device, was_connected) {
            (Some(device), true) => self.transport.disconnect(device).await?,
            _ => debug!("No link up, pending connection dropped"),
        }

        Ok(())
    }

    /// Write the serialized config document to the device, if connected
    pub async fn send_config(&mut self, document: &str) -> Result<SendOutcome, SessionError> {
        let device = match (&self.device, self.state) {
            (Some(device), SessionState::Connected) => device,
            _ => {
                info!("Not connected, config not sent");
                return Ok(SendOutcome::Skipped);
            }
        };

        let service = self
            .transport
            .service(device, uuids::ENVIRONMENTAL_SENSING)
            .await?;
        let characteristic = self.transport.characteristic(&service, uuids::CONFIG).await?;

        debug!("Sending config document: {}", document);
        self.transport
            .write(&characteristic, document.as_bytes())
            .await?;
        info!("Config document sent ({} bytes)", document.len());

        Ok(SendOutcome::Sent)
    }

    async fn begin_connecting(&mut self) {
        self.pending = None;
        self.set_state(SessionState::Connecting);
        self.attempt_connect(self.settings.policy.start()).await;
    }

    async fn retry_connect(&mut self) {
        if let Some(retry) = self.pending.take() {
            self.attempt_connect(retry.backoff).await;
        }
    }

    fn cancel_retry(&mut self) {
        if self.pending.take().is_some() {
            debug!("Reconnect disabled during backoff");
            self.set_state(SessionState::Idle);
        }
    }

    /// One connection attempt; a failure either schedules the next one or
    /// ends the cycle
    ///
    /// An attempt that is already running is never interrupted. Clearing the
    /// reconnect flag only suppresses the next one.
    async fn attempt_connect(&mut self, mut backoff: Backoff) {
        if !self.reconnect.is_enabled() {
            debug!("Reconnect disabled, dropping pending attempt");
            self.set_state(SessionState::Idle);
            return;
        }

        let device = match self.device.clone() {
            Some(device) => device,
            None => {
                self.set_state(SessionState::Idle);
                return;
            }
        };

        info!("Connecting to Bluetooth device...");
        match self.transport.connect(&device).await {
            Ok(()) => {
                info!("Bluetooth device connected");
                self.set_state(SessionState::Connected);
                if let Err(e) = self.setup_link(&device).await {
                    error!("Failed to set up sensor notifications: {}", e);
                }
            }
            Err(e) => match backoff.on_failure(&e) {
                Some(delay) => {
                    self.pending = Some(PendingRetry {
                        backoff,
                        at: Instant::now() + delay,
                    });
                }
                None => {
                    error!("Failed to reconnect: {}", e);
                    self.set_state(SessionState::Disconnected(Recovery::Idle));
                }
            },
        }
    }

    async fn setup_link(&mut self, device: &T::Device) -> Result<(), TransportError> {
        let service = self
            .transport
            .service(device, uuids::ENVIRONMENTAL_SENSING)
            .await?;

        if self.history_pending {
            if let Err(e) = self.load_history(&service).await {
                warn!("Failed to read CO2 history, will retry on next connection: {}", e);
            }
        }

        // One channel at a time, each awaited before the next
        for channel in Channel::ALL {
            let characteristic = self
                .transport
                .characteristic(&service, uuids::characteristic_for(channel))
                .await?;
            self.transport
                .subscribe(&characteristic, channel, self.events_tx.clone())
                .await?;
            self.handlers.insert(channel, decoder_for(channel));
            debug!("Subscribed to {} notifications", channel);
        }

        Ok(())
    }

    async fn load_history(&mut self, service: &T::Service) -> Result<(), TransportError> {
        let characteristic = self
            .transport
            .characteristic(service, uuids::CO2_HISTORY)
            .await?;
        let raw = self.transport.read(&characteristic).await?;
        debug!("CO2 history: {} bytes", raw.len());

        match decode_history(&raw, OffsetDateTime::now_utc(), self.settings.history_byte_order) {
            Ok(history) => {
                info!(
                    "Loaded {} CO2 history samples ({} slots, {}s interval)",
                    history.samples.len(),
                    history.slots,
                    history.interval.whole_seconds()
                );
                let window = self.windows.get_mut(Channel::Co2);
                for sample in history.samples {
                    window.push(sample);
                }
                self.history_pending = false;
            }
            Err(e) => warn!("Skipping CO2 history: {}", e),
        }

        Ok(())
    }

    fn on_notification(&mut self, channel: Channel, value: &[u8]) {
        let decode = match self.handlers.get(&channel) {
            Some(decode) => *decode,
            None => {
                debug!("Ignoring {} notification without a subscription", channel);
                return;
            }
        };

        let reading = match decode(value) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Dropping malformed {} notification {:02x?}: {}", channel, value, e);
                return;
            }
        };

        match reading.value() {
            Some(value) => self.windows.get_mut(channel).push(Sample {
                timestamp: OffsetDateTime::now_utc(),
                value,
            }),
            None => warn!("{} reading {:?} is not numeric, not charted", channel, reading),
        }

        self.readout.update(&reading);
    }

    async fn on_link_lost(&mut self, epoch: u64) {
        if epoch != self.epoch || self.state != SessionState::Connected {
            debug!("Ignoring link-lost event (epoch {}, state {:?})", epoch, self.state);
            return;
        }

        info!("Bluetooth device disconnected");
        self.handlers.clear();

        if self.reconnect.is_enabled() {
            self.set_state(SessionState::Disconnected(Recovery::Reconnecting));
            self.begin_connecting().await;
        } else {
            self.set_state(SessionState::Idle);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        let was_connected = self.state == SessionState::Connected;
        let connected = state == SessionState::Connected;
        self.state = state;

        if connected != was_connected {
            self.readout.set_connected(connected);
        }
        debug!("Session state: {:?}", state);
        self.state_tx.send_replace(state);
    }
}

/// Cloneable front end to a running [`Session`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    reconnect: ReconnectFlag,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn request_connect(&self) -> Result<(), SessionError> {
        self.send(Command::Connect)
    }

    /// Clears the reconnect flag immediately, then queues the disconnect
    ///
    /// A connection attempt or backoff wait in progress stops at its next check.
    pub fn request_disconnect(&self) -> Result<(), SessionError> {
        self.reconnect.clear();
        self.send(Command::Disconnect)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Wait for the outcome of a connect request
    ///
    /// Fails with [`SessionError::Unreachable`] when acquisition fails or the
    /// retries run out before the link comes up.
    pub async fn wait_for_connection(&mut self) -> Result<(), SessionError> {
        if *self.state.borrow_and_update() == SessionState::Connected {
            return Ok(());
        }

        loop {
            self.state
                .changed()
                .await
                .map_err(|_| SessionError::Closed)?;
            let state = *self.state.borrow_and_update();
            if state == SessionState::Connected {
                return Ok(());
            }
            if state.is_idle() {
                return Err(SessionError::Unreachable);
            }
        }
    }

    /// Wait until the session stops connecting: recovery gave up or a
    /// disconnect was requested
    pub async fn wait_for_idle(&mut self) -> Result<SessionState, SessionError> {
        self.state
            .wait_for(|state| state.is_idle())
            .await
            .map(|state| *state)
            .map_err(|_| SessionError::Closed)
    }

    pub async fn send_config(&self, document: String) -> Result<SendOutcome, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SendConfig { document, reply })?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<Snapshot, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| SessionError::Closed)
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}
