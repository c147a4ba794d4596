//! Printer session.
//!
//! A [`PrinterSession`] owns the one connection a caller has to a printer
//! and drives the session state machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected --print--> Printing
//!      ^                        |                |   ^                  |
//!      +-------- failure -------+                |   +----- done -------+
//!      +--------------- disconnect / drop -------+----------- drop -----+
//! ```
//!
//! All UI affordances (`can_connect`, `can_print`, ...) derive from the
//! current state.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::ble::connection::ConnectionState;
use crate::ble::host::{BluetoothHost, DeviceCandidate, GattSession};
use crate::config::PrinterConfig;
use crate::error::{ConnectError, PrintError, Result};
use crate::orchestrator::PrintOrchestrator;
use crate::protocol::EscPosEncoder;
use crate::status::{SessionEvent, SessionStatus};
use crate::utils::is_blank;
use crate::writer::TransportWriter;

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// Reference to an open printer connection.
///
/// Clones share the open/closed flag, so a handle kept by a caller reports
/// closed once the session disconnects.
#[derive(Clone)]
pub struct ConnectionHandle {
    device: DeviceCandidate,
    session: Arc<dyn GattSession>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Wrap an open GATT session.
    pub fn new(device: DeviceCandidate, session: Arc<dyn GattSession>) -> Self {
        Self {
            device,
            session,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Platform identifier of the printer.
    pub fn id(&self) -> &str {
        &self.device.id
    }

    /// Advertised name of the printer, if any.
    pub fn name(&self) -> Option<&str> {
        self.device.name.as_deref()
    }

    /// Name for display.
    pub fn display_name(&self) -> &str {
        self.device.display_name()
    }

    /// The device as it was picked.
    pub fn device(&self) -> &DeviceCandidate {
        &self.device
    }

    /// The underlying GATT session.
    pub fn session(&self) -> &Arc<dyn GattSession> {
        &self.session
    }

    /// Whether this handle is still the session's open connection.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.device.id)
            .field("name", &self.device.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// State shared with background tasks.
struct SharedState {
    state: RwLock<ConnectionState>,
    status: RwLock<SessionStatus>,
    handle: RwLock<Option<ConnectionHandle>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SharedState {
    /// Move to `new_state` if the transition is legal.
    fn set_state(&self, new_state: ConnectionState) -> bool {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            if old == new_state {
                return false;
            }
            if !old.can_transition_to(new_state) {
                warn!("Refusing state change {} -> {}", old, new_state);
                return false;
            }
            *state = new_state;
            old
        };

        debug!("Session state changed: {} -> {}", old_state, new_state);

        let _ = self.event_tx.send(SessionEvent::StateChanged {
            from: old_state,
            to: new_state,
            at: chrono::Utc::now(),
        });

        true
    }

    /// Move from `expected` to `new_state`, doing nothing from any other state.
    fn set_state_from(&self, expected: ConnectionState, new_state: ConnectionState) -> bool {
        if *self.state.read() != expected {
            return false;
        }
        self.set_state(new_state)
    }

    fn set_status(&self, status: SessionStatus) {
        *self.status.write() = status.clone();
        let _ = self.event_tx.send(SessionEvent::Status(status));
    }

    fn alert(&self, message: String) {
        let _ = self.event_tx.send(SessionEvent::Alert(message));
    }

    /// Tear down after the platform reported the link to `id` dropped.
    fn handle_dropped(&self, id: &str) {
        let dropped = {
            let mut slot = self.handle.write();
            if slot.as_ref().map(|h| h.id() == id).unwrap_or(false) {
                slot.take()
            } else {
                None
            }
        };

        if let Some(handle) = dropped {
            warn!("Connection to {} lost", handle.display_name());
            handle.mark_closed();
            self.set_state(ConnectionState::Disconnected);
            self.set_status(SessionStatus::ConnectionLost);
        }
    }
}

/// A caller's session with at most one receipt printer.
pub struct PrinterSession {
    /// Host Bluetooth stack.
    host: Arc<dyn BluetoothHost>,
    /// Session configuration.
    config: PrinterConfig,
    /// Encoder and writer.
    orchestrator: PrintOrchestrator,
    /// State, status and handle.
    shared: Arc<SharedState>,
    /// Single permit for connect.
    connect_lock: Mutex<()>,
    /// Single permit for print.
    print_lock: Mutex<()>,
    /// Watches the open session for drops.
    watcher_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Callback ID counter.
    callback_counter: AtomicU64,
}

impl PrinterSession {
    /// Create a session on a Bluetooth host.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(host: Arc<dyn BluetoothHost>, config: PrinterConfig) -> Result<Self> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(64);

        let orchestrator = PrintOrchestrator::new(
            EscPosEncoder::new(config.encode),
            TransportWriter::new(config.endpoint, config.with_response),
        );

        Ok(Self {
            host,
            config,
            orchestrator,
            shared: Arc::new(SharedState {
                state: RwLock::new(ConnectionState::Disconnected),
                status: RwLock::new(SessionStatus::NotConnected),
                handle: RwLock::new(None),
                event_tx,
            }),
            connect_lock: Mutex::new(()),
            print_lock: Mutex::new(()),
            watcher_handle: RwLock::new(None),
            callback_counter: AtomicU64::new(0),
        })
    }

    // === State ===

    /// Get the current state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Get the current status line.
    pub fn status(&self) -> SessionStatus {
        self.shared.status.read().clone()
    }

    /// Get the open connection, if any.
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.shared.handle.read().clone()
    }

    /// Check if a printer is connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Check if a connect or print is in flight.
    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Whether the connect action should be offered.
    pub fn can_connect(&self) -> bool {
        self.state().can_connect()
    }

    /// Whether the disconnect action should be offered.
    pub fn can_disconnect(&self) -> bool {
        self.state().can_disconnect()
    }

    /// Whether printing `text` should be offered.
    pub fn can_print(&self, text: &str) -> bool {
        self.state().can_print() && !is_blank(text)
    }

    /// Get the configuration.
    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    // === Connection ===

    /// Pick a printer and connect to it.
    ///
    /// If a printer is already connected its handle is returned and no new
    /// device is requested.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] if Bluetooth is unavailable, the picker is
    /// cancelled or finds nothing, the GATT session cannot be opened, or
    /// another connect is running.
    pub async fn connect(&self) -> std::result::Result<ConnectionHandle, ConnectError> {
        let _guard = self
            .connect_lock
            .try_lock()
            .map_err(|_| ConnectError::InProgress)?;

        if let Some(handle) = self.connection() {
            debug!("Already connected to {}", handle.display_name());
            return Ok(handle);
        }

        self.shared.set_state(ConnectionState::Connecting);
        self.shared.set_status(SessionStatus::RequestingDevice);

        match self.establish().await {
            Ok(handle) => {
                info!("Connected to {}", handle.display_name());

                *self.shared.handle.write() = Some(handle.clone());
                self.shared.set_state(ConnectionState::Connected);
                self.shared
                    .set_status(SessionStatus::Connected(handle.name().map(str::to_string)));
                self.start_drop_watcher(&handle);

                Ok(handle)
            }
            Err(e) => {
                warn!("Bluetooth connection error: {}", e);

                self.shared.set_state(ConnectionState::Disconnected);
                self.shared.set_status(SessionStatus::ConnectFailed(e.clone()));

                Err(e)
            }
        }
    }

    async fn establish(&self) -> std::result::Result<ConnectionHandle, ConnectError> {
        if !self.host.is_available().await {
            return Err(ConnectError::BluetoothUnavailable);
        }

        let options = self.config.request_options();
        let device = self.host.request_device(&options).await?;

        self.shared.set_status(SessionStatus::ConnectingGatt);

        let session = self
            .host
            .open_session(&device, &options.accessible_services())
            .await?;

        Ok(ConnectionHandle::new(device, session))
    }

    /// Disconnect from the printer.
    ///
    /// The connection is forgotten and the state becomes `Disconnected` even
    /// if closing the GATT session fails; that failure is still returned.
    /// Does nothing when not connected.
    ///
    /// Also accepted while printing: the print in flight then fails with
    /// [`PrintError::TransportFailure`] and the status stays `Disconnected`.
    pub async fn disconnect(&self) -> Result<()> {
        let taken = self.shared.handle.write().take();
        let Some(handle) = taken else {
            debug!("Not connected, ignoring disconnect request");
            return Ok(());
        };

        info!("Disconnecting from {}", handle.display_name());

        self.stop_drop_watcher();
        handle.mark_closed();

        let result = handle.session().close().await;

        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.set_status(SessionStatus::Disconnected);

        if let Err(ref e) = result {
            warn!("Error closing session with {}: {}", handle.display_name(), e);
        }

        result
    }

    fn start_drop_watcher(&self, handle: &ConnectionHandle) {
        let Some(mut rx) = handle.session().subscribe_dropped() else {
            debug!("Platform cannot report dropped connections");
            return;
        };

        let shared = self.shared.clone();
        let session = handle.session().clone();
        let id = handle.id().to_string();

        let task = tokio::spawn(async move {
            // A drop reported before `rx` existed was never sent to it.
            if !session.is_open().await {
                shared.handle_dropped(&id);
                return;
            }

            match rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    shared.handle_dropped(&id);
                }
                Err(broadcast::error::RecvError::Closed) => {}
            }
        });

        if let Some(old) = self.watcher_handle.write().replace(task) {
            old.abort();
        }
    }

    fn stop_drop_watcher(&self) {
        if let Some(handle) = self.watcher_handle.write().take() {
            handle.abort();
        }
    }

    // === Printing ===

    /// Print text on the connected printer.
    ///
    /// Every failure is also broadcast as [`SessionEvent::Alert`].
    ///
    /// # Errors
    ///
    /// [`PrintError::Busy`] while another print runs, [`PrintError::NotConnected`]
    /// without a connection, [`PrintError::EmptyInput`] for blank text, and
    /// [`PrintError::TransportFailure`] when the write sequence fails.
    pub async fn print_text(&self, text: &str) -> std::result::Result<(), PrintError> {
        let result = self.run_print(text).await;

        if let Err(ref e) = result {
            self.shared.alert(e.to_string());
        }

        result
    }

    async fn run_print(&self, text: &str) -> std::result::Result<(), PrintError> {
        let _guard = self.print_lock.try_lock().map_err(|_| PrintError::Busy)?;

        let handle = self.connection();
        let (handle, job) = self.orchestrator.prepare(handle.as_ref(), text)?;

        self.shared.set_state(ConnectionState::Printing);
        self.shared.set_status(SessionStatus::Printing);

        let result = self.orchestrator.print_job(handle, &job).await;

        let still_connected = self
            .shared
            .set_state_from(ConnectionState::Printing, ConnectionState::Connected);

        if let Err(ref e) = result {
            error!("Print error: {}", e);
        }

        // A disconnect or drop during the print already set the status.
        if still_connected {
            match &result {
                Ok(()) => self.shared.set_status(SessionStatus::PrintCompleted),
                Err(e) => self.shared.set_status(SessionStatus::PrintFailed(e.clone())),
            }
        }

        result
    }

    // === Events ===

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Register a callback for state changes.
    pub fn on_state_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        self.register(move |event| {
            if let SessionEvent::StateChanged { from, to, .. } = event {
                callback(from, to);
            }
        })
    }

    /// Register a callback for status line updates.
    pub fn on_status_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        self.register(move |event| {
            if let SessionEvent::Status(status) = event {
                callback(&status);
            }
        })
    }

    /// Register a callback for alerts.
    pub fn on_alert<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.register(move |event| {
            if let SessionEvent::Alert(message) = event {
                callback(&message);
            }
        })
    }

    fn register<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.shared.event_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                callback(event);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }
}

impl Drop for PrinterSession {
    fn drop(&mut self) {
        self.stop_drop_watcher();
    }
}

impl std::fmt::Debug for PrinterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterSession")
            .field("state", &self.state())
            .field("connection", &self.connection())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_callback_handle_unregisters_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = CallbackHandle::new(7, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.id(), 7);

        handle.unregister();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_handle_unregisters_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(CallbackHandle::new(0, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_refuses_illegal_transition() {
        let (event_tx, mut rx) = broadcast::channel(8);
        let shared = SharedState {
            state: RwLock::new(ConnectionState::Disconnected),
            status: RwLock::new(SessionStatus::NotConnected),
            handle: RwLock::new(None),
            event_tx,
        };

        assert!(!shared.set_state(ConnectionState::Printing));
        assert_eq!(*shared.state.read(), ConnectionState::Disconnected);
        assert!(rx.try_recv().is_err());

        assert!(shared.set_state(ConnectionState::Connecting));
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::StateChanged {
                from: ConnectionState::Disconnected,
                to: ConnectionState::Connecting,
                ..
            })
        ));

        assert!(!shared.set_state_from(ConnectionState::Printing, ConnectionState::Connected));
        assert_eq!(*shared.state.read(), ConnectionState::Connecting);
    }
}
