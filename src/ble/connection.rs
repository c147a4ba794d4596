//! BLE connection management.
//!
//! Holds the printer session state machine and the btleplug-backed
//! [`GattSession`] implementation.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::characteristics::{find_characteristic, write_error_from_btleplug};
use crate::ble::host::{GattSession, WriteEndpoint};
use crate::error::{ConnectError, Error, Result, WriteError};

/// Connection state for a printer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No printer connected.
    #[default]
    Disconnected,
    /// Picking a device or opening its GATT session.
    Connecting,
    /// Connected and idle.
    Connected,
    /// Writing a print job.
    Printing,
}

impl ConnectionState {
    /// Check if a printer session is open (idle or printing).
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Printing)
    }

    /// Check if an operation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::Printing)
    }

    /// Whether a connect may be started.
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Whether a disconnect may be requested.
    pub fn can_disconnect(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a print may be started.
    pub fn can_print(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    ///
    /// Dropped links take `Connected` and `Printing` straight to
    /// `Disconnected`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (*self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connected, Printing)
                | (Printing, Connected)
                | (Printing, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Printing => write!(f, "Printing"),
        }
    }
}

/// A GATT session on a btleplug peripheral.
pub struct BtleplugSession {
    /// The connected peripheral.
    peripheral: Peripheral,
    /// Advertised name at connect time.
    name: Option<String>,
    /// Services that may be resolved on this session.
    accessible_services: Vec<Uuid>,
    /// Channel for dropped-link notifications.
    dropped_tx: broadcast::Sender<()>,
    /// Handle to the adapter event watcher.
    watcher_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl BtleplugSession {
    /// Connect to a peripheral and discover its services.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::HandshakeFailed`] if the link cannot be opened.
    pub async fn open(
        adapter: &Adapter,
        peripheral: Peripheral,
        name: Option<String>,
        accessible_services: Vec<Uuid>,
    ) -> std::result::Result<Self, ConnectError> {
        if peripheral.is_connected().await.unwrap_or(false) {
            info!("Peripheral already connected at BLE level");
        } else {
            peripheral.connect().await.map_err(|e| {
                warn!("Connection attempt failed: {}", e);
                ConnectError::HandshakeFailed {
                    reason: e.to_string(),
                }
            })?;
        }

        info!("Successfully connected to printer");

        if let Err(e) = peripheral.discover_services().await {
            warn!("Failed to discover services: {}", e);
        }

        let (dropped_tx, _) = broadcast::channel(4);
        let session = Self {
            peripheral,
            name,
            accessible_services,
            dropped_tx,
            watcher_handle: RwLock::new(None),
        };
        session.start_drop_watcher(adapter).await;

        Ok(session)
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Watch adapter events for this peripheral disconnecting.
    ///
    /// The event stream is opened before returning, so a disconnect right
    /// after `open` is still seen. Receivers that subscribe after the send
    /// find the peripheral no longer connected through `is_open`.
    async fn start_drop_watcher(&self, adapter: &Adapter) {
        let mut events = match adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to get adapter events: {}", e);
                return;
            }
        };

        let id = self.peripheral.id();
        let dropped_tx = self.dropped_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(disconnected) = event {
                    if disconnected == id {
                        debug!("Device disconnected: {:?}", disconnected);
                        let _ = dropped_tx.send(());
                        break;
                    }
                }
            }

            debug!("Drop watcher ended");
        });

        *self.watcher_handle.write() = Some(handle);
    }

    fn stop_drop_watcher(&self) {
        if let Some(handle) = self.watcher_handle.write().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl GattSession for BtleplugSession {
    fn device_id(&self) -> String {
        format!("{:?}", self.peripheral.id())
    }

    fn device_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn is_open(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn resolve_characteristic(
        &self,
        endpoint: &WriteEndpoint,
    ) -> std::result::Result<Characteristic, WriteError> {
        let mut services = self.peripheral.services();

        if services.is_empty() {
            debug!("No services cached, discovering");
            self.peripheral
                .discover_services()
                .await
                .map_err(write_error_from_btleplug)?;
            services = self.peripheral.services();
        }

        find_characteristic(&services, endpoint, &self.accessible_services)
    }

    async fn write_value(
        &self,
        characteristic: &Characteristic,
        data: &[u8],
        write_type: WriteType,
    ) -> std::result::Result<(), WriteError> {
        self.peripheral
            .write(characteristic, data, write_type)
            .await
            .map_err(write_error_from_btleplug)?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            data.len(),
            characteristic.uuid
        );

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.stop_drop_watcher();

        match self.peripheral.disconnect().await {
            Ok(_) => {
                info!("Successfully disconnected from printer");
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Bluetooth(e))
            }
        }
    }

    fn subscribe_dropped(&self) -> Option<broadcast::Receiver<()>> {
        Some(self.dropped_tx.subscribe())
    }
}

impl Drop for BtleplugSession {
    fn drop(&mut self) {
        self.stop_drop_watcher();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_connection_state() {
        assert!(!Disconnected.is_connected());
        assert!(Connected.is_connected());
        assert!(Printing.is_connected());
        assert!(!Connecting.is_connected());

        assert!(Connecting.is_busy());
        assert!(Printing.is_busy());
        assert!(!Connected.is_busy());
    }

    #[test]
    fn test_affordances() {
        assert!(Disconnected.can_connect());
        assert!(!Connected.can_connect());
        assert!(!Connecting.can_connect());

        assert!(Connected.can_disconnect());
        assert!(!Disconnected.can_disconnect());

        assert!(Connected.can_print());
        assert!(!Printing.can_print());
        assert!(!Disconnected.can_print());
    }

    #[test]
    fn test_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connected.can_transition_to(Printing));
        assert!(Printing.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Printing.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Printing));
        assert!(!Connecting.can_transition_to(Printing));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", Connected), "Connected");
        assert_eq!(format!("{}", Disconnected), "Disconnected");
        assert_eq!(format!("{}", Printing), "Printing");
        assert_eq!(ConnectionState::default(), Disconnected);
    }
}
