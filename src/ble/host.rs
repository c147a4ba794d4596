//! Host Bluetooth platform abstraction.
//!
//! [`BluetoothHost`] covers device selection and session opening;
//! [`GattSession`] covers everything done on an open session. The crate ships
//! a btleplug implementation in [`crate::ble::platform`], and the traits let
//! tests or embedding applications substitute their own stack.

use async_trait::async_trait;
use btleplug::api::{Characteristic, WriteType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ble::uuids::*;
use crate::error::{ConnectError, Result, WriteError};

/// Name shown for printers that do not advertise one.
pub const FALLBACK_DEVICE_NAME: &str = "Bluetooth Printer";

/// Default time spent scanning before the picker is shown.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// Service and characteristic addressing the printer's data input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriteEndpoint {
    /// Service containing the characteristic.
    pub service: Uuid,
    /// Writable characteristic.
    pub characteristic: Uuid,
}

impl WriteEndpoint {
    /// Create an endpoint from a service and characteristic UUID.
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl Default for WriteEndpoint {
    fn default() -> Self {
        Self::new(PRINTER_SERVICE_UUID, PRINTER_WRITE_CHARACTERISTIC_UUID)
    }
}

impl std::fmt::Display for WriteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.characteristic)
    }
}

/// Parameters of a device request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDeviceOptions {
    /// Only devices advertising one of these services are offered.
    pub filter_services: Vec<Uuid>,
    /// Extra services the session may access even though they do not filter.
    pub optional_services: Vec<Uuid>,
    /// How long to scan for candidates.
    pub scan_duration: Duration,
}

impl RequestDeviceOptions {
    /// All services accessible on a session opened from this request.
    pub fn accessible_services(&self) -> Vec<Uuid> {
        let mut services = self.filter_services.clone();
        for uuid in &self.optional_services {
            if !services.contains(uuid) {
                services.push(*uuid);
            }
        }
        services
    }

    /// Check whether a device advertising `services` passes the filter.
    ///
    /// An empty filter accepts every device.
    pub fn matches(&self, services: &[Uuid]) -> bool {
        self.filter_services.is_empty()
            || self.filter_services.iter().any(|uuid| services.contains(uuid))
    }
}

impl Default for RequestDeviceOptions {
    fn default() -> Self {
        Self {
            filter_services: vec![PRINTER_SERVICE_UUID],
            optional_services: OPTIONAL_SERVICE_UUIDS.to_vec(),
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }
}

/// A device offered by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceCandidate {
    /// Platform identifier of the peripheral.
    pub id: String,
    /// Advertised local name.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
}

impl DeviceCandidate {
    /// Create a candidate with only an identifier and name.
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            rssi: None,
            services: Vec::new(),
        }
    }

    /// Name for display, falling back to [`FALLBACK_DEVICE_NAME`].
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(FALLBACK_DEVICE_NAME)
    }
}

/// An open GATT session with a printer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GattSession: Send + Sync {
    /// Platform identifier of the connected device.
    fn device_id(&self) -> String;

    /// Advertised name of the connected device.
    fn device_name(&self) -> Option<String>;

    /// Check whether the link is still up.
    async fn is_open(&self) -> bool;

    /// Resolve a characteristic by service and characteristic UUID.
    async fn resolve_characteristic(
        &self,
        endpoint: &WriteEndpoint,
    ) -> std::result::Result<Characteristic, WriteError>;

    /// Write a value and wait for the stack to accept it.
    async fn write_value(
        &self,
        characteristic: &Characteristic,
        data: &[u8],
        write_type: WriteType,
    ) -> std::result::Result<(), WriteError>;

    /// Close the session.
    async fn close(&self) -> Result<()>;

    /// Subscribe to notifications of the link dropping without a `close`.
    ///
    /// Returns `None` when the platform cannot report drops.
    fn subscribe_dropped(&self) -> Option<broadcast::Receiver<()>>;
}

/// The host's Bluetooth stack.
#[async_trait]
pub trait BluetoothHost: Send + Sync {
    /// Check whether Bluetooth is usable at all.
    async fn is_available(&self) -> bool;

    /// Let the user pick a device matching `options`.
    async fn request_device(
        &self,
        options: &RequestDeviceOptions,
    ) -> std::result::Result<DeviceCandidate, ConnectError>;

    /// Open a GATT session to a picked device.
    ///
    /// Only `accessible_services` may be resolved on the returned session.
    async fn open_session(
        &self,
        device: &DeviceCandidate,
        accessible_services: &[Uuid],
    ) -> std::result::Result<Arc<dyn GattSession>, ConnectError>;
}
