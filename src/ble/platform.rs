//! btleplug implementation of [`BluetoothHost`].

use async_trait::async_trait;
use btleplug::api::Central;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::chooser::{DeviceChooser, StrongestSignal};
use crate::ble::connection::BtleplugSession;
use crate::ble::host::{BluetoothHost, DeviceCandidate, GattSession, RequestDeviceOptions};
use crate::ble::scanner::BleScanner;
use crate::error::{ConnectError, Result};

/// Bluetooth host backed by the system adapter through btleplug.
pub struct BtleplugHost {
    /// Scanner used for device requests.
    scanner: BleScanner,
    /// Stands in for the user picking from the scan results.
    chooser: Arc<dyn DeviceChooser>,
}

impl BtleplugHost {
    /// Create a host on the first Bluetooth adapter.
    ///
    /// Devices are picked by strongest signal until a different chooser is
    /// set with [`BtleplugHost::with_chooser`].
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        Ok(Self {
            scanner: BleScanner::new().await?,
            chooser: Arc::new(StrongestSignal),
        })
    }

    /// Replace the device chooser.
    pub fn with_chooser(mut self, chooser: impl DeviceChooser + 'static) -> Self {
        self.chooser = Arc::new(chooser);
        self
    }

    /// Get the scanner.
    pub fn scanner(&self) -> &BleScanner {
        &self.scanner
    }
}

#[async_trait]
impl BluetoothHost for BtleplugHost {
    async fn is_available(&self) -> bool {
        self.scanner.adapter().adapter_info().await.is_ok()
    }

    async fn request_device(
        &self,
        options: &RequestDeviceOptions,
    ) -> std::result::Result<DeviceCandidate, ConnectError> {
        let candidates = self
            .scanner
            .scan(&options.filter_services, options.scan_duration)
            .await
            .map_err(|e| {
                warn!("Scan failed: {}", e);
                ConnectError::BluetoothUnavailable
            })?;

        if candidates.is_empty() {
            return Err(ConnectError::NoDeviceFound);
        }

        let chosen = self.chooser.choose(&candidates).ok_or_else(|| {
            info!("Device picker cancelled");
            ConnectError::Cancelled
        })?;

        debug!("Picked {} ({})", chosen.display_name(), chosen.id);

        Ok(chosen)
    }

    async fn open_session(
        &self,
        device: &DeviceCandidate,
        accessible_services: &[Uuid],
    ) -> std::result::Result<Arc<dyn GattSession>, ConnectError> {
        let peripheral =
            self.scanner
                .peripheral(&device.id)
                .ok_or_else(|| ConnectError::HandshakeFailed {
                    reason: format!("device {} is no longer known to the adapter", device.id),
                })?;

        let session = BtleplugSession::open(
            self.scanner.adapter(),
            peripheral,
            device.name.clone(),
            accessible_services.to_vec(),
        )
        .await?;

        Ok(Arc::new(session))
    }
}
