//! BLE scanning functionality.
//!
//! Provides the scanner for discovering receipt printers.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::host::DeviceCandidate;
use crate::error::{Error, Result};

/// Event emitted when a printer is discovered or updated.
#[derive(Debug, Clone)]
pub struct PrinterDiscoveryEvent {
    /// The candidate as last seen.
    pub candidate: DeviceCandidate,
    /// The peripheral handle.
    pub peripheral: Peripheral,
}

/// BLE scanner for discovering receipt printers.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Whether a scan window is currently open.
    is_scanning: Arc<RwLock<bool>>,
    /// Discovered printers by platform identifier.
    discovered: Arc<RwLock<HashMap<String, PrinterDiscoveryEvent>>>,
    /// Channel for discovery events.
    event_tx: broadcast::Sender<PrinterDiscoveryEvent>,
}

impl BleScanner {
    /// Create a new BLE scanner on the first adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            adapter,
            is_scanning: Arc::new(RwLock::new(false)),
            discovered: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Scan for printers advertising one of `filter_services`.
    ///
    /// Runs for `duration`, then returns the candidates seen, strongest
    /// signal first. Results from earlier scans are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning cannot be started.
    pub async fn scan(
        &self,
        filter_services: &[Uuid],
        duration: Duration,
    ) -> Result<Vec<DeviceCandidate>> {
        info!("Scanning {:?} for receipt printers", duration);

        self.discovered.write().clear();

        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        self.adapter
            .start_scan(ScanFilter {
                services: filter_services.to_vec(),
            })
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        // Peripherals cached by the platform from before this scan still count.
        if let Ok(peripherals) = self.adapter.peripherals().await {
            for peripheral in peripherals {
                self.process_peripheral(peripheral.id(), filter_services)
                    .await;
            }
        }

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                Some(event) = events.next() => {
                    self.handle_event(event, filter_services).await;
                }
                _ = &mut deadline => break,
            }
        }

        *self.is_scanning.write() = false;
        self.adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        let mut candidates: Vec<_> = self
            .discovered
            .read()
            .values()
            .map(|e| e.candidate.clone())
            .collect();
        candidates.sort_by_key(|c| std::cmp::Reverse(c.rssi.unwrap_or(i16::MIN)));

        debug!("Scan finished with {} candidate(s)", candidates.len());

        Ok(candidates)
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    /// Get all printers discovered by the last scan.
    pub fn discovered_printers(&self) -> HashMap<String, PrinterDiscoveryEvent> {
        self.discovered.read().clone()
    }

    /// Look up the peripheral for a discovered candidate.
    pub fn peripheral(&self, id: &str) -> Option<Peripheral> {
        self.discovered.read().get(id).map(|e| e.peripheral.clone())
    }

    /// Subscribe to discovery events.
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterDiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Handle a BLE central event.
    async fn handle_event(&self, event: CentralEvent, filter_services: &[Uuid]) {
        match event {
            CentralEvent::DeviceDiscovered(id) => {
                trace!("Device discovered: {:?}", id);
                self.process_peripheral(id, filter_services).await;
            }
            CentralEvent::DeviceUpdated(id) => {
                trace!("Device updated: {:?}", id);
                self.process_peripheral(id, filter_services).await;
            }
            CentralEvent::ServicesAdvertisement { id, services } => {
                trace!("Services advertised by {:?}: {:?}", id, services);
                self.process_peripheral(id, filter_services).await;
            }
            _ => {}
        }
    }

    /// Process a discovered peripheral.
    async fn process_peripheral(&self, id: PeripheralId, filter_services: &[Uuid]) {
        let peripheral = match self.adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        // Some platforms ignore the scan filter, so check again here.
        let is_printer = filter_services.is_empty()
            || filter_services
                .iter()
                .any(|uuid| properties.services.contains(uuid));

        if !is_printer {
            return;
        }

        let identifier = format!("{:?}", id);

        let event = PrinterDiscoveryEvent {
            candidate: DeviceCandidate {
                id: identifier.clone(),
                name: properties.local_name,
                rssi: properties.rssi,
                services: properties.services,
            },
            peripheral,
        };

        if !self.discovered.read().contains_key(&identifier) {
            debug!(
                "Discovered printer: {} ({})",
                event.candidate.display_name(),
                identifier
            );
        }

        self.discovered.write().insert(identifier, event.clone());

        let _ = self.event_tx.send(event);
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}
