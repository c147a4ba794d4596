//! In-memory Bluetooth host for driving a `PrinterSession` without hardware.

#![allow(dead_code)]

use async_trait::async_trait;
use ble_receipt_printer::ble::characteristics::find_characteristic;
use ble_receipt_printer::ble::uuids::*;
use ble_receipt_printer::{
    BluetoothHost, ConnectError, DeviceCandidate, GattSession, RequestDeviceOptions, Result,
    WriteEndpoint, WriteError,
};
use btleplug::api::{CharPropFlags, Characteristic, Service, WriteType};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// What the device picker does.
#[derive(Clone)]
pub enum Pick {
    First,
    Cancel,
}

/// A printer whose writes are recorded.
pub struct FakeSession {
    pub device: DeviceCandidate,
    pub open: AtomicBool,
    pub writes: Mutex<Vec<Vec<u8>>>,
    pub reject_write_at: Option<usize>,
    pub write_delay: Option<Duration>,
    pub has_printer_service: bool,
    pub close_fails: bool,
    pub closes: AtomicUsize,
    pub accessible: Mutex<Vec<Uuid>>,
    dropped_tx: broadcast::Sender<()>,
}

impl FakeSession {
    pub fn new(device: DeviceCandidate) -> Self {
        let (dropped_tx, _) = broadcast::channel(4);
        Self {
            device,
            open: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            reject_write_at: None,
            write_delay: None,
            has_printer_service: true,
            close_fails: false,
            closes: AtomicUsize::new(0),
            accessible: Mutex::new(Vec::new()),
            dropped_tx,
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Simulate the printer being switched off.
    pub fn drop_link(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.dropped_tx.send(());
    }

    fn services(&self) -> BTreeSet<Service> {
        let mut services = BTreeSet::new();
        if self.has_printer_service {
            let mut characteristics = BTreeSet::new();
            characteristics.insert(Characteristic {
                uuid: PRINTER_WRITE_CHARACTERISTIC_UUID,
                service_uuid: PRINTER_SERVICE_UUID,
                properties: CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE,
                descriptors: BTreeSet::new(),
            });
            services.insert(Service {
                uuid: PRINTER_SERVICE_UUID,
                primary: true,
                characteristics,
            });
        }
        services
    }
}

#[async_trait]
impl GattSession for FakeSession {
    fn device_id(&self) -> String {
        self.device.id.clone()
    }

    fn device_name(&self) -> Option<String> {
        self.device.name.clone()
    }

    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn resolve_characteristic(
        &self,
        endpoint: &WriteEndpoint,
    ) -> std::result::Result<Characteristic, WriteError> {
        let accessible = self.accessible.lock().clone();
        find_characteristic(&self.services(), endpoint, &accessible)
    }

    async fn write_value(
        &self,
        _characteristic: &Characteristic,
        data: &[u8],
        _write_type: WriteType,
    ) -> std::result::Result<(), WriteError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        if !self.open.load(Ordering::SeqCst) {
            return Err(WriteError::SessionLost);
        }

        if self.reject_write_at == Some(self.write_count()) {
            return Err(WriteError::WriteRejected {
                reason: "GATT error 0x0E".to_string(),
            });
        }

        self.writes.lock().push(data.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        if self.close_fails {
            return Err(ble_receipt_printer::Error::Internal(
                "close failed".to_string(),
            ));
        }
        Ok(())
    }

    fn subscribe_dropped(&self) -> Option<broadcast::Receiver<()>> {
        Some(self.dropped_tx.subscribe())
    }
}

/// Host with one nearby printer.
pub struct FakeHost {
    pub available: bool,
    pub pick: Pick,
    pub open_fails: Option<String>,
    pub drops_after_open: bool,
    pub session: Arc<FakeSession>,
    pub requests: AtomicUsize,
    pub opens: AtomicUsize,
    pub last_options: Mutex<Option<RequestDeviceOptions>>,
}

impl FakeHost {
    pub fn new(session: FakeSession) -> Self {
        Self {
            available: true,
            pick: Pick::First,
            open_fails: None,
            drops_after_open: false,
            session: Arc::new(session),
            requests: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BluetoothHost for FakeHost {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn request_device(
        &self,
        options: &RequestDeviceOptions,
    ) -> std::result::Result<DeviceCandidate, ConnectError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());

        match self.pick {
            Pick::First => Ok(self.session.device.clone()),
            Pick::Cancel => Err(ConnectError::Cancelled),
        }
    }

    async fn open_session(
        &self,
        _device: &DeviceCandidate,
        accessible_services: &[Uuid],
    ) -> std::result::Result<Arc<dyn GattSession>, ConnectError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.open_fails {
            return Err(ConnectError::HandshakeFailed {
                reason: reason.clone(),
            });
        }

        *self.session.accessible.lock() = accessible_services.to_vec();
        self.session.open.store(true, Ordering::SeqCst);

        if self.drops_after_open {
            // Nobody is subscribed yet, so the notification itself is lost.
            self.session.drop_link();
        }

        Ok(self.session.clone())
    }
}

pub fn printer() -> DeviceCandidate {
    DeviceCandidate {
        id: "AA:BB:CC:DD:EE:FF".to_string(),
        name: Some("MPT-II".to_string()),
        rssi: Some(-52),
        services: vec![PRINTER_SERVICE_UUID],
    }
}

/// Wait until `condition` holds, failing the test after a second.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 1s");
}
