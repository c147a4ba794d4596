//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy side of printing:
//! discovering printers, opening GATT sessions, and resolving the
//! characteristic print data is written to.

pub mod characteristics;
pub mod chooser;
pub mod connection;
pub mod host;
pub mod platform;
pub mod scanner;
pub mod uuids;

pub use chooser::{ById, DeviceChooser, NameContains, StrongestSignal};
pub use connection::{BtleplugSession, ConnectionState};
pub use host::{BluetoothHost, DeviceCandidate, GattSession, RequestDeviceOptions, WriteEndpoint};
pub use platform::BtleplugHost;
pub use scanner::BleScanner;
pub use uuids::*;
