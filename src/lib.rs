// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # ble-receipt-printer
//!
//! A cross-platform Rust library for printing text on Bluetooth Low Energy
//! receipt printers using ESC/POS.
//!
//! A print is a single, best-effort sequence: initialize the printer, send
//! the text, feed the paper. There is no print queue, no retry, and no
//! partial-progress reporting.
//!
//! ## Features
//!
//! - **Printer Discovery**: Scan for printers advertising the standard printer service
//! - **Pluggable Picker**: Choose by signal strength, name, id, or your own UI
//! - **Session State Machine**: `Disconnected` / `Connecting` / `Connected` / `Printing`
//! - **Status & Alerts**: Human-readable status text and alert events for UIs
//! - **Drop Detection**: Sessions fall back to `Disconnected` when the printer goes away
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ble_receipt_printer::{BtleplugHost, PrinterConfig, PrinterSession, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = BtleplugHost::new().await?;
//!     let session = PrinterSession::new(Arc::new(host), PrinterConfig::default())?;
//!
//!     let printer = session.connect().await?;
//!     println!("{}", session.status());
//!
//!     session.print_text("Hello from Rust!").await?;
//!     println!("Printed on {}", printer.display_name());
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for configuration types

// Public modules
pub mod ble;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod status;
pub mod utils;
pub mod writer;

// Re-exports for convenience
pub use config::PrinterConfig;
pub use error::{ConnectError, Error, PrintError, Result, WriteError};
pub use orchestrator::PrintOrchestrator;
pub use session::{CallbackHandle, ConnectionHandle, PrinterSession};
pub use status::{SessionEvent, SessionStatus};
pub use writer::TransportWriter;

// Re-export commonly used types from submodules
pub use ble::{
    BluetoothHost, BtleplugHost, ConnectionState, DeviceCandidate, DeviceChooser, GattSession,
    RequestDeviceOptions, WriteEndpoint,
};
pub use protocol::{encode, EncodeOptions, EscPosEncoder, PrintJob};
