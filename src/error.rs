//! Error types for the ble-receipt-printer crate.
//!
//! Each stage of the print pipeline has its own error enum so callers can
//! match on exactly the failures an operation can produce. [`Error`] wraps
//! all of them for code that just wants to propagate with `?`.

use thiserror::Error;

/// Failure while selecting a printer or opening its GATT session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The host has no usable Bluetooth adapter, or it is disabled.
    #[error("Bluetooth is not available on this system")]
    BluetoothUnavailable,

    /// The user dismissed the device picker without choosing a printer.
    #[error("User cancelled the requested device chooser")]
    Cancelled,

    /// The scan window ended without any device advertising the printer service.
    #[error("No printer advertising the printer service was found")]
    NoDeviceFound,

    /// The device was chosen but the GATT session could not be established.
    #[error("Connection failed: {reason}")]
    HandshakeFailed {
        /// Description of why the handshake failed.
        reason: String,
    },

    /// Another connect attempt is still running on this session.
    #[error("Connection already in progress")]
    InProgress,
}

/// Failure while writing encoded chunks to the printer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The session does not expose the requested service.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// The service is outside the set requested when the device was picked.
    #[error("Service not in the accessible service list: {uuid}")]
    ServiceNotAllowed {
        /// The UUID of the rejected service.
        uuid: String,
    },

    /// The service exists but has no characteristic with this UUID.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// The printer or the host stack rejected a write.
    #[error("Write rejected: {reason}")]
    WriteRejected {
        /// Description of the rejection.
        reason: String,
    },

    /// The GATT session went away before the sequence finished.
    #[error("Connection lost")]
    SessionLost,
}

/// Failure of a single print request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrintError {
    /// No open connection handle is held.
    #[error("Please connect to a Bluetooth printer first!")]
    NotConnected,

    /// The text contains nothing but whitespace.
    #[error("Please enter some text to print!")]
    EmptyInput,

    /// A print is already being written on this session.
    #[error("A print is already in progress")]
    Busy,

    /// The write sequence failed.
    #[error("Failed to print: {0}")]
    TransportFailure(#[from] WriteError),
}

impl PrintError {
    /// Whether the request was refused before any Bluetooth traffic.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NotConnected | Self::EmptyInput | Self::Busy)
    }
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Connecting to a printer failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Writing to a printer failed.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// A print request failed.
    #[error(transparent)]
    Print(#[from] PrintError),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
