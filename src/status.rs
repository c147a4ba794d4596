//! User-facing session status and events.

use chrono::{DateTime, Utc};

use crate::ble::connection::ConnectionState;
use crate::ble::host::FALLBACK_DEVICE_NAME;
use crate::error::{ConnectError, PrintError};

/// Status line describing the last thing the session did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Nothing has happened yet.
    #[default]
    NotConnected,
    /// Waiting for the device picker.
    RequestingDevice,
    /// A device was picked and its GATT session is opening.
    ConnectingGatt,
    /// Connected to a printer with this advertised name.
    Connected(Option<String>),
    /// The last connect failed.
    ConnectFailed(ConnectError),
    /// Disconnected on request.
    Disconnected,
    /// The link dropped without a disconnect request.
    ConnectionLost,
    /// A print is being written.
    Printing,
    /// The last print was written completely.
    PrintCompleted,
    /// The last print failed.
    PrintFailed(PrintError),
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected"),
            Self::RequestingDevice => write!(f, "Requesting Bluetooth device..."),
            Self::ConnectingGatt => write!(f, "Connecting to GATT Server..."),
            Self::Connected(name) => write!(
                f,
                "Connected to {}",
                name.as_deref().unwrap_or(FALLBACK_DEVICE_NAME)
            ),
            Self::ConnectFailed(e) => write!(f, "Error: {}", e),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::ConnectionLost => write!(f, "Connection lost"),
            Self::Printing => write!(f, "Printing..."),
            Self::PrintCompleted => write!(f, "Print completed successfully!"),
            Self::PrintFailed(PrintError::TransportFailure(e)) => write!(f, "Print error: {}", e),
            Self::PrintFailed(e) => write!(f, "Print error: {}", e),
        }
    }
}

/// Event broadcast by a [`crate::PrinterSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The state machine moved.
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
        /// When the transition happened.
        at: DateTime<Utc>,
    },
    /// The status line changed.
    Status(SessionStatus),
    /// A print failed; the UI should interrupt the user with this message.
    Alert(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteError;

    #[test]
    fn test_status_text() {
        assert_eq!(SessionStatus::default().to_string(), "Not connected");
        assert_eq!(
            SessionStatus::RequestingDevice.to_string(),
            "Requesting Bluetooth device..."
        );
        assert_eq!(
            SessionStatus::ConnectingGatt.to_string(),
            "Connecting to GATT Server..."
        );
        assert_eq!(
            SessionStatus::Connected(Some("PT-210".to_string())).to_string(),
            "Connected to PT-210"
        );
        assert_eq!(
            SessionStatus::Connected(None).to_string(),
            "Connected to Bluetooth Printer"
        );
        assert_eq!(SessionStatus::Printing.to_string(), "Printing...");
        assert_eq!(
            SessionStatus::PrintCompleted.to_string(),
            "Print completed successfully!"
        );
    }

    #[test]
    fn test_failure_text() {
        assert_eq!(
            SessionStatus::ConnectFailed(ConnectError::Cancelled).to_string(),
            "Error: User cancelled the requested device chooser"
        );
        assert_eq!(
            SessionStatus::PrintFailed(PrintError::TransportFailure(WriteError::SessionLost))
                .to_string(),
            "Print error: Connection lost"
        );
        assert_eq!(
            SessionStatus::PrintFailed(PrintError::Busy).to_string(),
            "Print error: A print is already in progress"
        );
    }
}
