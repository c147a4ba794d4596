//! Printer session configuration.

use std::time::Duration;
use uuid::Uuid;

use crate::ble::host::{RequestDeviceOptions, WriteEndpoint, DEFAULT_SCAN_DURATION};
use crate::ble::uuids::*;
use crate::error::{Error, Result};
use crate::protocol::EncodeOptions;

/// Configuration for a [`crate::PrinterSession`].
///
/// The defaults match common BLE receipt printers. Use the `with_*`
/// methods to adjust individual settings.
///
/// # Example
///
/// ```
/// use ble_receipt_printer::PrinterConfig;
/// use std::time::Duration;
///
/// let config = PrinterConfig::default()
///     .with_scan_duration(Duration::from_secs(10))
///     .with_cut_paper(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PrinterConfig {
    /// Service a device must advertise to be offered.
    pub filter_service: Uuid,
    /// Services that may be accessed without being used for filtering.
    pub optional_services: Vec<Uuid>,
    /// Characteristic print data is written to.
    pub endpoint: WriteEndpoint,
    /// How long to scan before choosing a device.
    pub scan_duration: Duration,
    /// Wait for an acknowledgement after each write.
    pub with_response: bool,
    /// Chunk sequence options.
    pub encode: EncodeOptions,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            filter_service: PRINTER_SERVICE_UUID,
            optional_services: OPTIONAL_SERVICE_UUIDS.to_vec(),
            endpoint: WriteEndpoint::default(),
            scan_duration: DEFAULT_SCAN_DURATION,
            with_response: true,
            encode: EncodeOptions::default(),
        }
    }
}

impl PrinterConfig {
    /// Set the discovery filter service.
    pub fn with_filter_service(mut self, uuid: Uuid) -> Self {
        self.filter_service = uuid;
        self
    }

    /// Set the optional service allow-list.
    pub fn with_optional_services(mut self, services: Vec<Uuid>) -> Self {
        self.optional_services = services;
        self
    }

    /// Set the write endpoint.
    pub fn with_endpoint(mut self, endpoint: WriteEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the scan duration.
    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Choose acknowledged or unacknowledged writes.
    pub fn with_response(mut self, with_response: bool) -> Self {
        self.with_response = with_response;
        self
    }

    /// Set the number of trailing line feeds.
    pub fn with_trailing_feeds(mut self, feeds: u8) -> Self {
        self.encode.trailing_feeds = feeds;
        self
    }

    /// Append a cut-paper command after each job.
    pub fn with_cut_paper(mut self, cut_paper: bool) -> Self {
        self.encode.cut_paper = cut_paper;
        self
    }

    /// Build the device request for this configuration.
    pub fn request_options(&self) -> RequestDeviceOptions {
        RequestDeviceOptions {
            filter_services: vec![self.filter_service],
            optional_services: self.optional_services.clone(),
            scan_duration: self.scan_duration,
        }
    }

    /// Check the configuration for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the scan duration is zero or the
    /// endpoint's service is neither the filter service nor optional.
    pub fn validate(&self) -> Result<()> {
        if self.scan_duration.is_zero() {
            return Err(Error::InvalidParameter {
                name: "scan_duration".to_string(),
                value: format!("{:?}", self.scan_duration),
            });
        }

        if !self
            .request_options()
            .accessible_services()
            .contains(&self.endpoint.service)
        {
            return Err(Error::InvalidParameter {
                name: "endpoint.service".to_string(),
                value: self.endpoint.service.to_string(),
            });
        }

        Ok(())
    }
}
