//! Transport writer.
//!
//! Sends an encoded chunk sequence to the printer's write characteristic,
//! one acknowledged write at a time.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::ble::characteristics::preferred_write_type;
use crate::ble::host::{GattSession, WriteEndpoint};
use crate::error::WriteError;
use crate::utils::hex_string;

/// Writes chunk sequences to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct TransportWriter {
    endpoint: WriteEndpoint,
    with_response: bool,
}

impl TransportWriter {
    /// Create a writer for an endpoint.
    ///
    /// With `with_response` set, each write waits for the printer's
    /// acknowledgement before the next is issued.
    pub fn new(endpoint: WriteEndpoint, with_response: bool) -> Self {
        Self {
            endpoint,
            with_response,
        }
    }

    /// Get the endpoint written to.
    pub fn endpoint(&self) -> &WriteEndpoint {
        &self.endpoint
    }

    /// Write every chunk in order.
    ///
    /// Stops at the first failure; nothing after it is written.
    pub async fn write(&self, session: &dyn GattSession, chunks: &[Bytes]) -> Result<(), WriteError> {
        if !session.is_open().await {
            return Err(WriteError::SessionLost);
        }

        let characteristic = session.resolve_characteristic(&self.endpoint).await?;
        let write_type = preferred_write_type(&characteristic, self.with_response);

        debug!(
            "Writing {} chunk(s) to {} ({:?})",
            chunks.len(),
            self.endpoint,
            write_type
        );

        for (index, chunk) in chunks.iter().enumerate() {
            trace!("Chunk {}: {}", index, hex_string(chunk));

            if let Err(e) = session.write_value(&characteristic, chunk, write_type).await {
                warn!("Write of chunk {} failed: {}", index, e);
                return Err(e);
            }
        }

        Ok(())
    }
}

impl Default for TransportWriter {
    fn default() -> Self {
        Self::new(WriteEndpoint::default(), true)
    }
}
