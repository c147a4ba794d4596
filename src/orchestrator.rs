//! Print orchestration.
//!
//! Checks a print request against its preconditions, then runs the encoder
//! and the transport writer.

use tracing::{debug, info};

use crate::error::PrintError;
use crate::protocol::{EscPosEncoder, PrintJob};
use crate::session::ConnectionHandle;
use crate::writer::TransportWriter;

/// Encoder and writer pair used to print text on a connection.
#[derive(Debug, Clone, Default)]
pub struct PrintOrchestrator {
    encoder: EscPosEncoder,
    writer: TransportWriter,
}

impl PrintOrchestrator {
    /// Create an orchestrator.
    pub fn new(encoder: EscPosEncoder, writer: TransportWriter) -> Self {
        Self { encoder, writer }
    }

    /// Get the encoder.
    pub fn encoder(&self) -> &EscPosEncoder {
        &self.encoder
    }

    /// Get the writer.
    pub fn writer(&self) -> &TransportWriter {
        &self.writer
    }

    /// Validate a request without doing any I/O.
    ///
    /// # Errors
    ///
    /// [`PrintError::NotConnected`] without an open handle, then
    /// [`PrintError::EmptyInput`] for blank text.
    pub fn prepare<'a>(
        &self,
        handle: Option<&'a ConnectionHandle>,
        text: &str,
    ) -> Result<(&'a ConnectionHandle, PrintJob), PrintError> {
        let handle = handle
            .filter(|h| h.is_open())
            .ok_or(PrintError::NotConnected)?;
        let job = PrintJob::new(text)?;
        Ok((handle, job))
    }

    /// Print text on a connection.
    ///
    /// No step is retried; a write failure is returned as
    /// [`PrintError::TransportFailure`].
    pub async fn print_text(
        &self,
        handle: Option<&ConnectionHandle>,
        text: &str,
    ) -> Result<(), PrintError> {
        let (handle, job) = self.prepare(handle, text)?;
        self.print_job(handle, &job).await
    }

    /// Encode and write an already validated job.
    pub async fn print_job(&self, handle: &ConnectionHandle, job: &PrintJob) -> Result<(), PrintError> {
        let chunks = job.encode(&self.encoder);

        debug!(
            "Printing {} byte(s) in {} chunk(s) on {}",
            job.payload_len(),
            chunks.len(),
            handle.display_name()
        );

        self.writer.write(handle.session().as_ref(), &chunks).await?;

        info!("Print completed on {}", handle.display_name());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::characteristics::tests::characteristic;
    use crate::ble::host::{DeviceCandidate, MockGattSession};
    use crate::ble::uuids::*;
    use crate::error::WriteError;
    use btleplug::api::CharPropFlags;
    use std::sync::Arc;

    fn handle_for(session: MockGattSession) -> ConnectionHandle {
        ConnectionHandle::new(
            DeviceCandidate::new("AA:BB:CC:DD:EE:FF", Some("MPT-II".to_string())),
            Arc::new(session),
        )
    }

    fn silent_session() -> MockGattSession {
        let mut session = MockGattSession::new();
        session.expect_is_open().never();
        session.expect_resolve_characteristic().never();
        session.expect_write_value().never();
        session
    }

    #[tokio::test]
    async fn test_not_connected_without_handle() {
        let orchestrator = PrintOrchestrator::default();
        assert_eq!(
            orchestrator.print_text(None, "Hello").await,
            Err(PrintError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_closed_handle_counts_as_not_connected() {
        let handle = handle_for(silent_session());
        handle.mark_closed();

        let orchestrator = PrintOrchestrator::default();
        assert_eq!(
            orchestrator.print_text(Some(&handle), "Hello").await,
            Err(PrintError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_blank_text_makes_no_transport_calls() {
        let handle = handle_for(silent_session());

        let orchestrator = PrintOrchestrator::default();
        for text in ["", " ", "\n\t  \r\n"] {
            assert_eq!(
                orchestrator.print_text(Some(&handle), text).await,
                Err(PrintError::EmptyInput)
            );
        }
    }

    #[tokio::test]
    async fn test_not_connected_checked_before_empty_input() {
        let orchestrator = PrintOrchestrator::default();
        assert_eq!(
            orchestrator.print_text(None, "   ").await,
            Err(PrintError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_transport_failure() {
        let mut session = MockGattSession::new();
        session.expect_is_open().returning(|| true);
        session.expect_resolve_characteristic().returning(|_| {
            Ok(characteristic(
                PRINTER_WRITE_CHARACTERISTIC_UUID,
                PRINTER_SERVICE_UUID,
                CharPropFlags::WRITE,
            ))
        });
        session
            .expect_write_value()
            .times(1)
            .returning(|_, _, _| Err(WriteError::SessionLost));

        let handle = handle_for(session);
        let orchestrator = PrintOrchestrator::default();
        assert_eq!(
            orchestrator.print_text(Some(&handle), "Hello").await,
            Err(PrintError::TransportFailure(WriteError::SessionLost))
        );
    }
}
