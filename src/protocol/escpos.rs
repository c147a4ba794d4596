//! ESC/POS print job encoding.
//!
//! A print job is sent as a short, fixed sequence of chunks, each written
//! to the printer as its own GATT write:
//!
//! | # | Chunk        | Bytes              |
//! |---|--------------|--------------------|
//! | 1 | Initialize   | `ESC @` (`1B 40`)  |
//! | 2 | Payload      | UTF-8 of the text  |
//! | 3 | Line feed ×N | `LF` (`0A`) each   |
//! | 4 | Cut (opt-in) | `ESC i` (`1B 69`)  |
//!
//! The payload is passed through verbatim. Control characters already in
//! the text reach the printer untouched.

use bytes::Bytes;

use crate::error::PrintError;
use crate::utils::is_blank;

/// ESC (Escape) command prefix.
pub const ESC: u8 = 0x1B;

/// LF (Line Feed): print the line buffer and advance one line.
pub const LF: u8 = 0x0A;

/// Initialize printer (`ESC @`). Resets formatting to power-on defaults.
pub const INITIALIZE: [u8; 2] = [ESC, 0x40];

/// Single line feed.
pub const LINE_FEED: [u8; 1] = [LF];

/// Cut paper (`ESC i`), honoured by printers with an auto-cutter.
pub const CUT_PAPER: [u8; 2] = [ESC, 0x69];

/// Default number of trailing line feeds, enough to clear the tear bar.
pub const DEFAULT_TRAILING_FEEDS: u8 = 3;

/// Options controlling the chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeOptions {
    /// Number of line-feed chunks after the payload.
    pub trailing_feeds: u8,
    /// Append a cut-paper chunk after the feeds.
    pub cut_paper: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            trailing_feeds: DEFAULT_TRAILING_FEEDS,
            cut_paper: false,
        }
    }
}

/// Builds the chunk sequence for a print job.
#[derive(Debug, Clone, Default)]
pub struct EscPosEncoder {
    options: EncodeOptions,
}

impl EscPosEncoder {
    /// Create an encoder with the given options.
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Get the encoder options.
    pub fn options(&self) -> EncodeOptions {
        self.options
    }

    /// Number of chunks every encoded job has.
    pub fn chunk_count(&self) -> usize {
        2 + self.options.trailing_feeds as usize + usize::from(self.options.cut_paper)
    }

    /// Encode text into its ordered chunk sequence.
    ///
    /// Empty text still produces a valid sequence with a zero-length payload.
    pub fn encode(&self, text: &str) -> Vec<Bytes> {
        let mut chunks = Vec::with_capacity(self.chunk_count());

        chunks.push(Bytes::from_static(&INITIALIZE));
        chunks.push(Bytes::copy_from_slice(text.as_bytes()));

        for _ in 0..self.options.trailing_feeds {
            chunks.push(Bytes::from_static(&LINE_FEED));
        }

        if self.options.cut_paper {
            chunks.push(Bytes::from_static(&CUT_PAPER));
        }

        chunks
    }
}

/// Encode text with the default options.
///
/// # Example
///
/// ```
/// use ble_receipt_printer::protocol::encode;
///
/// let chunks = encode("Hello");
/// assert_eq!(chunks.len(), 5);
/// assert_eq!(&chunks[0][..], &[0x1B, 0x40]);
/// assert_eq!(&chunks[1][..], b"Hello");
/// ```
pub fn encode(text: &str) -> Vec<Bytes> {
    EscPosEncoder::default().encode(text)
}

/// Text captured at the moment a print is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    text: String,
}

impl PrintJob {
    /// Create a print job.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::EmptyInput`] if the text has no non-whitespace
    /// character.
    pub fn new(text: impl Into<String>) -> std::result::Result<Self, PrintError> {
        let text = text.into();
        if is_blank(&text) {
            return Err(PrintError::EmptyInput);
        }
        Ok(Self { text })
    }

    /// The text as submitted.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Size of the text payload in bytes.
    pub fn payload_len(&self) -> usize {
        self.text.len()
    }

    /// Encode this job.
    pub fn encode(&self, encoder: &EscPosEncoder) -> Vec<Bytes> {
        encoder.encode(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn as_vecs(chunks: &[Bytes]) -> Vec<Vec<u8>> {
        chunks.iter().map(|c| c.to_vec()).collect()
    }

    #[test]
    fn test_encode_hello() {
        let chunks = encode("Hello");
        assert_eq!(
            as_vecs(&chunks),
            vec![
                vec![0x1B, 0x40],
                vec![0x48, 0x65, 0x6C, 0x6C, 0x6F],
                vec![0x0A],
                vec![0x0A],
                vec![0x0A],
            ]
        );
    }

    #[test]
    fn test_encode_utf8_payload() {
        let chunks = encode("Café ☕");
        assert_eq!(&chunks[1][..], "Café ☕".as_bytes());
    }

    #[test]
    fn test_encode_passes_control_characters_through() {
        let chunks = encode("a\x1b\x40b\n");
        assert_eq!(&chunks[1][..], &[b'a', 0x1B, 0x40, b'b', 0x0A]);
    }

    #[test]
    fn test_encode_empty_is_structurally_valid() {
        let chunks = encode("");
        assert_eq!(chunks.len(), 5);
        assert_eq!(&chunks[0][..], &INITIALIZE);
        assert!(chunks[1].is_empty());
        assert!(chunks[2..].iter().all(|c| c[..] == LINE_FEED));
    }

    #[test]
    fn test_cut_paper_is_opt_in() {
        assert!(!encode("x").iter().any(|c| c[..] == CUT_PAPER));

        let encoder = EscPosEncoder::new(EncodeOptions {
            cut_paper: true,
            ..EncodeOptions::default()
        });
        let chunks = encoder.encode("x");
        assert_eq!(chunks.len(), 6);
        assert_eq!(encoder.chunk_count(), 6);
        assert_eq!(&chunks[5][..], &CUT_PAPER);
    }

    #[test]
    fn test_trailing_feeds_configurable() {
        let encoder = EscPosEncoder::new(EncodeOptions {
            trailing_feeds: 0,
            cut_paper: false,
        });
        assert_eq!(as_vecs(&encoder.encode("x")), vec![vec![0x1B, 0x40], vec![b'x']]);
    }

    #[test]
    fn test_print_job_rejects_blank_text() {
        assert_eq!(PrintJob::new(""), Err(PrintError::EmptyInput));
        assert_eq!(PrintJob::new(" \t\r\n"), Err(PrintError::EmptyInput));

        let job = PrintJob::new("  receipt  ").unwrap();
        assert_eq!(job.text(), "  receipt  ");
        assert_eq!(job.payload_len(), 11);
    }

    proptest! {
        #[test]
        fn prop_non_blank_text_yields_five_chunks(text in "\\s*[^\\s]\\PC*") {
            let chunks = encode(&text);
            prop_assert_eq!(chunks.len(), 5);
            prop_assert_eq!(&chunks[0][..], &INITIALIZE[..]);
            prop_assert_eq!(&chunks[1][..], text.as_bytes());
            for feed in &chunks[2..] {
                prop_assert_eq!(&feed[..], &LINE_FEED[..]);
            }
        }

        #[test]
        fn prop_whitespace_job_is_rejected(text in "[ \\t\\r\\n\\u{00A0}\\u{2003}\\u{FEFF}]*") {
            prop_assert_eq!(PrintJob::new(text), Err(PrintError::EmptyInput));
        }
    }
}
