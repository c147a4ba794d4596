//! Protocol module for building printer byte streams.
//!
//! This module contains the ESC/POS command constants and the encoder that
//! turns text into the chunk sequence written to the printer.

pub mod escpos;

pub use escpos::{encode, EncodeOptions, EscPosEncoder, PrintJob};
