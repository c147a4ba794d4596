//! Utility functions for the ble-receipt-printer crate.

/// Check whether text has no printable content.
///
/// Text is blank when it is empty or made only of whitespace. Whitespace is
/// the ECMAScript set used by browser text fields: Unicode `White_Space`
/// without U+0085 (NEL), plus U+FEFF (BOM).
///
/// # Example
///
/// ```
/// use ble_receipt_printer::utils::is_blank;
///
/// assert!(is_blank(" \n\t"));
/// assert!(!is_blank(" a "));
/// ```
#[inline]
pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_trimmable)
}

fn is_trimmable(c: char) -> bool {
    c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{0085}')
}

/// Format bytes as space-separated uppercase hex, e.g. `1B 40`.
///
/// Used when tracing the chunks sent to a printer.
///
/// # Example
///
/// ```
/// use ble_receipt_printer::utils::hex_string;
///
/// assert_eq!(hex_string(&[0x1B, 0x40]), "1B 40");
/// ```
pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
