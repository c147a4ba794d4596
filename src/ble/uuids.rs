//! BLE Service and Characteristic UUIDs.
//!
//! Contains the identifiers used to discover receipt printers and address
//! their writable characteristic. Values must stay bit-exact; printers match
//! on them.

use uuid::Uuid;

/// Printer service advertised by common BLE receipt printers.
///
/// Used as the discovery filter and as the service holding the write
/// characteristic.
pub const PRINTER_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_18f0_0000_1000_8000_00805f9b34fb);

/// Print data characteristic UUID (Write) under [`PRINTER_SERVICE_UUID`].
pub const PRINTER_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_2af1_0000_1000_8000_00805f9b34fb);

/// Serial Port Profile UUID, exposed by printers that tunnel SPP over GATT.
pub const SERIAL_PORT_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_00805f9b34fb);

/// Vendor-specific printer service UUID.
pub const VENDOR_PRINTER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xe781_0a71_73ae_499d_8c15_faa9aef0c3f2);

/// Services that may be accessed after connecting even though they are not
/// used to filter discovery.
pub const OPTIONAL_SERVICE_UUIDS: [Uuid; 2] = [SERIAL_PORT_SERVICE_UUID, VENDOR_PRINTER_SERVICE_UUID];

/// Check if a service UUID indicates a receipt printer.
pub fn is_printer_service(uuid: &Uuid) -> bool {
    *uuid == PRINTER_SERVICE_UUID
}

/// Check if a service UUID is one of the known printer-related services.
pub fn is_known_printer_service(uuid: &Uuid) -> bool {
    is_printer_service(uuid) || OPTIONAL_SERVICE_UUIDS.contains(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_strings_are_exact() {
        assert_eq!(
            PRINTER_SERVICE_UUID.to_string(),
            "000018f0-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            PRINTER_WRITE_CHARACTERISTIC_UUID.to_string(),
            "00002af1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            SERIAL_PORT_SERVICE_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            VENDOR_PRINTER_SERVICE_UUID.to_string(),
            "e7810a71-73ae-499d-8c15-faa9aef0c3f2"
        );
    }

    #[test]
    fn test_is_printer_service() {
        assert!(is_printer_service(&PRINTER_SERVICE_UUID));
        assert!(!is_printer_service(&SERIAL_PORT_SERVICE_UUID));
        assert!(!is_printer_service(&PRINTER_WRITE_CHARACTERISTIC_UUID));
    }

    #[test]
    fn test_is_known_printer_service() {
        assert!(is_known_printer_service(&PRINTER_SERVICE_UUID));
        assert!(is_known_printer_service(&SERIAL_PORT_SERVICE_UUID));
        assert!(is_known_printer_service(&VENDOR_PRINTER_SERVICE_UUID));
        assert!(!is_known_printer_service(&Uuid::nil()));
    }
}
