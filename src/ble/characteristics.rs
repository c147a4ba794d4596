//! GATT characteristic handling.
//!
//! Resolves the printer's write characteristic from a peripheral's
//! discovered services and maps btleplug failures onto [`WriteError`].

use btleplug::api::{CharPropFlags, Characteristic, Service, WriteType};
use std::collections::BTreeSet;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::ble::host::WriteEndpoint;
use crate::error::WriteError;

/// Find the characteristic addressed by `endpoint` among discovered services.
///
/// The service must be in `accessible_services`, exist on the device, and
/// contain a writable characteristic with the endpoint's UUID.
pub fn find_characteristic(
    services: &BTreeSet<Service>,
    endpoint: &WriteEndpoint,
    accessible_services: &[Uuid],
) -> Result<Characteristic, WriteError> {
    if !accessible_services.contains(&endpoint.service) {
        return Err(WriteError::ServiceNotAllowed {
            uuid: endpoint.service.to_string(),
        });
    }

    let service = services
        .iter()
        .find(|s| s.uuid == endpoint.service)
        .ok_or_else(|| {
            debug!("Service {} NOT found in discovered services", endpoint.service);
            for s in services {
                trace!("  Available service: {}", s.uuid);
            }
            WriteError::ServiceNotFound {
                uuid: endpoint.service.to_string(),
            }
        })?;

    let characteristic = service
        .characteristics
        .iter()
        .find(|c| c.uuid == endpoint.characteristic)
        .cloned()
        .ok_or_else(|| WriteError::CharacteristicNotFound {
            uuid: endpoint.characteristic.to_string(),
        })?;

    debug!(
        "Found characteristic {}, properties: {:?}",
        characteristic.uuid, characteristic.properties
    );

    if !is_writable(&characteristic) {
        return Err(WriteError::WriteRejected {
            reason: format!("characteristic {} is not writable", characteristic.uuid),
        });
    }

    Ok(characteristic)
}

/// Check if a characteristic accepts writes of either kind.
pub fn is_writable(characteristic: &Characteristic) -> bool {
    characteristic
        .properties
        .intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE)
}

/// Pick the write type for a characteristic.
///
/// Acknowledged writes are used whenever requested and supported; a
/// characteristic that only supports unacknowledged writes gets those.
pub fn preferred_write_type(characteristic: &Characteristic, with_response: bool) -> WriteType {
    let props = characteristic.properties;
    if with_response && props.contains(CharPropFlags::WRITE) {
        WriteType::WithResponse
    } else if props.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

/// Map a btleplug error raised during a write.
pub fn write_error_from_btleplug(error: btleplug::Error) -> WriteError {
    match error {
        btleplug::Error::NotConnected | btleplug::Error::DeviceNotFound => WriteError::SessionLost,
        btleplug::Error::NoSuchCharacteristic => WriteError::CharacteristicNotFound {
            uuid: "unknown".to_string(),
        },
        other => WriteError::WriteRejected {
            reason: other.to_string(),
        },
    }
}
