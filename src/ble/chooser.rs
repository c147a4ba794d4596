//! Device picker strategies.
//!
//! After a scan, the candidates are handed to a [`DeviceChooser`] which plays
//! the role of the user picking a printer from a list. Returning `None`
//! means the user cancelled.

use crate::ble::host::DeviceCandidate;

/// Picks one printer out of the scan results.
pub trait DeviceChooser: Send + Sync {
    /// Choose a candidate, or `None` to cancel. Never called with an empty slice.
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<DeviceCandidate>;
}

impl<F> DeviceChooser for F
where
    F: Fn(&[DeviceCandidate]) -> Option<DeviceCandidate> + Send + Sync,
{
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<DeviceCandidate> {
        self(candidates)
    }
}

/// Picks the candidate with the strongest signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrongestSignal;

impl DeviceChooser for StrongestSignal {
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<DeviceCandidate> {
        candidates
            .iter()
            .max_by_key(|c| c.rssi.unwrap_or(i16::MIN))
            .cloned()
    }
}

/// Picks the first candidate whose name contains a substring (case-insensitive).
#[derive(Debug, Clone)]
pub struct NameContains(pub String);

impl DeviceChooser for NameContains {
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<DeviceCandidate> {
        let needle = self.0.to_lowercase();
        candidates
            .iter()
            .find(|c| {
                c.name
                    .as_ref()
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .cloned()
    }
}

/// Picks the candidate with a specific platform identifier.
#[derive(Debug, Clone)]
pub struct ById(pub String);

impl DeviceChooser for ById {
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<DeviceCandidate> {
        candidates.iter().find(|c| c.id == self.0).cloned()
    }
}
