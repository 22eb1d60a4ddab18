use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tracker::UtcDT;

/// A "part" of a location
pub type LocationComponent = f64;

/// Opaque provider-specific payload attached to a status update. The tracker
/// records the most recent one per provider but never interprets it.
pub type StatusExtras = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A physical source of location fixes
pub enum Provider {
    /// Satellite positioning
    Gps,
    /// Cell tower / WiFi positioning
    Network,
    /// Anything else, fixes still land in the combined history but no
    /// per-provider stats are kept
    Other,
}

impl Provider {
    /// The providers the tracker keeps per-provider state for
    pub const TRACKED: [Self; 2] = [Provider::Gps, Provider::Network];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Gps => "gps",
            Provider::Network => "network",
            Provider::Other => "other",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Availability of a provider as reported by the platform
pub enum ProviderStatus {
    /// Provider is gone and won't recover without intervention
    OutOfService,
    /// Provider is enabled but has no fix yet (or lost it)
    TemporarilyUnavailable,
    /// Provider is delivering fixes
    Available,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// Some location in the world as gotten from a positioning provider
pub struct Location {
    /// Latitude
    pub lat: LocationComponent,
    /// Longitude
    pub long: LocationComponent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// A single fix as delivered by a provider
pub struct LocationFix {
    /// Which provider produced the fix
    pub provider: Provider,
    pub location: Location,
    /// Radius of uncertainty in meters, smaller is more precise. `None` when
    /// the provider did not report one, which is distinct from a (legitimate)
    /// zero reading.
    pub accuracy: Option<f64>,
    /// When the fix was produced
    pub time: UtcDT,
}
