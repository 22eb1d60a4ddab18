use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Static configuration for a tracking session, read once when the session
/// starts
pub struct TrackerSettings {
    /// Listen to the GPS provider
    pub use_gps: bool,
    /// Listen to the network provider
    pub use_network: bool,
    /// Minimum time between fix callbacks requested from the platform
    pub update_interval: Duration,
    /// Minimum distance between fix callbacks, in meters
    pub min_distance_meters: f64,
    /// Number of fixes each history buffer retains before evicting the oldest
    pub history_capacity: usize,
    /// Include per-buffer accuracy summaries and live GPS status in reports
    pub extended_report: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            use_gps: true,
            use_network: true,
            update_interval: Duration::from_secs(3),
            min_distance_meters: 0.0,
            history_capacity: 10,
            extended_report: true,
        }
    }
}
