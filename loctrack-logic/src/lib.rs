mod history;
mod listener;
mod location;
mod report;
mod service;
mod settings;
mod tracker;
mod tracker_events;
mod tracker_state;

pub use listener::ProviderListener;
pub use location::{
    Location, LocationComponent, LocationFix, Provider, ProviderStatus, StatusExtras,
};
pub use report::{AccuracySummary, GpsStatusInfo, SatelliteInfo, TrackerReport};
pub use service::{ProviderManager, TrackingSession, UpdateRequest};
pub use settings::TrackerSettings;
pub use tracker::{LocationTracker, UtcDT};
pub use tracker_events::{TrackerEvent, TrackerObserver, spawn_observer};
pub use tracker_state::{ProviderSnapshot, TrackerSnapshot};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
