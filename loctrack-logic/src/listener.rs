use std::sync::Arc;

use crate::{
    location::{Location, LocationFix, Provider, ProviderStatus, StatusExtras},
    tracker::{LocationTracker, UtcDT},
};

/// Bridges one physical provider's platform callbacks to the tracker. Each
/// instance closes over its provider identity, every callback is forwarded
/// verbatim with no filtering, validation, or deduplication.
pub struct ProviderListener {
    provider: Provider,
    tracker: Arc<LocationTracker>,
}

impl ProviderListener {
    pub fn new(provider: Provider, tracker: Arc<LocationTracker>) -> Self {
        Self { provider, tracker }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The platform delivered a new fix for this listener's provider
    pub async fn on_location(
        &self,
        location: Location,
        accuracy: Option<f64>,
        time: UtcDT,
    ) {
        let fix = LocationFix {
            provider: self.provider,
            location,
            accuracy,
            time,
        };

        self.tracker.add_location(fix).await;
    }

    pub async fn on_provider_enabled(&self) {
        self.tracker.provider_enabled(self.provider).await;
    }

    pub async fn on_provider_disabled(&self) {
        self.tracker.provider_disabled(self.provider).await;
    }

    pub async fn on_status_changed(&self, status: ProviderStatus, extras: Option<StatusExtras>) {
        self.tracker
            .update_provider_status(self.provider, status, extras)
            .await;
    }
}
