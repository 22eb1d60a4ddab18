use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::{
    listener::ProviderListener,
    location::Provider,
    prelude::*,
    report::{GpsStatusInfo, TrackerReport},
    settings::TrackerSettings,
    tracker::LocationTracker,
};

/// Parameters for a provider registration
#[derive(Debug, Clone, Copy)]
pub struct UpdateRequest {
    /// Minimum time between fixes
    pub interval: Duration,
    /// Minimum distance between fixes, in meters
    pub min_distance: f64,
}

/// The platform location subsystem. Implementations register listeners with
/// the actual positioning hardware, or a simulation of it.
pub trait ProviderManager: Send + Sync {
    /// Whether the user/OS currently allows this provider
    fn provider_enabled(&self, provider: Provider) -> bool;

    /// Request fix and status callbacks on `listener`
    fn request_updates(
        &self,
        provider: Provider,
        request: UpdateRequest,
        listener: ProviderListener,
    ) -> Result;

    /// Stop callbacks for a previously registered provider
    fn remove_updates(&self, provider: Provider);

    /// Live GPS subsystem status for extended reports, when the platform
    /// exposes one
    fn gps_status(&self) -> Option<GpsStatusInfo> {
        None
    }
}

/// One tracking session: owns the tracker, wires listeners to the platform
/// through a [ProviderManager], and renders reports. Whoever owns the session
/// owns the state, there is no global tracker anywhere.
pub struct TrackingSession<M: ProviderManager> {
    tracker: Arc<LocationTracker>,
    manager: M,
    settings: TrackerSettings,
    active: Mutex<Vec<Provider>>,
}

impl<M: ProviderManager> TrackingSession<M> {
    pub fn new(settings: TrackerSettings, manager: M) -> Self {
        Self {
            tracker: Arc::new(LocationTracker::new(&settings)),
            manager,
            settings,
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn tracker(&self) -> Arc<LocationTracker> {
        self.tracker.clone()
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    fn wanted_providers(&self) -> impl Iterator<Item = Provider> {
        [
            (Provider::Gps, self.settings.use_gps),
            (Provider::Network, self.settings.use_network),
        ]
        .into_iter()
        .filter_map(|(provider, wanted)| wanted.then_some(provider))
    }

    /// Register a listener for every provider enabled in the settings.
    /// Returns whether at least one provider accepted the registration. A
    /// provider the platform reports as disabled (or that refuses the
    /// registration) is left untracked, that is a status, not an error.
    /// Calling this on a running session is ignored.
    pub async fn start(&self) -> bool {
        let mut active = self.active.lock().await;
        if !active.is_empty() {
            return true;
        }

        info!("Starting location tracking session");

        let request = UpdateRequest {
            interval: self.settings.update_interval,
            min_distance: self.settings.min_distance_meters,
        };

        for provider in self.wanted_providers() {
            let registered = if self.manager.provider_enabled(provider) {
                let listener = ProviderListener::new(provider, self.tracker.clone());
                match self.manager.request_updates(provider, request, listener) {
                    Ok(()) => true,
                    Err(why) => {
                        warn!("Failed to register {provider} listener: {why:?}");
                        false
                    }
                }
            } else {
                debug!("{provider} is disabled by the platform, not tracking");
                false
            };

            self.tracker.set_tracked(provider, registered).await;

            if registered {
                active.push(provider);
                info!("Tracking {provider}");
            }
        }

        !active.is_empty()
    }

    /// Stop all registered providers and mark both untracked. Safe to call
    /// on a stopped session.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;

        for provider in active.drain(..) {
            self.manager.remove_updates(provider);
        }

        self.tracker.set_tracked(Provider::Gps, false).await;
        self.tracker.set_tracked(Provider::Network, false).await;

        debug!("Removed all location listeners");
    }

    /// Render a report over the current state, pulling live GPS status from
    /// the platform when extended reporting is on. Read-only.
    pub async fn report(&self) -> TrackerReport {
        let snapshot = self.tracker.snapshot().await;
        let mut report = TrackerReport::new(snapshot, self.settings.extended_report);

        if self.settings.extended_report {
            if let Some(status) = self.manager.gps_status() {
                report = report.with_gps_status(status);
            }
        }

        report
    }
}
