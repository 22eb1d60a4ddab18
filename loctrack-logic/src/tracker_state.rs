use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    history::LocationHistory,
    location::{LocationFix, Provider, ProviderStatus, StatusExtras},
    settings::TrackerSettings,
    tracker::UtcDT,
};

/// Bookkeeping for one physical provider
#[derive(Debug, Clone)]
pub struct ProviderState {
    pub tracked: bool,
    pub status: ProviderStatus,
    pub outages: u32,
    pub total_received: u64,
    pub best_accuracy: Option<f64>,
    pub last_update: Option<UtcDT>,
    pub last_fix: Option<LocationFix>,
    pub last_extras: Option<StatusExtras>,
    pub history: LocationHistory,
}

impl ProviderState {
    fn new(capacity: usize) -> Self {
        Self {
            tracked: false,
            status: ProviderStatus::OutOfService,
            outages: 0,
            total_received: 0,
            best_accuracy: None,
            last_update: None,
            last_fix: None,
            last_extras: None,
            history: LocationHistory::new(capacity),
        }
    }

    fn record_fix(&mut self, fix: LocationFix, received: UtcDT) {
        self.last_fix = Some(fix);
        self.last_update = Some(received);
        self.total_received += 1;

        if let Some(accuracy) = fix.accuracy {
            if self.best_accuracy.is_none_or(|best| accuracy < best) {
                self.best_accuracy = Some(accuracy);
            }
        }

        self.history.push(fix);
    }

    fn as_snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            tracked: self.tracked,
            status: self.status,
            outages: self.outages,
            total_received: self.total_received,
            best_accuracy: self.best_accuracy,
            last_update: self.last_update,
            last_fix: self.last_fix,
            last_extras: self.last_extras.clone(),
            history: self.history.to_vec(),
        }
    }
}

/// The full tracking state for one session. Only [crate::LocationTracker]
/// holds one of these, everyone else sees [TrackerSnapshot]s.
#[derive(Debug, Clone)]
pub struct TrackerState {
    pub session: Uuid,
    pub started: UtcDT,
    pub last_fix: Option<LocationFix>,
    pub most_precise: Option<LocationFix>,
    pub history: LocationHistory,
    pub gps: ProviderState,
    pub network: ProviderState,
}

impl TrackerState {
    pub fn new(settings: &TrackerSettings) -> Self {
        let capacity = settings.history_capacity;
        Self {
            session: Uuid::new_v4(),
            started: Utc::now(),
            last_fix: None,
            most_precise: None,
            history: LocationHistory::new(capacity),
            gps: ProviderState::new(capacity),
            network: ProviderState::new(capacity),
        }
    }

    fn provider_mut(&mut self, provider: Provider) -> Option<&mut ProviderState> {
        match provider {
            Provider::Gps => Some(&mut self.gps),
            Provider::Network => Some(&mut self.network),
            Provider::Other => None,
        }
    }

    pub fn add_fix(&mut self, fix: LocationFix, received: UtcDT) {
        self.last_fix = Some(fix);
        self.history.push(fix);

        if let Some(state) = self.provider_mut(fix.provider) {
            state.record_fix(fix, received);
        }

        // Only fixes with a known accuracy compete, and the newest fix wins
        // on an exact tie.
        if let Some(accuracy) = fix.accuracy {
            let better = match self.most_precise.and_then(|f| f.accuracy) {
                Some(best) => accuracy <= best,
                None => true,
            };

            if better {
                self.most_precise = Some(fix);
            }
        }
    }

    pub fn provider_enabled(&mut self, provider: Provider) {
        if let Some(state) = self.provider_mut(provider) {
            state.tracked = true;
            // Enabling does not imply the provider has a fix yet
            state.status = ProviderStatus::TemporarilyUnavailable;
        }
    }

    pub fn provider_disabled(&mut self, provider: Provider) {
        if let Some(state) = self.provider_mut(provider) {
            state.tracked = false;
            state.status = ProviderStatus::OutOfService;
            state.outages += 1;
        }
    }

    pub fn update_status(
        &mut self,
        provider: Provider,
        status: ProviderStatus,
        extras: Option<StatusExtras>,
    ) {
        if let Some(state) = self.provider_mut(provider) {
            let was_tracked = state.tracked;
            state.tracked = status != ProviderStatus::OutOfService;
            state.status = status;

            if was_tracked && !state.tracked {
                state.outages += 1;
            }

            if let Some(extras) = extras {
                state.last_extras = Some(extras);
            }
        }
    }

    /// Reflect the result of a registration attempt. Does not count as an
    /// outage, this is the session layer starting or stopping, not the
    /// provider dropping out.
    pub fn set_tracked(&mut self, provider: Provider, tracked: bool) {
        if let Some(state) = self.provider_mut(provider) {
            state.tracked = tracked;
            state.status = if tracked {
                ProviderStatus::TemporarilyUnavailable
            } else {
                ProviderStatus::OutOfService
            };
        }
    }

    pub fn as_snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            session: self.session,
            started: self.started,
            last_fix: self.last_fix,
            most_precise: self.most_precise,
            history: self.history.to_vec(),
            gps: self.gps.as_snapshot(),
            network: self.network.as_snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Immutable copy of one provider's state
pub struct ProviderSnapshot {
    pub tracked: bool,
    pub status: ProviderStatus,
    /// Number of transitions into an unavailable state
    pub outages: u32,
    pub total_received: u64,
    /// Best (numerically smallest) accuracy seen so far, `None` until a fix
    /// with a known accuracy arrives
    pub best_accuracy: Option<f64>,
    /// When the last fix was received
    pub last_update: Option<UtcDT>,
    pub last_fix: Option<LocationFix>,
    /// Most recent opaque status payload, carried through untouched
    pub last_extras: Option<StatusExtras>,
    /// Most recent fixes, oldest first
    pub history: Vec<LocationFix>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Immutable copy of the full tracking state, handed to observers and
/// report generation. Holding one never blocks or aliases the tracker.
pub struct TrackerSnapshot {
    pub session: Uuid,
    pub started: UtcDT,
    pub last_fix: Option<LocationFix>,
    /// The fix with the smallest known accuracy so far, newest wins ties
    pub most_precise: Option<LocationFix>,
    /// Most recent fixes across all providers, oldest first
    pub history: Vec<LocationFix>,
    pub gps: ProviderSnapshot,
    pub network: ProviderSnapshot,
}

impl TrackerSnapshot {
    pub fn provider(&self, provider: Provider) -> Option<&ProviderSnapshot> {
        match provider {
            Provider::Gps => Some(&self.gps),
            Provider::Network => Some(&self.network),
            Provider::Other => None,
        }
    }

    pub fn location_available(&self) -> bool {
        self.last_fix.is_some()
    }

    pub fn most_precise_available(&self) -> bool {
        self.most_precise.is_some()
    }
}
