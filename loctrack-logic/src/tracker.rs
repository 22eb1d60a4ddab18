use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::{RwLock, broadcast};

use crate::{
    location::{LocationFix, Provider, ProviderStatus, StatusExtras},
    settings::TrackerSettings,
    tracker_events::TrackerEvent,
    tracker_state::{TrackerSnapshot, TrackerState},
};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// Slow subscribers start dropping their oldest pending events past this
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Sole owner of the tracking state for one session. Provider callbacks
/// funnel through the update methods, which serialize behind the write lock;
/// queries take the read lock and hand out [TrackerSnapshot]s, never live
/// buffers. Every mutation publishes a [TrackerEvent] to all subscribers
/// without ever waiting on them.
pub struct LocationTracker {
    state: RwLock<TrackerState>,
    events: broadcast::Sender<TrackerEvent>,
}

impl LocationTracker {
    pub fn new(settings: &TrackerSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(TrackerState::new(settings)),
            events,
        }
    }

    /// Subscribe to change notifications. A subscriber that falls behind
    /// lags and misses old events rather than blocking a mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: TrackerEvent) {
        // Send only fails when nobody is subscribed
        self.events.send(event).ok();
    }

    /// Record a new fix. The fix lands in the combined history, the
    /// per-provider state when it came from GPS or network, and the
    /// most-precise slot when it beats (or ties) the current best accuracy.
    pub async fn add_location(&self, fix: LocationFix) {
        let mut state = self.state.write().await;
        state.add_fix(fix, Utc::now());
        let snapshot = state.as_snapshot();
        drop(state);

        debug!(
            "[{}] fix from {} at ({}, {})",
            snapshot.session, fix.provider, fix.location.lat, fix.location.long
        );

        self.publish(TrackerEvent::LocationChanged(snapshot));
    }

    pub async fn provider_enabled(&self, provider: Provider) {
        let mut state = self.state.write().await;
        state.provider_enabled(provider);
        let snapshot = state.as_snapshot();
        drop(state);

        debug!("[{}] provider enabled: {provider}", snapshot.session);
        self.publish(TrackerEvent::StatusChanged(snapshot));
    }

    pub async fn provider_disabled(&self, provider: Provider) {
        let mut state = self.state.write().await;
        state.provider_disabled(provider);
        let snapshot = state.as_snapshot();
        drop(state);

        debug!("[{}] provider disabled: {provider}", snapshot.session);
        self.publish(TrackerEvent::StatusChanged(snapshot));
    }

    pub async fn update_provider_status(
        &self,
        provider: Provider,
        status: ProviderStatus,
        extras: Option<StatusExtras>,
    ) {
        let mut state = self.state.write().await;
        state.update_status(provider, status, extras);
        let snapshot = state.as_snapshot();
        drop(state);

        debug!("[{}] status of {provider} is now {status:?}", snapshot.session);
        self.publish(TrackerEvent::StatusChanged(snapshot));
    }

    /// Reflect a registration result from the session layer
    pub async fn set_tracked(&self, provider: Provider, tracked: bool) {
        let mut state = self.state.write().await;
        state.set_tracked(provider, tracked);
        let snapshot = state.as_snapshot();
        drop(state);

        self.publish(TrackerEvent::StatusChanged(snapshot));
    }

    /// Consistent read-only copy of the current state
    pub async fn snapshot(&self) -> TrackerSnapshot {
        self.state.read().await.as_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tests::{mk_fix, mk_settings};
    use tokio::test;

    #[test]
    async fn test_history_eviction_and_best_accuracy() {
        let tracker = LocationTracker::new(&mk_settings(3));

        for (i, accuracy) in [5.0, 3.0, 8.0, 2.0].into_iter().enumerate() {
            tracker
                .add_location(mk_fix(Provider::Gps, accuracy, i as f64))
                .await;
        }

        let snap = tracker.snapshot().await;

        let accuracies = snap
            .gps
            .history
            .iter()
            .map(|f| f.accuracy.expect("Fix lost its accuracy"))
            .collect::<Vec<_>>();
        assert_eq!(accuracies, vec![3.0, 8.0, 2.0], "First fix was not evicted");

        assert_eq!(snap.gps.best_accuracy, Some(2.0));
        assert_eq!(snap.gps.total_received, 4);
        assert_eq!(snap.history.len(), 3);
        assert_eq!(
            snap.most_precise.and_then(|f| f.accuracy),
            Some(2.0),
            "Most precise fix should be the 2.0m one"
        );
    }

    #[test]
    async fn test_history_length_tracks_call_count() {
        let tracker = LocationTracker::new(&mk_settings(10));

        for i in 0..4 {
            tracker
                .add_location(mk_fix(Provider::Network, 10.0, i as f64))
                .await;
            let snap = tracker.snapshot().await;
            assert_eq!(snap.history.len(), i + 1);
        }
    }

    #[test]
    async fn test_most_precise_tie_newest_wins() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker.add_location(mk_fix(Provider::Gps, 4.0, 1.0)).await;
        tracker
            .add_location(mk_fix(Provider::Network, 4.0, 2.0))
            .await;

        let snap = tracker.snapshot().await;
        let most_precise = snap.most_precise.expect("No most precise fix");
        assert_eq!(
            most_precise.location.lat, 2.0,
            "Tie on accuracy should be won by the newest fix"
        );
        assert_eq!(most_precise.provider, Provider::Network);
    }

    #[test]
    async fn test_unknown_accuracy_never_becomes_most_precise() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker.add_location(mk_fix(Provider::Gps, None, 1.0)).await;

        let snap = tracker.snapshot().await;
        assert!(snap.most_precise.is_none());
        assert!(snap.gps.best_accuracy.is_none());
        assert_eq!(snap.gps.total_received, 1, "Fix itself should still count");
        assert_eq!(snap.gps.history.len(), 1);

        tracker.add_location(mk_fix(Provider::Gps, 9.0, 2.0)).await;
        let snap = tracker.snapshot().await;
        assert_eq!(snap.most_precise.and_then(|f| f.accuracy), Some(9.0));
    }

    #[test]
    async fn test_other_provider_only_hits_combined_history() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker
            .add_location(mk_fix(Provider::Other, 7.0, 1.0))
            .await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap.history.len(), 1);
        assert!(snap.gps.history.is_empty());
        assert!(snap.network.history.is_empty());
        assert_eq!(snap.gps.total_received, 0);
        assert_eq!(
            snap.most_precise.and_then(|f| f.accuracy),
            Some(7.0),
            "Other-provider fixes still compete for most precise"
        );
    }

    #[test]
    async fn test_repeated_disable_counts_every_call() {
        let tracker = LocationTracker::new(&mk_settings(10));

        for _ in 0..3 {
            tracker.provider_disabled(Provider::Gps).await;
        }

        let snap = tracker.snapshot().await;
        assert_eq!(snap.gps.outages, 3);
        assert_eq!(
            snap.network.outages, 0,
            "GPS outages leaked into the network counter"
        );
        assert!(!snap.gps.tracked);
        assert_eq!(snap.gps.status, ProviderStatus::OutOfService);
    }

    #[test]
    async fn test_enable_then_disable() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker.provider_enabled(Provider::Gps).await;

        let snap = tracker.snapshot().await;
        assert!(snap.gps.tracked);
        assert_eq!(
            snap.gps.status,
            ProviderStatus::TemporarilyUnavailable,
            "Enabling must not jump straight to available"
        );

        tracker.provider_disabled(Provider::Gps).await;

        let snap = tracker.snapshot().await;
        assert!(!snap.gps.tracked);
        assert_eq!(snap.gps.outages, 1);
        assert_eq!(snap.gps.status, ProviderStatus::OutOfService);
    }

    #[test]
    async fn test_status_update_counts_transitions_only() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker.provider_enabled(Provider::Network).await;
        tracker
            .update_provider_status(Provider::Network, ProviderStatus::OutOfService, None)
            .await;

        let snap = tracker.snapshot().await;
        assert!(!snap.network.tracked);
        assert_eq!(snap.network.outages, 1);

        // Repeated out-of-service reports are not new outages
        tracker
            .update_provider_status(Provider::Network, ProviderStatus::OutOfService, None)
            .await;
        assert_eq!(tracker.snapshot().await.network.outages, 1);

        tracker
            .update_provider_status(Provider::Network, ProviderStatus::Available, None)
            .await;
        let snap = tracker.snapshot().await;
        assert!(snap.network.tracked);
        assert_eq!(snap.network.status, ProviderStatus::Available);

        tracker
            .update_provider_status(Provider::Network, ProviderStatus::OutOfService, None)
            .await;
        assert_eq!(tracker.snapshot().await.network.outages, 2);
    }

    #[test]
    async fn test_status_update_hits_the_right_provider() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker.provider_enabled(Provider::Gps).await;
        tracker
            .update_provider_status(Provider::Gps, ProviderStatus::OutOfService, None)
            .await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap.gps.outages, 1);
        assert_eq!(
            snap.network.outages, 0,
            "GPS going out of service must not count against network"
        );
    }

    #[test]
    async fn test_extras_recorded_untouched() {
        let tracker = LocationTracker::new(&mk_settings(10));

        let extras = serde_json::json!({ "satellites": 7 });
        tracker
            .update_provider_status(
                Provider::Gps,
                ProviderStatus::Available,
                Some(extras.clone()),
            )
            .await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap.gps.last_extras, Some(extras));

        // A status update without extras keeps the previous payload
        tracker
            .update_provider_status(Provider::Gps, ProviderStatus::TemporarilyUnavailable, None)
            .await;
        assert!(tracker.snapshot().await.gps.last_extras.is_some());
    }

    #[test]
    async fn test_events_published_per_mutation() {
        let tracker = LocationTracker::new(&mk_settings(10));
        let mut rx = tracker.subscribe();

        tracker.add_location(mk_fix(Provider::Gps, 5.0, 1.0)).await;

        match rx.recv().await.expect("No event") {
            TrackerEvent::LocationChanged(snap) => {
                assert_eq!(snap.history.len(), 1);
                assert_eq!(snap.gps.total_received, 1);
            }
            other => panic!("Expected LocationChanged, got {other:?}"),
        }

        tracker.provider_disabled(Provider::Network).await;

        match rx.recv().await.expect("No event") {
            TrackerEvent::StatusChanged(snap) => {
                assert_eq!(snap.network.outages, 1);
            }
            other => panic!("Expected StatusChanged, got {other:?}"),
        }
    }

    #[test]
    async fn test_snapshot_is_detached_from_live_state() {
        let tracker = LocationTracker::new(&mk_settings(10));

        tracker.add_location(mk_fix(Provider::Gps, 5.0, 1.0)).await;
        let before = tracker.snapshot().await;

        tracker.add_location(mk_fix(Provider::Gps, 4.0, 2.0)).await;

        assert_eq!(before.history.len(), 1, "Snapshot mutated after the fact");
        assert_eq!(tracker.snapshot().await.history.len(), 2);
    }

    #[test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_never_lose_fixes() {
        const N: usize = 64;

        let tracker = Arc::new(LocationTracker::new(&mk_settings(10)));

        let mut handles = Vec::with_capacity(N);
        for i in 0..N {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker
                    .add_location(mk_fix(Provider::Gps, (i + 1) as f64, i as f64))
                    .await;
            }));
        }

        for handle in handles {
            handle.await.expect("Writer task panicked");
        }

        let snap = tracker.snapshot().await;
        assert_eq!(snap.gps.total_received, N as u64, "A fix was lost or doubled");
        assert_eq!(snap.history.len(), 10);
        assert_eq!(snap.gps.history.len(), 10);
        assert_eq!(
            snap.most_precise.and_then(|f| f.accuracy),
            Some(1.0),
            "Best accuracy across all writers should survive"
        );
    }
}
