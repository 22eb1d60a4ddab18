use std::sync::Arc;

use log::warn;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{prelude::*, tracker::LocationTracker, tracker_state::TrackerSnapshot};

/// A change notification from the tracker. Carries an owned snapshot so
/// subscribers never see live state.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// A new fix was recorded
    LocationChanged(TrackerSnapshot),
    /// A provider changed availability or tracking state
    StatusChanged(TrackerSnapshot),
}

impl TrackerEvent {
    pub fn snapshot(&self) -> &TrackerSnapshot {
        match self {
            Self::LocationChanged(snapshot) | Self::StatusChanged(snapshot) => snapshot,
        }
    }
}

/// Callbacks for tracker changes. A returned error is logged and the event
/// skipped, it never stops dispatch and never reaches the tracker.
pub trait TrackerObserver: Send + Sync + 'static {
    fn on_location_changed(&self, snapshot: &TrackerSnapshot) -> Result;
    fn on_status_changed(&self, snapshot: &TrackerSnapshot) -> Result;
}

impl<T: TrackerObserver> TrackerObserver for Arc<T> {
    fn on_location_changed(&self, snapshot: &TrackerSnapshot) -> Result {
        (**self).on_location_changed(snapshot)
    }

    fn on_status_changed(&self, snapshot: &TrackerSnapshot) -> Result {
        (**self).on_status_changed(snapshot)
    }
}

/// Feed `observer` from the tracker's event stream until cancelled or the
/// tracker is dropped. Each observer runs on its own task with its own
/// receiver, so one slow or failing observer cannot hold up another.
pub fn spawn_observer(
    tracker: &LocationTracker,
    observer: impl TrackerObserver,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = tracker.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                event = rx.recv() => match event {
                    Ok(event) => {
                        let res = match &event {
                            TrackerEvent::LocationChanged(snapshot) => {
                                observer.on_location_changed(snapshot)
                            }
                            TrackerEvent::StatusChanged(snapshot) => {
                                observer.on_status_changed(snapshot)
                            }
                        };

                        if let Err(why) = res {
                            warn!("Observer failed, skipping event: {why:?}");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Observer lagged behind, missed {missed} events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        location::Provider,
        tests::{FailingObserver, RecordingObserver, mk_fix, mk_settings, settle},
        tracker::LocationTracker,
    };
    use tokio::test;

    #[test]
    async fn test_observer_receives_both_event_kinds() {
        let tracker = LocationTracker::new(&mk_settings(10));
        let observer = Arc::new(RecordingObserver::default());
        let cancel = CancellationToken::new();

        spawn_observer(&tracker, observer.clone(), cancel.clone());

        tracker.add_location(mk_fix(Provider::Gps, 5.0, 1.0)).await;
        tracker.provider_disabled(Provider::Network).await;

        settle().await;

        assert_eq!(observer.location_count(), 1);
        assert_eq!(observer.status_count(), 1);

        let last = observer.last_status().expect("No status snapshot");
        assert_eq!(last.network.outages, 1);

        cancel.cancel();
    }

    #[test]
    async fn test_failing_observer_does_not_stop_others() {
        let tracker = LocationTracker::new(&mk_settings(10));
        let healthy = Arc::new(RecordingObserver::default());
        let cancel = CancellationToken::new();

        spawn_observer(&tracker, FailingObserver, cancel.clone());
        spawn_observer(&tracker, healthy.clone(), cancel.clone());

        for i in 0..3 {
            tracker.add_location(mk_fix(Provider::Gps, 5.0, i as f64)).await;
        }

        settle().await;

        assert_eq!(
            healthy.location_count(),
            3,
            "Healthy observer missed events because another one failed"
        );

        // The tracker itself is unaffected
        assert_eq!(tracker.snapshot().await.gps.total_received, 3);

        cancel.cancel();
    }

    #[test]
    async fn test_failing_observer_keeps_consuming() {
        let tracker = LocationTracker::new(&mk_settings(10));
        let cancel = CancellationToken::new();

        let handle = spawn_observer(&tracker, FailingObserver, cancel.clone());

        for i in 0..5 {
            tracker.add_location(mk_fix(Provider::Gps, 5.0, i as f64)).await;
        }

        settle().await;

        assert!(!handle.is_finished(), "Dispatch stopped after an observer error");

        cancel.cancel();
        handle.await.expect("Observer task panicked");
    }

    #[test]
    async fn test_cancel_stops_observer_task() {
        let tracker = LocationTracker::new(&mk_settings(10));
        let cancel = CancellationToken::new();

        let handle = spawn_observer(&tracker, Arc::new(RecordingObserver::default()), cancel.clone());

        cancel.cancel();
        handle.await.expect("Observer task panicked");
    }

    #[test]
    async fn test_event_snapshot_accessor() {
        let tracker = LocationTracker::new(&mk_settings(10));
        let mut rx = tracker.subscribe();

        tracker.add_location(mk_fix(Provider::Network, 3.0, 1.0)).await;

        let event = rx.recv().await.expect("No event");
        assert_eq!(event.snapshot().network.total_received, 1);
    }
}
