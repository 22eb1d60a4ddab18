use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use anyhow::bail;
use chrono::Utc;
use clap::Parser;
use log::info;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;

use loctrack_logic::{
    GpsStatusInfo, Location, Provider, ProviderListener, ProviderManager, ProviderStatus,
    SatelliteInfo, TrackerObserver, TrackerSettings, TrackerSnapshot, TrackingSession,
    UpdateRequest, prelude::*, spawn_observer,
};

#[derive(Parser)]
/// Drive a tracking session with synthetic GPS/network fixes and print the
/// resulting status report
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value_t = 40)]
    ticks: u32,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 250)]
    interval_ms: u64,

    /// Number of fixes each history buffer retains
    #[arg(long, default_value_t = 10)]
    capacity: usize,

    /// Disable the simulated GPS provider
    #[arg(long)]
    no_gps: bool,

    /// Disable the simulated network provider
    #[arg(long)]
    no_network: bool,

    /// Seed for the fix random walk
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Chance out of 100 that a live provider drops out on a tick
    #[arg(long, default_value_t = 4)]
    dropout_chance: u32,

    /// Skip the extended report section
    #[arg(long)]
    basic_report: bool,
}

/// Simulated platform location subsystem. Clones share state so the driver
/// can reach listeners after the session takes ownership of its copy.
#[derive(Default, Clone)]
struct SimPlatform {
    listeners: Arc<StdMutex<HashMap<Provider, Arc<ProviderListener>>>>,
}

impl SimPlatform {
    fn listener(&self, provider: Provider) -> Option<Arc<ProviderListener>> {
        self.listeners.lock().unwrap().get(&provider).cloned()
    }
}

impl ProviderManager for SimPlatform {
    fn provider_enabled(&self, _provider: Provider) -> bool {
        true
    }

    fn request_updates(
        &self,
        provider: Provider,
        _request: UpdateRequest,
        listener: ProviderListener,
    ) -> Result {
        self.listeners
            .lock()
            .unwrap()
            .insert(provider, Arc::new(listener));
        Ok(())
    }

    fn remove_updates(&self, provider: Provider) {
        self.listeners.lock().unwrap().remove(&provider);
    }

    fn gps_status(&self) -> Option<GpsStatusInfo> {
        Some(GpsStatusInfo {
            time_to_first_fix_ms: 2100,
            max_satellites: 24,
            satellites: vec![
                SatelliteInfo {
                    prn: 5,
                    snr: 33.0,
                    used_in_fix: true,
                },
                SatelliteInfo {
                    prn: 12,
                    snr: 27.5,
                    used_in_fix: true,
                },
                SatelliteInfo {
                    prn: 29,
                    snr: 14.0,
                    used_in_fix: false,
                },
            ],
        })
    }
}

/// Logs every tracker notification as it arrives
struct LogObserver;

impl TrackerObserver for LogObserver {
    fn on_location_changed(&self, snapshot: &TrackerSnapshot) -> Result {
        if let Some(fix) = &snapshot.last_fix {
            info!(
                "{} fix at ({:.5}, {:.5}), accuracy {}",
                fix.provider,
                fix.location.lat,
                fix.location.long,
                fix.accuracy
                    .map(|a| format!("{a:.1}m"))
                    .unwrap_or_else(|| "unknown".into()),
            );
        }
        Ok(())
    }

    fn on_status_changed(&self, snapshot: &TrackerSnapshot) -> Result {
        info!(
            "status changed: gps tracked={} ({:?}), net tracked={} ({:?})",
            snapshot.gps.tracked, snapshot.gps.status, snapshot.network.tracked, snapshot.network.status,
        );
        Ok(())
    }
}

/// Per-provider random walk with occasional dropouts
struct Simulation {
    rng: ChaCha8Rng,
    positions: HashMap<Provider, Location>,
    down: HashMap<Provider, bool>,
    dropout_chance: f64,
}

impl Simulation {
    const START: Location = Location {
        lat: 45.50884,
        long: -73.58781,
    };

    fn new(seed: u64, dropout_chance: u32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            positions: HashMap::new(),
            down: HashMap::new(),
            dropout_chance: dropout_chance as f64 / 100.0,
        }
    }

    fn accuracy_for(&mut self, provider: Provider) -> Option<f64> {
        // Network fixes occasionally come in with no accuracy at all
        match provider {
            Provider::Gps => Some(self.rng.random_range(3.0..15.0)),
            Provider::Network if self.rng.random_bool(0.1) => None,
            Provider::Network => Some(self.rng.random_range(20.0..80.0)),
            Provider::Other => None,
        }
    }

    async fn tick(&mut self, platform: &SimPlatform) {
        for provider in Provider::TRACKED {
            let Some(listener) = platform.listener(provider) else {
                continue;
            };

            let down = self.down.entry(provider).or_insert(false);

            if *down {
                if self.rng.random_bool(0.5) {
                    *down = false;
                    listener.on_provider_enabled().await;
                    listener
                        .on_status_changed(ProviderStatus::Available, None)
                        .await;
                }
                continue;
            }

            if self.rng.random_bool(self.dropout_chance) {
                *down = true;
                listener.on_provider_disabled().await;
                continue;
            }

            let position = self.positions.entry(provider).or_insert(Self::START);
            position.lat += self.rng.random_range(-0.0005..0.0005);
            position.long += self.rng.random_range(-0.0005..0.0005);

            let location = *position;
            let accuracy = self.accuracy_for(provider);
            listener.on_location(location, accuracy, Utc::now()).await;
        }
    }
}

#[tokio::main]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    let settings = TrackerSettings {
        use_gps: !cli.no_gps,
        use_network: !cli.no_network,
        update_interval: Duration::from_millis(cli.interval_ms),
        history_capacity: cli.capacity,
        extended_report: !cli.basic_report,
        ..Default::default()
    };

    let platform = SimPlatform::default();
    let session = TrackingSession::new(settings, platform.clone());

    if !session.start().await {
        bail!("No provider could be started");
    }

    let cancel = CancellationToken::new();
    let tracker = session.tracker();
    let observer = spawn_observer(&tracker, LogObserver, cancel.clone());

    let mut sim = Simulation::new(cli.seed, cli.dropout_chance);
    let mut interval = tokio::time::interval(Duration::from_millis(cli.interval_ms));

    for _ in 0..cli.ticks {
        interval.tick().await;
        sim.tick(&platform).await;
    }

    session.stop().await;
    cancel.cancel();
    observer.await.ok();

    println!("{}", session.report().await);

    Ok(())
}
