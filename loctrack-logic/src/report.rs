use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    location::LocationFix,
    tracker_state::TrackerSnapshot,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Info about a single satellite from the live GPS status query
pub struct SatelliteInfo {
    /// Pseudo-random noise id of the satellite
    pub prn: u32,
    /// Signal to noise ratio in dB
    pub snr: f32,
    /// Whether the satellite contributed to the most recent fix
    pub used_in_fix: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Live GPS subsystem status, sourced from the platform collaborator
pub struct GpsStatusInfo {
    /// Milliseconds from tracking start to the first fix
    pub time_to_first_fix_ms: u32,
    /// Maximum number of satellites the receiver can report
    pub max_satellites: u32,
    pub satellites: Vec<SatelliteInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Accuracy stats over one history buffer. Only fixes that reported an
/// accuracy count towards it.
pub struct AccuracySummary {
    /// Number of fixes with a known accuracy
    pub samples: usize,
    /// Mean accuracy in meters
    pub average: f64,
    /// Smallest accuracy in meters
    pub best: f64,
}

impl AccuracySummary {
    /// `None` when no fix in the buffer carries a usable accuracy. An empty
    /// buffer is "no data", never a zero average.
    pub fn over(fixes: &[LocationFix]) -> Option<Self> {
        let accuracies = fixes.iter().filter_map(|f| f.accuracy).collect::<Vec<_>>();

        if accuracies.is_empty() {
            return None;
        }

        let samples = accuracies.len();
        let sum = accuracies.iter().sum::<f64>();
        let best = accuracies.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            samples,
            average: sum / samples as f64,
            best,
        })
    }
}

/// A printable status report. Pure projection of a [TrackerSnapshot], never
/// touches the tracker itself.
pub struct TrackerReport {
    snapshot: TrackerSnapshot,
    extended: bool,
    gps_status: Option<GpsStatusInfo>,
}

impl TrackerReport {
    pub fn new(snapshot: TrackerSnapshot, extended: bool) -> Self {
        Self {
            snapshot,
            extended,
            gps_status: None,
        }
    }

    /// Attach a live GPS status for the extended section
    pub fn with_gps_status(mut self, status: GpsStatusInfo) -> Self {
        self.gps_status = Some(status);
        self
    }

    pub fn snapshot(&self) -> &TrackerSnapshot {
        &self.snapshot
    }

    fn fmt_accuracy(accuracy: Option<f64>) -> String {
        match accuracy {
            Some(accuracy) => format!("{accuracy:.1}m"),
            None => "unknown".to_string(),
        }
    }

    fn write_summary(f: &mut fmt::Formatter<'_>, name: &str, fixes: &[LocationFix]) -> fmt::Result {
        match AccuracySummary::over(fixes) {
            Some(summary) => {
                writeln!(f, "{name} stats over {} samples", summary.samples)?;
                writeln!(f, "{name} average accuracy : {:.1}m", summary.average)?;
                writeln!(f, "{name} best accuracy : {:.1}m", summary.best)?;
            }
            None => {
                writeln!(f, "No samples for {name}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for TrackerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.snapshot;

        writeln!(f, "------------------------")?;
        writeln!(f, " Location status report ")?;
        writeln!(f, "------------------------")?;
        writeln!(f, "GPS tracked : {}", s.gps.tracked)?;
        writeln!(f, "Net tracked : {}", s.network.tracked)?;
        writeln!(f, "Session started at : {}", s.started)?;

        if let Some(fix) = &s.gps.last_fix {
            if let Some(at) = s.gps.last_update {
                writeln!(f, "Last GPS fix received at : {at}")?;
            }
            writeln!(
                f,
                "Last GPS location : ({}, {})",
                fix.location.lat, fix.location.long
            )?;
        }

        if let Some(fix) = &s.network.last_fix {
            if let Some(at) = s.network.last_update {
                writeln!(f, "Last net fix received at : {at}")?;
            }
            writeln!(
                f,
                "Last network location : ({}, {})",
                fix.location.lat, fix.location.long
            )?;
        }

        writeln!(f, "Total GPS fixes received : {}", s.gps.total_received)?;
        writeln!(f, "Total net fixes received : {}", s.network.total_received)?;
        writeln!(
            f,
            "Best accuracy for GPS : {}",
            Self::fmt_accuracy(s.gps.best_accuracy)
        )?;
        writeln!(
            f,
            "Best accuracy for net : {}",
            Self::fmt_accuracy(s.network.best_accuracy)
        )?;
        writeln!(f, "Outages for GPS : {}", s.gps.outages)?;
        writeln!(f, "Outages for net : {}", s.network.outages)?;
        writeln!(f, "All buffer size : {}", s.history.len())?;
        writeln!(f, "GPS buffer size : {}", s.gps.history.len())?;
        writeln!(f, "Net buffer size : {}", s.network.history.len())?;

        if self.extended {
            writeln!(f, " -- Extended report -- ")?;
            Self::write_summary(f, "All providers", &s.history)?;
            Self::write_summary(f, "GPS", &s.gps.history)?;
            Self::write_summary(f, "Network", &s.network.history)?;

            match &self.gps_status {
                Some(status) => {
                    writeln!(f, "**** GPS status ****")?;
                    writeln!(f, "Time to first fix : {}ms", status.time_to_first_fix_ms)?;
                    writeln!(f, "Max GPS satellites : {}", status.max_satellites)?;
                    for sat in &status.satellites {
                        writeln!(
                            f,
                            "Satellite {} : snr {:.1} used {}",
                            sat.prn, sat.snr, sat.used_in_fix
                        )?;
                    }
                    writeln!(f, "Found {} GPS satellites", status.satellites.len())?;
                }
                None => {
                    writeln!(f, "GPS status unavailable")?;
                }
            }
        }

        Ok(())
    }
}
