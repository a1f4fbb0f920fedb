//! Observation loading and sequential replay through a controller.
//!
//! Observations are `(timestamp, market_price)` rows with Unix-second
//! timestamps and decimal prices, parsed exactly into ray units.

use crate::controller::{RateController, Snapshot};
use crate::error::ControllerError;
use crate::fixed::{format_ray, parse_ray, Ray};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: u64,
    pub market_price: Ray,
}

#[derive(Debug, Deserialize)]
struct ObservationRecord {
    timestamp: u64,
    market_price: String,
}

/// What to do with an observation the controller rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidPolicy {
    /// Stop at the first rejected observation.
    #[default]
    Abort,
    /// Log it, record it, and keep going with unchanged state.
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    pub snapshots: Vec<Snapshot>,
    /// Index into the observation slice and the reason it was rejected.
    pub skipped: Vec<(usize, ControllerError)>,
}

/// Load observations from a CSV with a `timestamp,market_price` header.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>, Box<dyn std::error::Error>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut observations = Vec::new();

    for (row, result) in rdr.deserialize::<ObservationRecord>().enumerate() {
        let record = result?;
        let market_price = parse_ray(&record.market_price).ok_or_else(|| {
            format!("row {}: invalid market_price {:?}", row + 1, record.market_price)
        })?;
        observations.push(Observation {
            timestamp: record.timestamp,
            market_price,
        });
    }

    info!(path = %path.display(), rows = observations.len(), "loaded observations");
    Ok(observations)
}

/// Save observations in the same CSV layout `load_observations` reads.
pub fn save_observations(
    observations: &[Observation],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["timestamp", "market_price"])?;
    for o in observations {
        wtr.write_record(&[o.timestamp.to_string(), format_ray(o.market_price)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Feed every observation to the controller in order.
///
/// Under [`InvalidPolicy::Abort`] the first rejection is returned together
/// with its index; snapshots produced before it are dropped with the error.
pub fn replay(
    controller: &mut RateController,
    observations: &[Observation],
    policy: InvalidPolicy,
) -> Result<ReplayOutcome, (usize, ControllerError)> {
    let mut outcome = ReplayOutcome {
        snapshots: Vec::with_capacity(observations.len()),
        skipped: Vec::new(),
    };

    for (i, obs) in observations.iter().enumerate() {
        match controller.process(obs.market_price, obs.timestamp) {
            Ok(snapshot) => outcome.snapshots.push(snapshot),
            Err(e) => match policy {
                InvalidPolicy::Abort => return Err((i, e)),
                InvalidPolicy::Skip => {
                    warn!(index = i, timestamp = obs.timestamp, error = %e, "skipping observation");
                    outcome.skipped.push((i, e));
                }
            },
        }
    }

    info!(
        processed = outcome.snapshots.len(),
        skipped = outcome.skipped.len(),
        "replay complete"
    );
    Ok(outcome)
}
