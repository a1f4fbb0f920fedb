use crate::controller::Snapshot;
use crate::fixed::{annualized_pct, format_ray, ray_to_f64, Ray};
use crate::sweep::SweepResult;
use chrono::DateTime;
use serde::Serialize;
use std::path::Path;

/// Summary statistics for a replay.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetrics {
    pub ticks: usize,
    pub first_timestamp: u64,
    pub last_timestamp: u64,
    /// Mean |market - redemption| / redemption across ticks
    pub mean_abs_deviation: f64,
    pub max_abs_deviation: f64,
    pub ticks_at_lower_bound: usize,
    pub ticks_at_upper_bound: usize,
    pub final_redemption_price: String,
    pub final_redemption_rate: String,
    pub final_rate_annualized_pct: f64,
}

/// Relative gap between market and redemption price for one snapshot.
pub fn abs_deviation(s: &Snapshot) -> f64 {
    let rp = ray_to_f64(s.redemption_price);
    ((ray_to_f64(s.market_price) - rp) / rp).abs()
}

pub fn compute_summary(snapshots: &[Snapshot], lower_bound: Ray, upper_bound: Ray) -> SummaryMetrics {
    let Some(last) = snapshots.last() else {
        return SummaryMetrics {
            ticks: 0,
            first_timestamp: 0,
            last_timestamp: 0,
            mean_abs_deviation: 0.0,
            max_abs_deviation: 0.0,
            ticks_at_lower_bound: 0,
            ticks_at_upper_bound: 0,
            final_redemption_price: "0".to_string(),
            final_redemption_rate: "0".to_string(),
            final_rate_annualized_pct: 0.0,
        };
    };

    let n = snapshots.len() as f64;
    let deviations: Vec<f64> = snapshots.iter().map(abs_deviation).collect();

    SummaryMetrics {
        ticks: snapshots.len(),
        first_timestamp: snapshots[0].timestamp,
        last_timestamp: last.timestamp,
        mean_abs_deviation: deviations.iter().sum::<f64>() / n,
        max_abs_deviation: deviations.iter().cloned().fold(0.0, f64::max),
        ticks_at_lower_bound: snapshots
            .iter()
            .filter(|s| s.redemption_rate == lower_bound)
            .count(),
        ticks_at_upper_bound: snapshots
            .iter()
            .filter(|s| s.redemption_rate == upper_bound)
            .count(),
        final_redemption_price: format_ray(last.redemption_price),
        final_redemption_rate: last.redemption_rate.to_string(),
        final_rate_annualized_pct: annualized_pct(last.redemption_rate),
    }
}

fn rfc3339(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Save per-tick snapshots. Rates stay raw ray integers so values can be
/// diffed bit-for-bit; prices are written as exact decimals.
pub fn save_snapshots_csv(
    snapshots: &[Snapshot],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let wtr = csv::Writer::from_path(path)?;
    write_snapshots(snapshots, wtr)
}

/// Same layout as [`save_snapshots_csv`], to any writer (stdout in the CLI).
pub fn write_snapshots<W: std::io::Write>(
    snapshots: &[Snapshot],
    mut wtr: csv::Writer<W>,
) -> Result<(), Box<dyn std::error::Error>> {
    wtr.write_record([
        "timestamp",
        "datetime",
        "redemption_rate",
        "kp_rate",
        "ki_rate",
        "redemption_price",
        "market_price",
    ])?;

    for s in snapshots {
        wtr.write_record(&[
            s.timestamp.to_string(),
            rfc3339(s.timestamp),
            s.redemption_rate.to_string(),
            s.kp_rate.to_string(),
            s.ki_rate.to_string(),
            format_ray(s.redemption_price),
            format_ray(s.market_price),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn save_summary_json(
    summary: &SummaryMetrics,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}

/// Save sweep results to CSV, best first as given.
pub fn save_sweep_results(
    results: &[SweepResult],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "kp",
        "ki",
        "mean_abs_deviation",
        "max_abs_deviation",
        "ticks_at_bounds",
        "final_redemption_price",
        "error",
    ])?;

    for r in results {
        match &r.summary {
            Ok(summary) => wtr.write_record(&[
                r.kp.clone(),
                r.ki.clone(),
                format!("{:.9}", summary.mean_abs_deviation),
                format!("{:.9}", summary.max_abs_deviation),
                (summary.ticks_at_lower_bound + summary.ticks_at_upper_bound).to_string(),
                summary.final_redemption_price.clone(),
                String::new(),
            ])?,
            Err(e) => wtr.write_record(&[
                r.kp.clone(),
                r.ki.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                e.clone(),
            ])?,
        }
    }

    wtr.flush()?;
    Ok(())
}
