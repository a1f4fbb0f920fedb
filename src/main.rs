use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;

use rai_sim::config::ControllerConfig;
use rai_sim::fixed::{annualized_pct, format_ray};
use rai_sim::logging::{init_logging, LogFormat};
use rai_sim::output;
use rai_sim::replay::{self, InvalidPolicy};
use rai_sim::sweep::GainSweep;
use rai_sim::synthetic::SyntheticPath;

#[derive(Parser)]
#[command(name = "rai-sim", about = "Off-chain redemption-rate controller backtester")]
struct Cli {
    /// Log output format (level comes from RUST_LOG)
    #[arg(long, value_enum, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a price history through the controller
    Replay {
        /// Observations CSV (timestamp,market_price)
        #[arg(long)]
        prices: PathBuf,

        /// Controller config TOML (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Snapshot CSV output (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Summary JSON output
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Skip rejected observations instead of aborting
        #[arg(long)]
        skip_invalid: bool,
    },

    /// Replay one history under a grid of kp × ki gains
    Sweep {
        #[arg(long)]
        prices: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Comma-separated kp values (decimal)
        #[arg(long)]
        kp: String,

        /// Comma-separated ki values (decimal)
        #[arg(long)]
        ki: String,

        #[arg(long, default_value = "output/sweep.csv")]
        output: PathBuf,

        #[arg(long)]
        skip_invalid: bool,
    },

    /// Generate a synthetic observations CSV
    Synth {
        #[arg(long, default_value = "3.14")]
        start_price: f64,

        /// Start date (YYYY-MM-DD, UTC midnight)
        #[arg(long, default_value = "2021-02-17")]
        start_date: String,

        /// Seconds between observations
        #[arg(long, default_value = "3600")]
        interval: u64,

        #[arg(long, default_value = "720")]
        steps: usize,

        /// Per-step log-return standard deviation
        #[arg(long, default_value = "0.01")]
        sigma: f64,

        /// Per-step log-return mean
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        drift: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "data/synthetic.csv")]
        output: PathBuf,
    },

    /// Project the configured redemption price forward without new observations
    Project {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Target Unix timestamp
        #[arg(long)]
        at: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ControllerConfig> {
    match path {
        Some(p) => ControllerConfig::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(ControllerConfig::default()),
    }
}

fn load_observations(path: &Path) -> Result<Vec<replay::Observation>> {
    let observations = replay::load_observations(path)
        .map_err(|e| anyhow!("loading {}: {}", path.display(), e))?;
    if observations.is_empty() {
        bail!("{} contains no observations", path.display());
    }
    Ok(observations)
}

fn policy(skip_invalid: bool) -> InvalidPolicy {
    if skip_invalid {
        InvalidPolicy::Skip
    } else {
        InvalidPolicy::Abort
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Replay {
            prices,
            config,
            output: out_path,
            summary,
            skip_invalid,
        } => {
            let observations = load_observations(&prices)?;
            let config = load_config(config.as_ref())?;
            let mut controller = config.build(observations[0].timestamp)?;
            let bounds = (
                controller.state().rate_lower_bound,
                controller.state().rate_upper_bound,
            );

            let outcome = replay::replay(&mut controller, &observations, policy(skip_invalid))
                .map_err(|(i, e)| anyhow!("observation {} (row {}): {}", i, i + 1, e))?;

            match &out_path {
                Some(path) => {
                    output::save_snapshots_csv(&outcome.snapshots, path)
                        .map_err(|e| anyhow!("saving {}: {}", path.display(), e))?;
                    info!(path = %path.display(), rows = outcome.snapshots.len(), "saved snapshots");
                }
                None => {
                    let wtr = csv::Writer::from_writer(std::io::stdout().lock());
                    output::write_snapshots(&outcome.snapshots, wtr)
                        .map_err(|e| anyhow!("writing snapshots: {}", e))?;
                }
            }

            let stats = output::compute_summary(&outcome.snapshots, bounds.0, bounds.1);
            info!(
                ticks = stats.ticks,
                skipped = outcome.skipped.len(),
                mean_abs_deviation = stats.mean_abs_deviation,
                final_redemption_price = %stats.final_redemption_price,
                annualized_pct = stats.final_rate_annualized_pct,
                "replay summary"
            );
            if let Some(path) = summary {
                output::save_summary_json(&stats, &path)
                    .map_err(|e| anyhow!("saving {}: {}", path.display(), e))?;
            }
        }

        Commands::Sweep {
            prices,
            config,
            kp,
            ki,
            output: out_path,
            skip_invalid,
        } => {
            let observations = load_observations(&prices)?;
            let base = load_config(config.as_ref())?;
            let kps = split_list(&kp);
            let kis = split_list(&ki);
            if kps.is_empty() || kis.is_empty() {
                bail!("--kp and --ki need at least one value each");
            }

            println!(
                "Sweeping {} kp × {} ki values over {} observations",
                kps.len(),
                kis.len(),
                observations.len()
            );

            let pb = ProgressBar::new((kps.len() * kis.len()) as u64);
            pb.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}]")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let sweep = GainSweep::new(base, policy(skip_invalid));
            let results = sweep.run(&kps, &kis, &observations, || pb.inc(1));
            pb.finish_and_clear();

            output::save_sweep_results(&results, &out_path)
                .map_err(|e| anyhow!("saving {}: {}", out_path.display(), e))?;
            println!("Saved sweep results to {}", out_path.display());

            println!("\nTop gains:");
            for (i, r) in results.iter().take(3).enumerate() {
                match &r.summary {
                    Ok(s) => println!(
                        "  #{}: kp={} ki={} mean_dev={:.6} at_bounds={}",
                        i + 1,
                        r.kp,
                        r.ki,
                        s.mean_abs_deviation,
                        s.ticks_at_lower_bound + s.ticks_at_upper_bound
                    ),
                    Err(e) => println!("  #{}: kp={} ki={} failed: {}", i + 1, r.kp, r.ki, e),
                }
            }
        }

        Commands::Synth {
            start_price,
            start_date,
            interval,
            steps,
            sigma,
            drift,
            seed,
            output,
        } => {
            let date = NaiveDate::parse_from_str(&start_date, "%Y-%m-%d")
                .with_context(|| format!("invalid start date {:?} (use YYYY-MM-DD)", start_date))?;
            let start_time = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow!("invalid start date {:?}", start_date))?
                .and_utc()
                .timestamp();
            let start_time =
                u64::try_from(start_time).context("start date must not precede 1970-01-01")?;
            if sigma.is_nan() || sigma < 0.0 {
                bail!("--sigma must be >= 0");
            }

            let path = SyntheticPath {
                start_price,
                start_time,
                interval,
                steps,
                sigma,
                drift,
                seed,
            };
            let observations = path.generate();
            replay::save_observations(&observations, &output)
                .map_err(|e| anyhow!("saving {}: {}", output.display(), e))?;
            println!(
                "Saved {} observations to {}",
                observations.len(),
                output.display()
            );
        }

        Commands::Project { config, at } => {
            let config = load_config(config.as_ref())?;
            let Some(start) = config.start_time else {
                bail!("projection needs start_time in the config");
            };
            let controller = config.build(start)?;
            let price = controller.redemption_price_at(at)?;
            let rate = controller.state().redemption_rate;
            println!(
                "redemption_price_at({}) = {} (rate {} ≈ {:.4}%/yr)",
                at,
                format_ray(price),
                rate,
                annualized_pct(rate)
            );
        }
    }

    Ok(())
}
