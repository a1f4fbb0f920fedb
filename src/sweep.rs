use crate::config::ControllerConfig;
use crate::output::{compute_summary, SummaryMetrics};
use crate::replay::{replay, InvalidPolicy, Observation};
use rayon::prelude::*;

/// Result of replaying one gain combination.
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub kp: String,
    pub ki: String,
    /// Summary of the run, or the reason the run failed.
    pub summary: Result<SummaryMetrics, String>,
}

impl SweepResult {
    fn score(&self) -> f64 {
        self.summary
            .as_ref()
            .map(|s| s.mean_abs_deviation)
            .unwrap_or(f64::INFINITY)
    }
}

/// Replays one observation stream under every kp × ki combination.
pub struct GainSweep {
    pub base: ControllerConfig,
    pub policy: InvalidPolicy,
}

impl GainSweep {
    pub fn new(base: ControllerConfig, policy: InvalidPolicy) -> Self {
        GainSweep { base, policy }
    }

    /// Generate all gain combinations (cartesian product).
    pub fn combinations(kps: &[String], kis: &[String]) -> Vec<(String, String)> {
        kps.iter()
            .flat_map(|kp| kis.iter().map(move |ki| (kp.clone(), ki.clone())))
            .collect()
    }

    /// Run a single combination from a fresh controller.
    pub fn run_one(&self, kp: &str, ki: &str, observations: &[Observation]) -> SweepResult {
        let mut config = self.base.clone();
        config.kp = kp.to_string();
        config.ki = ki.to_string();

        let start = observations.first().map(|o| o.timestamp).unwrap_or(0);
        let summary = config
            .build(start)
            .map_err(|e| e.to_string())
            .and_then(|mut controller| {
                let state = controller.state().clone();
                replay(&mut controller, observations, self.policy)
                    .map(|outcome| {
                        compute_summary(
                            &outcome.snapshots,
                            state.rate_lower_bound,
                            state.rate_upper_bound,
                        )
                    })
                    .map_err(|(i, e)| format!("observation {}: {}", i, e))
            });

        SweepResult {
            kp: kp.to_string(),
            ki: ki.to_string(),
            summary,
        }
    }

    /// Evaluate every combination in parallel, best (lowest mean deviation)
    /// first. `on_done` is called once per finished combination.
    pub fn run<F>(
        &self,
        kps: &[String],
        kis: &[String],
        observations: &[Observation],
        on_done: F,
    ) -> Vec<SweepResult>
    where
        F: Fn() + Sync,
    {
        let mut results: Vec<SweepResult> = Self::combinations(kps, kis)
            .par_iter()
            .map(|(kp, ki)| {
                let r = self.run_one(kp, ki, observations);
                on_done();
                r
            })
            .collect();

        results.sort_by(|a, b| {
            a.score()
                .partial_cmp(&b.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }
}
