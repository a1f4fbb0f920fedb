//! Seeded synthetic market-price paths, for demos and randomized checks.

use crate::fixed::{parse_ray, Ray};
use crate::replay::Observation;
use alloy_primitives::I256;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Lowest price a generated path may reach.
const PRICE_FLOOR: f64 = 1e-6;
/// Highest price a generated path may reach; well inside the ray range.
const PRICE_CAP: f64 = 1e30;

#[derive(Debug, Clone)]
pub struct SyntheticPath {
    pub start_price: f64,
    /// Unix seconds of the first observation
    pub start_time: u64,
    /// Seconds between observations
    pub interval: u64,
    pub steps: usize,
    /// Per-step log-return standard deviation
    pub sigma: f64,
    /// Per-step log-return mean
    pub drift: f64,
    pub seed: u64,
}

impl Default for SyntheticPath {
    fn default() -> Self {
        SyntheticPath {
            start_price: 3.14,
            start_time: 1_613_520_000,
            interval: 3600,
            steps: 720,
            sigma: 0.01,
            drift: 0.0,
            seed: 42,
        }
    }
}

impl SyntheticPath {
    /// Raw float prices of a log-normal random walk.
    pub fn prices(&self) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let normal = Normal::new(self.drift, self.sigma.max(0.0))
            .expect("only a negative or NaN std dev is rejected, and max(0.0) maps both to 0");

        let mut price = bounded(self.start_price);
        let mut prices = Vec::with_capacity(self.steps);
        for i in 0..self.steps {
            if i > 0 {
                let r: f64 = normal.sample(&mut rng);
                price = bounded(price * r.exp());
            }
            prices.push(price);
        }
        prices
    }

    /// Observations at `start_time + i * interval`, prices rounded to 9
    /// decimals. Always yields `steps` rows.
    pub fn generate(&self) -> Vec<Observation> {
        self.prices()
            .into_iter()
            .enumerate()
            .map(|(i, p)| Observation {
                timestamp: self.start_time + i as u64 * self.interval,
                market_price: ray_price(p),
            })
            .collect()
    }
}

/// Clamp into `[PRICE_FLOOR, PRICE_CAP]`; NaN lands on the floor.
fn bounded(price: f64) -> f64 {
    price.max(PRICE_FLOOR).min(PRICE_CAP)
}

/// Any bounded price renders within range, so the fallback saturates only
/// in theory.
fn ray_price(p: f64) -> Ray {
    parse_ray(&format!("{:.9}", p)).unwrap_or(I256::MAX)
}
