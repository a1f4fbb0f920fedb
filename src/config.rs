//! TOML configuration for a controller.
//!
//! Fixed-point fields are decimal strings so full 27-digit ray precision
//! survives TOML's 64-bit integers: `alpha = "0.9999997112"`.

use crate::controller::{ControllerState, RateController};
use crate::error::ConfigError;
use crate::fixed::{format_fixed, parse_fixed, Ray, Wad, RAY_DECIMALS, WAD_DECIMALS};
use crate::fixed::{DEFAULT_RATE_LOWER_BOUND, DEFAULT_RATE_UPPER_BOUND};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Initial redemption price (decimal)
    pub redemption_price: String,
    /// Initial per-second redemption rate (decimal, 1 = neutral)
    pub redemption_rate: String,
    /// Initial last-update time; replays fall back to the first observation
    pub start_time: Option<u64>,
    /// Proportional gain (decimal, wad precision)
    pub kp: String,
    /// Integral gain (decimal, wad precision)
    pub ki: String,
    /// Per-second integral decay (decimal, ray precision)
    pub alpha: String,
    pub prop_term: String,
    pub integral_term: String,
    pub rate_lower_bound: String,
    pub rate_upper_bound: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            redemption_price: "3.14".into(),
            redemption_rate: "1".into(),
            start_time: None,
            kp: "0.000000075".into(),
            ki: "0.000000000000024".into(),
            // ~28 day half-life
            alpha: "0.9999997112".into(),
            prop_term: "0".into(),
            integral_term: "0".into(),
            rate_lower_bound: format_fixed(DEFAULT_RATE_LOWER_BOUND, RAY_DECIMALS),
            rate_upper_bound: format_fixed(DEFAULT_RATE_UPPER_BOUND, RAY_DECIMALS),
        }
    }
}

fn ray_field(field: &'static str, value: &str) -> Result<Ray, ConfigError> {
    parse_fixed(value, RAY_DECIMALS).ok_or_else(|| ConfigError::InvalidDecimal {
        field,
        value: value.to_string(),
    })
}

fn wad_field(field: &'static str, value: &str) -> Result<Wad, ConfigError> {
    parse_fixed(value, WAD_DECIMALS).ok_or_else(|| ConfigError::InvalidDecimal {
        field,
        value: value.to_string(),
    })
}

impl ControllerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "loaded controller config");
        Ok(config)
    }

    /// Parse every decimal field into the initial controller state.
    /// `start_time` is used when the config does not pin one.
    pub fn to_state(&self, start_time: u64) -> Result<ControllerState, ConfigError> {
        let state = ControllerState::new(
            ray_field("redemption_price", &self.redemption_price)?,
            ray_field("redemption_rate", &self.redemption_rate)?,
            self.start_time.unwrap_or(start_time),
            wad_field("kp", &self.kp)?,
            wad_field("ki", &self.ki)?,
            ray_field("alpha", &self.alpha)?,
        )
        .with_terms(
            ray_field("prop_term", &self.prop_term)?,
            ray_field("integral_term", &self.integral_term)?,
        )
        .with_bounds(
            ray_field("rate_lower_bound", &self.rate_lower_bound)?,
            ray_field("rate_upper_bound", &self.rate_upper_bound)?,
        );
        Ok(state)
    }

    pub fn build(&self, start_time: u64) -> Result<RateController, ConfigError> {
        Ok(RateController::new(self.to_state(start_time)?)?)
    }
}
