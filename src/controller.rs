//! Redemption-rate controller: a PI controller with a leaky integral,
//! computed in the same fixed-point units as the on-chain rate setter.
//!
//! The redemption price compounds by the redemption rate every second. Each
//! observation of the market price produces a ray-scaled error against the
//! compounded redemption price; the proportional and (decayed, trapezoid
//! integrated) integral responses are summed onto the neutral rate `RAY`
//! and clamped to hard bounds.

use crate::error::ControllerError;
use crate::fixed::{
    checked_add, checked_mul, checked_sub, int, mul_div, rmul, rpow, wmul, Ray, Wad,
    DEFAULT_RATE_LOWER_BOUND, DEFAULT_RATE_UPPER_BOUND, RAY,
};
use alloy_primitives::I256;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    /// Target price, compounded each tick
    pub redemption_price: Ray,
    /// Per-second multiplicative rate applied to the redemption price
    pub redemption_rate: Ray,
    /// Unix seconds of the last processed observation
    pub last_update_time: u64,
    pub kp: Wad,
    pub ki: Wad,
    /// Per-second decay of the integral accumulator
    pub alpha: Ray,
    pub integral_term: Ray,
    /// Error from the previous tick (left edge of the next trapezoid)
    pub prop_term: Ray,
    pub kp_rate: Ray,
    pub ki_rate: Ray,
    pub rate_lower_bound: Ray,
    pub rate_upper_bound: Ray,
}

impl ControllerState {
    /// Initial snapshot with zero accumulated terms and the default bounds.
    pub fn new(
        redemption_price: Ray,
        redemption_rate: Ray,
        last_update_time: u64,
        kp: Wad,
        ki: Wad,
        alpha: Ray,
    ) -> Self {
        ControllerState {
            redemption_price,
            redemption_rate,
            last_update_time,
            kp,
            ki,
            alpha,
            integral_term: I256::ZERO,
            prop_term: I256::ZERO,
            kp_rate: I256::ZERO,
            ki_rate: I256::ZERO,
            rate_lower_bound: DEFAULT_RATE_LOWER_BOUND,
            rate_upper_bound: DEFAULT_RATE_UPPER_BOUND,
        }
    }

    pub fn with_terms(mut self, prop_term: Ray, integral_term: Ray) -> Self {
        self.prop_term = prop_term;
        self.integral_term = integral_term;
        self
    }

    pub fn with_bounds(mut self, rate_lower_bound: Ray, rate_upper_bound: Ray) -> Self {
        self.rate_lower_bound = rate_lower_bound;
        self.rate_upper_bound = rate_upper_bound;
        self
    }
}

/// Post-update view returned by [`RateController::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: u64,
    pub redemption_rate: Ray,
    pub kp_rate: Ray,
    pub ki_rate: Ray,
    pub redemption_price: Ray,
    pub market_price: Ray,
}

#[derive(Debug, Clone)]
pub struct RateController {
    state: ControllerState,
}

impl RateController {
    pub fn new(state: ControllerState) -> Result<Self, ControllerError> {
        if !state.redemption_price.is_positive() {
            return Err(ControllerError::InvalidPrice {
                price: state.redemption_price,
            });
        }
        if !state.rate_lower_bound.is_positive() {
            return Err(ControllerError::InvalidParameter {
                name: "rate_lower_bound",
                reason: format!("{} must be > 0", state.rate_lower_bound),
            });
        }
        if state.rate_lower_bound > state.rate_upper_bound {
            return Err(ControllerError::InvalidParameter {
                name: "rate_upper_bound",
                reason: format!(
                    "{} is below rate_lower_bound {}",
                    state.rate_upper_bound, state.rate_lower_bound
                ),
            });
        }
        if state.redemption_rate < state.rate_lower_bound
            || state.redemption_rate > state.rate_upper_bound
        {
            return Err(ControllerError::InvalidParameter {
                name: "redemption_rate",
                reason: format!(
                    "{} outside [{}, {}]",
                    state.redemption_rate, state.rate_lower_bound, state.rate_upper_bound
                ),
            });
        }
        if state.alpha.is_negative() {
            return Err(ControllerError::InvalidParameter {
                name: "alpha",
                reason: format!("{} is negative", state.alpha),
            });
        }
        Ok(RateController { state })
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    fn elapsed(&self, timestamp: u64) -> Result<u64, ControllerError> {
        timestamp
            .checked_sub(self.state.last_update_time)
            .ok_or(ControllerError::OutOfOrderUpdate {
                last_update_time: self.state.last_update_time,
                timestamp,
            })
    }

    /// Redemption price compounded forward to `timestamp` without mutating state.
    pub fn redemption_price_at(&self, timestamp: u64) -> Result<Ray, ControllerError> {
        if !self.state.redemption_price.is_positive() {
            return Err(ControllerError::InvalidPrice {
                price: self.state.redemption_price,
            });
        }
        let time_since = self.elapsed(timestamp)?;
        rmul(
            self.state.redemption_price,
            rpow(self.state.redemption_rate, time_since)?,
        )
    }

    /// Ray-scaled error of `market_price` against the current redemption price.
    /// Positive when the market trades below target.
    pub fn deviation(&self, market_price: Ray) -> Result<Ray, ControllerError> {
        let rp = self.state.redemption_price;
        if !rp.is_positive() {
            return Err(ControllerError::InvalidPrice { price: rp });
        }
        mul_div(checked_sub(rp, market_price, "error")?, RAY, rp, "error")
    }

    /// Advance the controller by one observation.
    ///
    /// Steps run in a fixed order: compound the redemption price over the
    /// elapsed time, measure the error, compute the proportional response,
    /// decay the integral and add the new trapezoid, compute the integral
    /// response, then set and clamp the new rate. Nothing is committed
    /// unless every step succeeds.
    pub fn process(
        &mut self,
        market_price: Ray,
        timestamp: u64,
    ) -> Result<Snapshot, ControllerError> {
        if !market_price.is_positive() {
            return Err(ControllerError::InvalidPrice { price: market_price });
        }
        let s = &self.state;
        if !s.redemption_price.is_positive() {
            return Err(ControllerError::InvalidPrice {
                price: s.redemption_price,
            });
        }
        let time_since = self.elapsed(timestamp)?;

        let redemption_price = rmul(s.redemption_price, rpow(s.redemption_rate, time_since)?)?;
        if !redemption_price.is_positive() {
            return Err(ControllerError::InvalidPrice {
                price: redemption_price,
            });
        }

        let error = mul_div(
            checked_sub(redemption_price, market_price, "error")?,
            RAY,
            redemption_price,
            "error",
        )?;

        let kp_rate = wmul(s.kp, error)?;

        // integral * decay / RAY + (error + prop) * dt / 2, truncated once:
        // (2 * integral * decay + (error + prop) * dt * RAY) / (2 * RAY)
        let edges = checked_add(error, s.prop_term, "trapezoid")?;
        let doubled_area = checked_mul(
            checked_mul(edges, int(time_since), "trapezoid")?,
            RAY,
            "trapezoid",
        )?;

        let decay = rpow(s.alpha, time_since)?;
        let doubled_decayed = checked_mul(
            checked_mul(s.integral_term, decay, "integral")?,
            int(2),
            "integral",
        )?;
        let integral_term = mul_div(
            checked_add(doubled_decayed, doubled_area, "integral")?,
            int(1),
            checked_mul(RAY, int(2), "integral")?,
            "integral",
        )?;

        let ki_rate = wmul(s.ki, integral_term)?;

        let raw_rate = checked_add(
            checked_add(RAY, kp_rate, "rate")?,
            ki_rate,
            "rate",
        )?;
        let redemption_rate = raw_rate.clamp(s.rate_lower_bound, s.rate_upper_bound);
        if redemption_rate != raw_rate {
            debug!(
                timestamp,
                raw_rate = %raw_rate,
                clamped = %redemption_rate,
                "redemption rate clamped"
            );
        }

        let state = &mut self.state;
        state.redemption_price = redemption_price;
        state.integral_term = integral_term;
        state.prop_term = error;
        state.last_update_time = timestamp;
        state.kp_rate = kp_rate;
        state.ki_rate = ki_rate;
        state.redemption_rate = redemption_rate;

        trace!(
            timestamp,
            time_since,
            error = %error,
            rate = %redemption_rate,
            "processed observation"
        );

        Ok(Snapshot {
            timestamp,
            redemption_rate,
            kp_rate,
            ki_rate,
            redemption_price,
            market_price,
        })
    }
}
