//! Fixed-point arithmetic matching the on-chain controller.
//!
//! Every scaled quantity is a signed 256-bit integer. Products go through
//! [`mul_div`], which multiplies magnitudes in 256 bits, divides, and
//! truncates toward zero. Overflow is always reported, never wrapped.

use crate::error::ControllerError;
use alloy_primitives::{Sign, I256, U256};

/// Ray-scaled value (10^27 = 1.0).
pub type Ray = I256;
/// Wad-scaled value (10^18 = 1.0).
pub type Wad = I256;

pub const RAY_DECIMALS: u32 = 27;
pub const WAD_DECIMALS: u32 = 18;

/// 10^27
pub const RAY: Ray = I256::from_raw(U256::from_limbs([11_515_845_246_265_065_472, 54_210_108, 0, 0]));
/// 10^18
pub const WAD: Wad = I256::from_raw(U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]));

/// Default hard floor on the per-second redemption rate.
pub const DEFAULT_RATE_LOWER_BOUND: Ray =
    I256::from_raw(U256::from_limbs([1_097_581_170_168_945_492, 54_210_105, 0, 0]));
/// Default hard ceiling on the per-second redemption rate.
pub const DEFAULT_RATE_UPPER_BOUND: Ray =
    I256::from_raw(U256::from_limbs([3_487_369_572_831_753_459, 54_210_112, 0, 0]));

pub const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// Lift an unsigned integer into the signed domain.
pub fn int(v: u64) -> I256 {
    I256::from_raw(U256::from(v))
}

/// `a * b / d`, truncated toward zero.
pub fn mul_div(a: I256, b: I256, d: I256, op: &'static str) -> Result<I256, ControllerError> {
    let overflow = ControllerError::ArithmeticOverflow { op };
    if d.is_zero() {
        return Err(overflow);
    }
    let negative = a.is_negative() ^ b.is_negative() ^ d.is_negative();
    let (_, a_abs) = a.into_sign_and_abs();
    let (_, b_abs) = b.into_sign_and_abs();
    let (_, d_abs) = d.into_sign_and_abs();

    let quotient = a_abs
        .checked_mul(b_abs)
        .ok_or_else(|| overflow.clone())?
        / d_abs;

    let sign = if negative && !quotient.is_zero() {
        Sign::Negative
    } else {
        Sign::Positive
    };
    I256::checked_from_sign_and_abs(sign, quotient).ok_or(overflow)
}

/// Ray product: `a * b / RAY`.
pub fn rmul(a: Ray, b: Ray) -> Result<Ray, ControllerError> {
    mul_div(a, b, RAY, "rmul")
}

/// Wad product: `a * b / WAD`. Keeps the scale of the non-wad operand.
pub fn wmul(a: Wad, b: I256) -> Result<I256, ControllerError> {
    mul_div(a, b, WAD, "wmul")
}

pub fn checked_add(a: I256, b: I256, op: &'static str) -> Result<I256, ControllerError> {
    a.checked_add(b)
        .ok_or(ControllerError::ArithmeticOverflow { op })
}

pub fn checked_mul(a: I256, b: I256, op: &'static str) -> Result<I256, ControllerError> {
    a.checked_mul(b)
        .ok_or(ControllerError::ArithmeticOverflow { op })
}

pub fn checked_sub(a: I256, b: I256, op: &'static str) -> Result<I256, ControllerError> {
    a.checked_sub(b)
        .ok_or(ControllerError::ArithmeticOverflow { op })
}

/// `x^n` for a ray-scaled, non-negative base and an integer exponent.
///
/// Exponentiation by squaring; each product is an [`rmul`] so every step
/// truncates exactly like naive repeated multiplication does, only regrouped.
pub fn rpow(x: Ray, n: u64) -> Result<Ray, ControllerError> {
    if x.is_negative() {
        return Err(ControllerError::InvalidParameter {
            name: "rpow base",
            reason: format!("{} is negative", x),
        });
    }

    let mut result = RAY;
    let mut base = x;
    let mut exp = n;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_div(result, base, RAY, "rpow")?;
        }
        exp >>= 1;
        if exp > 0 {
            base = mul_div(base, base, RAY, "rpow")?;
        }
    }
    Ok(result)
}

/// Parse an exact decimal string into an integer scaled by `10^decimals`.
///
/// Accepts an optional sign, an integer part and an optional fraction of at
/// most `decimals` digits. Returns `None` for anything else, including
/// fractions that would need rounding.
pub fn parse_fixed(s: &str, decimals: u32) -> Option<I256> {
    let s = s.trim();
    let (negative, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > decimals as usize {
        return None;
    }

    let ten = U256::from(10u64);
    let mut mag = U256::ZERO;
    let padding = decimals as usize - frac_part.len();
    let digits = int_part
        .bytes()
        .chain(frac_part.bytes())
        .chain(std::iter::repeat(b'0').take(padding));
    for b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        mag = mag
            .checked_mul(ten)?
            .checked_add(U256::from(u64::from(b - b'0')))?;
    }

    let sign = if negative { Sign::Negative } else { Sign::Positive };
    I256::checked_from_sign_and_abs(sign, mag)
}

/// Render a scaled integer as an exact decimal, trailing zeros trimmed.
pub fn format_fixed(x: I256, decimals: u32) -> String {
    let (sign, abs) = x.into_sign_and_abs();
    let digits = abs.to_string();
    let width = decimals as usize + 1;
    let padded = if digits.len() < width {
        format!("{}{}", "0".repeat(width - digits.len()), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - decimals as usize);
    let frac_part = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(padded.len() + 2);
    if sign == Sign::Negative && !abs.is_zero() {
        out.push('-');
    }
    out.push_str(int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

pub fn parse_ray(s: &str) -> Option<Ray> {
    parse_fixed(s, RAY_DECIMALS)
}

pub fn parse_wad(s: &str) -> Option<Wad> {
    parse_fixed(s, WAD_DECIMALS)
}

pub fn format_ray(x: Ray) -> String {
    format_fixed(x, RAY_DECIMALS)
}

/// Lossy float view of a ray value, for summaries and plots only.
pub fn ray_to_f64(x: Ray) -> f64 {
    format_ray(x).parse().unwrap_or(f64::NAN)
}

/// Annualized percentage change implied by a per-second ray rate.
pub fn annualized_pct(rate: Ray) -> f64 {
    (ray_to_f64(rate).powf(SECONDS_PER_YEAR as f64) - 1.0) * 100.0
}
