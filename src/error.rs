use alloy_primitives::I256;
use thiserror::Error;

/// Failures of a single controller operation. State is never modified when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// Market or redemption price is zero or negative.
    #[error("invalid price {price} (must be > 0)")]
    InvalidPrice { price: I256 },

    /// Observation timestamp precedes the last processed update.
    #[error("out-of-order update: timestamp {timestamp} < last update {last_update_time}")]
    OutOfOrderUpdate { last_update_time: u64, timestamp: u64 },

    /// A fixed-point intermediate left the 256-bit range.
    #[error("arithmetic overflow in {op}")]
    ArithmeticOverflow { op: &'static str },

    /// Construction-time parameter outside its valid domain.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Failures loading a controller from a TOML file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("field {field}: invalid decimal {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error(transparent)]
    Controller(#[from] ControllerError),
}
