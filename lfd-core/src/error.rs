use thiserror::Error;

/// Invariant violations a caller can opt into seeing instead of the
/// default clamp-and-log behavior on the hot path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("packet size {size} exceeds max packet size alpha ({alpha})")]
    SizeExceedsAlpha { size: u32, alpha: u32 },

    #[error("timestamp went backwards: previous={previous}, got={got}")]
    NonMonotonicTimestamp { previous: u64, got: u64 },
}

pub type Result<T> = std::result::Result<T, DetectorError>;
