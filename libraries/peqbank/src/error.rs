//! Error types for the filter bank

use thiserror::Error;

/// Result type alias using `PeqError`
pub type Result<T> = std::result::Result<T, PeqError>;

/// Filter bank errors
#[derive(Error, Debug)]
pub enum PeqError {
    /// Low-pass/high-pass order outside the supported even range
    #[error("Invalid filter order: {0} (must be even, between 2 and 32)")]
    InvalidOrder(u32),

    /// Low-pass/high-pass ripple outside the supported range
    #[error("Invalid ripple: {0}% (must be between 0 and 29)")]
    InvalidRipple(f32),

    /// Parametric EQ gains are not strictly monotonic (only with `GainPolicy::Reject`)
    #[error(
        "Parametric EQ gains must be strictly ordered: dc={gain_dc} dB, bandwidth={gain_bandwidth} dB, peak={gain_peak} dB"
    )]
    GainOrdering {
        gain_dc: f32,
        gain_bandwidth: f32,
        gain_peak: f32,
    },

    /// Invalid sample rate
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Invalid channel count
    #[error("Invalid channel count: {0} (must be at least 1)")]
    InvalidChannelCount(usize),

    /// Invalid processing buffer size
    #[error("Invalid buffer size: {0} frames (must be at least 1)")]
    InvalidBufferSize(usize),

    /// Invalid biquad stage capacity
    #[error("Invalid stage capacity: {0} (must be at least 1)")]
    InvalidStageCapacity(usize),

    /// Filter list already holds the maximum number of entries
    #[error("Too many filters: at most {max} entries per list")]
    TooManyFilters { max: usize },

    /// The filter list needs more biquad stages than the bank can hold
    #[error("Filter list needs {requested} biquad stages but capacity is {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    /// Memory for buffers, history or coefficient slots could not be obtained
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Coefficient hand-off protocol violated (internal logic defect)
    #[error("Coefficient ring protocol violation: {0}")]
    Protocol(#[from] RingError),

    /// Render input/output lengths do not match the channel layout
    #[error(
        "Buffer mismatch: input has {input} samples, output has {output}, channels = {channels}"
    )]
    BufferMismatch {
        input: usize,
        output: usize,
        channels: usize,
    },

    /// Render buffer holds more frames than the bank was sized for
    #[error("Buffer too large: {frames} frames exceeds processing buffer of {capacity} frames")]
    BufferTooLarge { frames: usize, capacity: usize },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for PeqError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for PeqError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}

/// Violations of the coefficient ring hand-off protocol
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// A set was staged but never published before the next compute
    #[error("a pending coefficient set was never published")]
    AlreadyStaged,

    /// Publish was called without a staged set
    #[error("publish called without a staged coefficient set")]
    NothingStaged,

    /// Rotation attempted without an intervening publish
    #[error("rotation attempted without an intervening compute")]
    NoTransition,

    /// No free slot left to stage into
    #[error("no free coefficient slot available")]
    NoFreeSlot,
}
