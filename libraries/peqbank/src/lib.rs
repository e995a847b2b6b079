//! PEQ Bank
//!
//! Real-time cascaded biquad filter bank for multi-channel audio.
//!
//! This crate provides:
//! - Shelving EQ, parametric (peaking) EQ and ripple-parameterised
//!   low-pass/high-pass filters, each expanded into biquad stages
//! - A cascade executor with two modes: **Fast** (new coefficients apply
//!   immediately) and **Smooth** (linear interpolation over one buffer)
//! - A lock-free-on-the-audio-side coefficient hand-off between a control
//!   thread and the render thread
//! - Layered configuration (file + environment) for bank settings and filter lists
//!
//! # Example
//!
//! ```rust
//! use peqbank::{FilterList, FilterSpec, PeqBank};
//!
//! # fn example() -> peqbank::Result<()> {
//! let mut bank = PeqBank::new(48000, 2, 256)?;
//!
//! let filters = FilterList::new()
//!     .with(FilterSpec::shelf(3.0, 0.0, -2.0, 120.0, 8000.0))?
//!     .with(FilterSpec::peq(1000.0, 1.0, 0.0, 6.0, 3.0))?
//!     .with(FilterSpec::highpass(40.0, 0.5, 4)?)?;
//!
//! let stages = bank.setup(filters)?;
//! assert_eq!(stages, 4);
//!
//! // Interleaved stereo, 256 frames
//! let input = vec![0.0f32; 512];
//! let mut output = vec![0.0f32; 512];
//! bank.render_f32(&input, &mut output)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod bank;
mod cascade;
mod coefficients;
pub mod config;
pub mod design;
mod error;
mod filters;
pub mod format;
mod report;
mod ring;

pub use bank::{BankController, PeqBank, ProcessingMode};
pub use cascade::{BiquadState, Cascade, CascadePlan};
pub use coefficients::CoefficientSet;
pub use config::BankConfig;
pub use design::Biquad;
pub use error::{PeqError, Result, RingError};
pub use filters::{
    FilterList, FilterSpec, GainPolicy, PassKind, PassParams, PeqParams, ShelfParams,
};
pub use report::{BankReport, Complexity};
pub use ring::{CoefficientRing, SlotRole};

/// Maximum number of entries in a filter list
pub const MAX_FILTERS: usize = 16;

/// Default biquad stage capacity of a bank
pub const MAX_STAGES: usize = 16;

/// Lowest low-pass/high-pass order
pub const MIN_ORDER: u32 = 2;

/// Highest low-pass/high-pass order
pub const MAX_ORDER: u32 = 2 * MAX_FILTERS as u32;

/// Highest pass-band ripple, in percent
pub const MAX_RIPPLE: f32 = 29.0;
