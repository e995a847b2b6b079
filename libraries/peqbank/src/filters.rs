//! Filter specifications
//!
//! A filter bank is configured with an ordered [`FilterList`] of [`FilterSpec`]s.
//! Each spec is an immutable, already-validated description of one filter; the
//! designer turns it into one or more biquad stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{PeqError, Result};
use crate::{MAX_FILTERS, MAX_ORDER, MAX_RIPPLE, MIN_ORDER};

/// Epsilon substituted for zero shelf frequencies and used to split equal Peq gains
pub(crate) const SMALL: f32 = 0.000001;

/// What to do with parametric EQ gains that are not strictly monotonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainPolicy {
    /// Nudge the gains into a consistent ordering (biases, never fails)
    #[default]
    Correct,
    /// Refuse the filter with `PeqError::GainOrdering`
    Reject,
}

/// Shelving EQ: one gain below `freq_low`, one above `freq_high`, one in between
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ShelfDef")]
pub struct ShelfParams {
    gain_low: f32,
    gain_middle: f32,
    gain_high: f32,
    freq_low: f32,
    freq_high: f32,
}

#[derive(Deserialize)]
struct ShelfDef {
    gain_low: f32,
    gain_middle: f32,
    gain_high: f32,
    freq_low: f32,
    freq_high: f32,
}

impl From<ShelfDef> for ShelfParams {
    fn from(def: ShelfDef) -> Self {
        Self::new(
            def.gain_low,
            def.gain_middle,
            def.gain_high,
            def.freq_low,
            def.freq_high,
        )
    }
}

impl ShelfParams {
    /// Create shelf parameters (gains in dB, frequencies in Hz)
    ///
    /// A frequency of exactly zero is replaced by a tiny positive value so the
    /// bilinear warp never divides by zero.
    pub fn new(
        gain_low: f32,
        gain_middle: f32,
        gain_high: f32,
        freq_low: f32,
        freq_high: f32,
    ) -> Self {
        Self {
            gain_low,
            gain_middle,
            gain_high,
            freq_low: if freq_low == 0.0 { SMALL } else { freq_low },
            freq_high: if freq_high == 0.0 { SMALL } else { freq_high },
        }
    }

    pub fn gain_low(&self) -> f32 {
        self.gain_low
    }

    pub fn gain_middle(&self) -> f32 {
        self.gain_middle
    }

    pub fn gain_high(&self) -> f32 {
        self.gain_high
    }

    pub fn freq_low(&self) -> f32 {
        self.freq_low
    }

    pub fn freq_high(&self) -> f32 {
        self.freq_high
    }
}

/// Parametric (peaking) EQ
///
/// Gains are in dB: `gain_dc` far from the peak, `gain_peak` at `freq_peak`,
/// and `gain_bandwidth` at the edges of a window `bandwidth` octaves wide.
///
/// Values read from JSON or config are kept as written; a [`GainPolicy`] is
/// applied through [`FilterList::with_policy`], and the designer always works
/// on corrected gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeqParams {
    freq_peak: f32,
    bandwidth: f32,
    gain_dc: f32,
    gain_peak: f32,
    gain_bandwidth: f32,
}

impl PeqParams {
    /// Create parametric EQ parameters, correcting inconsistent gains
    ///
    /// If `gain_dc == gain_peak` the two are split by a tiny epsilon and the
    /// bandwidth gain is placed between them. If the three gains are otherwise
    /// not strictly monotonic, the bandwidth gain is moved to the midpoint.
    pub fn new(
        freq_peak: f32,
        bandwidth: f32,
        gain_dc: f32,
        gain_peak: f32,
        gain_bandwidth: f32,
    ) -> Self {
        let (gain_dc, gain_peak, gain_bandwidth) =
            correct_gains(gain_dc, gain_peak, gain_bandwidth);
        Self {
            freq_peak,
            bandwidth,
            gain_dc,
            gain_peak,
            gain_bandwidth,
        }
    }

    /// Create parametric EQ parameters under an explicit gain policy
    pub fn with_policy(
        freq_peak: f32,
        bandwidth: f32,
        gain_dc: f32,
        gain_peak: f32,
        gain_bandwidth: f32,
        policy: GainPolicy,
    ) -> Result<Self> {
        match policy {
            GainPolicy::Correct => Ok(Self::new(
                freq_peak,
                bandwidth,
                gain_dc,
                gain_peak,
                gain_bandwidth,
            )),
            GainPolicy::Reject => {
                if is_monotonic(gain_dc, gain_bandwidth, gain_peak) {
                    Ok(Self {
                        freq_peak,
                        bandwidth,
                        gain_dc,
                        gain_peak,
                        gain_bandwidth,
                    })
                } else {
                    Err(PeqError::GainOrdering {
                        gain_dc,
                        gain_bandwidth,
                        gain_peak,
                    })
                }
            }
        }
    }

    /// Re-create these parameters under `policy`
    pub fn normalized(&self, policy: GainPolicy) -> Result<Self> {
        Self::with_policy(
            self.freq_peak,
            self.bandwidth,
            self.gain_dc,
            self.gain_peak,
            self.gain_bandwidth,
            policy,
        )
    }

    pub fn freq_peak(&self) -> f32 {
        self.freq_peak
    }

    /// Bandwidth in octaves
    pub fn bandwidth(&self) -> f32 {
        self.bandwidth
    }

    pub fn gain_dc(&self) -> f32 {
        self.gain_dc
    }

    pub fn gain_peak(&self) -> f32 {
        self.gain_peak
    }

    pub fn gain_bandwidth(&self) -> f32 {
        self.gain_bandwidth
    }
}

fn is_monotonic(low: f32, middle: f32, high: f32) -> bool {
    (low < middle && middle < high) || (low > middle && middle > high)
}

fn correct_gains(gain_dc: f32, gain_peak: f32, gain_bandwidth: f32) -> (f32, f32, f32) {
    if gain_dc == gain_peak {
        debug!(gain_dc, gain_peak, "Splitting equal parametric EQ gains");
        (gain_dc - SMALL, gain_dc + SMALL, gain_dc)
    } else if !is_monotonic(gain_dc, gain_bandwidth, gain_peak) {
        let midpoint = (gain_dc + gain_peak) * 0.5;
        debug!(
            gain_dc,
            gain_peak,
            gain_bandwidth,
            corrected = midpoint,
            "Moving parametric EQ bandwidth gain to midpoint"
        );
        (gain_dc, gain_peak, midpoint)
    } else {
        (gain_dc, gain_peak, gain_bandwidth)
    }
}

/// Low-pass / high-pass parameters
///
/// `ripple` is the pass-band ripple in percent (0 gives a maximally flat
/// response), `order` the even filter order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PassDef")]
pub struct PassParams {
    freq: f32,
    ripple: f32,
    order: u32,
}

#[derive(Deserialize)]
struct PassDef {
    freq: f32,
    #[serde(default)]
    ripple: f32,
    order: u32,
}

impl TryFrom<PassDef> for PassParams {
    type Error = PeqError;

    fn try_from(def: PassDef) -> Result<Self> {
        Self::new(def.freq, def.ripple, def.order)
    }
}

impl PassParams {
    /// Validate and create low-pass/high-pass parameters
    pub fn new(freq: f32, ripple: f32, order: u32) -> Result<Self> {
        if order < MIN_ORDER || order > MAX_ORDER || order % 2 != 0 {
            return Err(PeqError::InvalidOrder(order));
        }
        if !(0.0..=MAX_RIPPLE).contains(&ripple) {
            return Err(PeqError::InvalidRipple(ripple));
        }
        Ok(Self {
            freq,
            ripple,
            order,
        })
    }

    /// Cutoff frequency in Hz
    pub fn freq(&self) -> f32 {
        self.freq
    }

    /// Pass-band ripple in percent
    pub fn ripple(&self) -> f32 {
        self.ripple
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Number of biquad stages this filter occupies
    pub fn stage_count(&self) -> usize {
        (self.order / 2) as usize
    }
}

/// Direction of a pass filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    LowPass,
    HighPass,
}

/// One filter in the bank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Shelving EQ
    Shelf(ShelfParams),
    /// Parametric EQ
    Peq(PeqParams),
    /// Ripple-parameterised low-pass
    LowPass(PassParams),
    /// Ripple-parameterised high-pass
    HighPass(PassParams),
}

impl FilterSpec {
    /// Shelving EQ (see [`ShelfParams::new`])
    pub fn shelf(
        gain_low: f32,
        gain_middle: f32,
        gain_high: f32,
        freq_low: f32,
        freq_high: f32,
    ) -> Self {
        Self::Shelf(ShelfParams::new(
            gain_low,
            gain_middle,
            gain_high,
            freq_low,
            freq_high,
        ))
    }

    /// Parametric EQ with gain correction (see [`PeqParams::new`])
    pub fn peq(
        freq_peak: f32,
        bandwidth: f32,
        gain_dc: f32,
        gain_peak: f32,
        gain_bandwidth: f32,
    ) -> Self {
        Self::Peq(PeqParams::new(
            freq_peak,
            bandwidth,
            gain_dc,
            gain_peak,
            gain_bandwidth,
        ))
    }

    /// Low-pass filter; fails on an invalid order or ripple
    pub fn lowpass(freq: f32, ripple: f32, order: u32) -> Result<Self> {
        PassParams::new(freq, ripple, order).map(Self::LowPass)
    }

    /// High-pass filter; fails on an invalid order or ripple
    pub fn highpass(freq: f32, ripple: f32, order: u32) -> Result<Self> {
        PassParams::new(freq, ripple, order).map(Self::HighPass)
    }

    /// Apply a gain policy (only parametric EQs are affected)
    pub fn normalized(&self, policy: GainPolicy) -> Result<Self> {
        match self {
            Self::Peq(params) => params.normalized(policy).map(Self::Peq),
            other => Ok(*other),
        }
    }

    /// Number of biquad stages this filter contributes to the cascade
    pub fn stage_count(&self) -> usize {
        match self {
            Self::Shelf(_) | Self::Peq(_) => 1,
            Self::LowPass(p) | Self::HighPass(p) => p.stage_count(),
        }
    }

    /// Short human-readable type name
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Shelf(_) => "Shelving EQ",
            Self::Peq(_) => "Parametric EQ",
            Self::LowPass(_) => "Low-pass Filter",
            Self::HighPass(_) => "High-pass Filter",
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shelf(s) => write!(
                f,
                "{} | Params: {:.2} dB, {:.2} dB, {:.2} dB, {:.2} Hz, {:.2} Hz",
                self.kind_name(),
                s.gain_low,
                s.gain_middle,
                s.gain_high,
                s.freq_low,
                s.freq_high
            ),
            Self::Peq(p) => write!(
                f,
                "{} | Params: {:.2} Hz, {:.2} oct, {:.2} dB, {:.2} dB, {:.2} dB",
                self.kind_name(),
                p.freq_peak,
                p.bandwidth,
                p.gain_dc,
                p.gain_peak,
                p.gain_bandwidth
            ),
            Self::LowPass(p) | Self::HighPass(p) => write!(
                f,
                "{} | Params: {:.2} Hz, {:.2}%, {} order",
                self.kind_name(),
                p.freq,
                p.ripple,
                p.order
            ),
        }
    }
}

/// Ordered list of filters, applied in cascade order
///
/// Holds at most [`MAX_FILTERS`] entries. The end of the list terminates the
/// cascade; there is no explicit sentinel entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FilterSpec>", into = "Vec<FilterSpec>")]
pub struct FilterList {
    filters: Vec<FilterSpec>,
}

impl FilterList {
    /// Create an empty list (unity pass-through)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from fallibly constructed entries
    ///
    /// Rejected entries are dropped with a warning instead of aborting the
    /// whole list; entries beyond [`MAX_FILTERS`] are ignored.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = Result<FilterSpec>>,
    {
        let mut filters = Vec::with_capacity(MAX_FILTERS);
        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                Ok(spec) if filters.len() < MAX_FILTERS => filters.push(spec),
                Ok(_) => {
                    warn!(index, max = MAX_FILTERS, "Ignoring filter beyond list capacity");
                }
                Err(e) => {
                    warn!(index, error = %e, "Dropping invalid filter entry");
                }
            }
        }
        Self { filters }
    }

    /// Append a filter
    pub fn push(&mut self, spec: FilterSpec) -> Result<()> {
        if self.filters.len() >= MAX_FILTERS {
            return Err(PeqError::TooManyFilters { max: MAX_FILTERS });
        }
        self.filters.push(spec);
        Ok(())
    }

    /// Builder-style append
    pub fn with(mut self, spec: FilterSpec) -> Result<Self> {
        self.push(spec)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FilterSpec> {
        self.filters.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilterSpec> {
        self.filters.iter()
    }

    pub fn as_slice(&self) -> &[FilterSpec] {
        &self.filters
    }

    /// Total number of biquad stages the list expands to
    pub fn stage_count(&self) -> usize {
        self.filters.iter().map(FilterSpec::stage_count).sum()
    }

    /// Parse a list from a JSON array of tagged filters
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `policy` to every parametric EQ in the list
    pub fn with_policy(&self, policy: GainPolicy) -> Result<Self> {
        let filters = self
            .filters
            .iter()
            .map(|spec| spec.normalized(policy))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }
}

impl TryFrom<Vec<FilterSpec>> for FilterList {
    type Error = PeqError;

    fn try_from(filters: Vec<FilterSpec>) -> Result<Self> {
        if filters.len() > MAX_FILTERS {
            return Err(PeqError::TooManyFilters { max: MAX_FILTERS });
        }
        Ok(Self { filters })
    }
}

impl From<FilterList> for Vec<FilterSpec> {
    fn from(list: FilterList) -> Self {
        list.filters
    }
}

impl<'a> IntoIterator for &'a FilterList {
    type Item = &'a FilterSpec;
    type IntoIter = std::slice::Iter<'a, FilterSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelf_zero_frequencies_replaced() {
        let shelf = ShelfParams::new(0.0, -6.0, 0.0, 0.0, 0.0);
        assert_eq!(shelf.freq_low(), SMALL);
        assert_eq!(shelf.freq_high(), SMALL);

        let shelf = ShelfParams::new(0.0, -6.0, 0.0, 1000.0, 6000.0);
        assert_eq!(shelf.freq_low(), 1000.0);
        assert_eq!(shelf.freq_high(), 6000.0);
    }

    #[test]
    fn peq_equal_gains_split() {
        let peq = PeqParams::new(1000.0, 1.0, 6.0, 6.0, 0.0);
        assert!(peq.gain_dc() < 6.0);
        assert!(peq.gain_peak() > 6.0);
        assert_eq!(peq.gain_bandwidth(), 6.0);
    }

    #[test]
    fn peq_non_monotonic_moved_to_midpoint() {
        // Bandwidth gain outside [dc, peak]
        let peq = PeqParams::new(1000.0, 1.0, 0.0, 12.0, 20.0);
        assert_eq!(peq.gain_bandwidth(), 6.0);

        // Descending (cut) with bandwidth gain on the wrong side
        let peq = PeqParams::new(1000.0, 1.0, 0.0, -12.0, 3.0);
        assert_eq!(peq.gain_bandwidth(), -6.0);
    }

    #[test]
    fn peq_monotonic_gains_unchanged() {
        let peq = PeqParams::new(100.0, 0.1, -48.0, 48.0, -12.0);
        assert_eq!(peq.gain_dc(), -48.0);
        assert_eq!(peq.gain_peak(), 48.0);
        assert_eq!(peq.gain_bandwidth(), -12.0);
    }

    #[test]
    fn peq_correction_is_idempotent() {
        let once = PeqParams::new(1000.0, 1.0, 3.0, 3.0, 9.0);
        let twice = PeqParams::new(
            once.freq_peak(),
            once.bandwidth(),
            once.gain_dc(),
            once.gain_peak(),
            once.gain_bandwidth(),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn peq_reject_policy() {
        let result = PeqParams::with_policy(1000.0, 1.0, 0.0, 12.0, 20.0, GainPolicy::Reject);
        assert!(matches!(result, Err(PeqError::GainOrdering { .. })));

        let result = PeqParams::with_policy(1000.0, 1.0, 0.0, 12.0, 6.0, GainPolicy::Reject);
        assert!(result.is_ok());
    }

    #[test]
    fn pass_validation() {
        assert!(PassParams::new(1000.0, 1.0, 6).is_ok());
        assert!(PassParams::new(1000.0, 0.0, 2).is_ok());
        assert!(PassParams::new(1000.0, 29.0, 32).is_ok());

        assert!(matches!(
            PassParams::new(1000.0, 1.0, 0),
            Err(PeqError::InvalidOrder(0))
        ));
        assert!(matches!(
            PassParams::new(1000.0, 1.0, 5),
            Err(PeqError::InvalidOrder(5))
        ));
        assert!(matches!(
            PassParams::new(1000.0, 1.0, 34),
            Err(PeqError::InvalidOrder(34))
        ));
        assert!(matches!(
            PassParams::new(1000.0, -0.5, 4),
            Err(PeqError::InvalidRipple(_))
        ));
        assert!(matches!(
            PassParams::new(1000.0, 30.0, 4),
            Err(PeqError::InvalidRipple(_))
        ));
    }

    #[test]
    fn stage_counts() {
        assert_eq!(FilterSpec::shelf(0.0, -6.0, 0.0, 1000.0, 6000.0).stage_count(), 1);
        assert_eq!(FilterSpec::peq(1000.0, 1.0, 0.0, 6.0, 3.0).stage_count(), 1);
        assert_eq!(FilterSpec::lowpass(4000.0, 1.0, 6).unwrap().stage_count(), 3);
        assert_eq!(FilterSpec::highpass(4000.0, 1.0, 8).unwrap().stage_count(), 4);
    }

    #[test]
    fn from_entries_drops_invalid() {
        let list = FilterList::from_entries([
            FilterSpec::lowpass(4000.0, 1.0, 6),
            FilterSpec::lowpass(4000.0, 1.0, 7),
            Ok(FilterSpec::peq(1000.0, 1.0, 0.0, 6.0, 3.0)),
        ]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.stage_count(), 4);
    }

    #[test]
    fn from_entries_truncates_at_capacity() {
        let entries =
            (0..20).map(|i| Ok(FilterSpec::peq(100.0 * (i + 1) as f32, 1.0, 0.0, 3.0, 1.5)));
        let list = FilterList::from_entries(entries);
        assert_eq!(list.len(), MAX_FILTERS);
    }

    #[test]
    fn push_respects_capacity() {
        let mut list = FilterList::new();
        for _ in 0..MAX_FILTERS {
            list.push(FilterSpec::peq(1000.0, 1.0, 0.0, 3.0, 1.5)).unwrap();
        }
        assert!(matches!(
            list.push(FilterSpec::peq(1000.0, 1.0, 0.0, 3.0, 1.5)),
            Err(PeqError::TooManyFilters { .. })
        ));
    }

    #[test]
    fn json_round_trip() {
        let list = FilterList::new()
            .with(FilterSpec::shelf(0.0, -6.0, 0.0, 1000.0, 6000.0))
            .unwrap()
            .with(FilterSpec::peq(3000.0, 0.1, 0.0, 48.0, 3.0))
            .unwrap()
            .with(FilterSpec::highpass(80.0, 0.5, 4).unwrap())
            .unwrap();

        let json = serde_json::to_string(&list).unwrap();
        let parsed = FilterList::from_json(&json).unwrap();
        assert_eq!(parsed, list);
    }

    #[test]
    fn json_rejects_invalid_order() {
        let json = r#"[{"type": "low_pass", "freq": 1000.0, "ripple": 1.0, "order": 3}]"#;
        assert!(FilterList::from_json(json).is_err());
    }

    #[test]
    fn json_gains_follow_policy() {
        let json = r#"[{"type": "peq", "freq_peak": 1000.0, "bandwidth": 1.0,
                        "gain_dc": 0.0, "gain_peak": 12.0, "gain_bandwidth": 20.0}]"#;
        let list = FilterList::from_json(json).unwrap();

        let corrected = list.with_policy(GainPolicy::Correct).unwrap();
        match corrected.get(0) {
            Some(FilterSpec::Peq(p)) => assert_eq!(p.gain_bandwidth(), 6.0),
            other => panic!("unexpected filter: {:?}", other),
        }

        assert!(matches!(
            list.with_policy(GainPolicy::Reject),
            Err(PeqError::GainOrdering { .. })
        ));
    }
}
