//! Diagnostics: human-readable bank dump and cascade cost

use std::fmt;

use crate::bank::ProcessingMode;
use crate::design::Biquad;
use crate::filters::{FilterList, FilterSpec};

/// Arithmetic cost of running a cascade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complexity {
    pub multiplications_per_sample: usize,
    pub additions_per_sample: usize,
    pub multiplications_per_second: f64,
    pub additions_per_second: f64,
}

impl Complexity {
    /// Five multiplies and four adds per stage per sample
    pub fn new(stages: usize, sample_rate: u32) -> Self {
        let multiplications_per_sample = 5 * stages;
        let additions_per_sample = 4 * stages;
        let fs = f64::from(sample_rate);
        Self {
            multiplications_per_sample,
            additions_per_sample,
            multiplications_per_second: multiplications_per_sample as f64 * fs,
            additions_per_second: additions_per_sample as f64 * fs,
        }
    }
}

/// Snapshot of a bank's configuration and current coefficients
#[derive(Debug, Clone)]
pub struct BankReport {
    pub mode: ProcessingMode,
    pub sample_rate: u32,
    pub channels: usize,
    pub max_stages: usize,
    pub filters: FilterList,
    /// Current coefficients, in cascade order
    pub coefficients: Vec<Biquad>,
}

impl BankReport {
    pub fn new(
        mode: ProcessingMode,
        sample_rate: u32,
        channels: usize,
        max_stages: usize,
        filters: FilterList,
        coefficients: Vec<Biquad>,
    ) -> Self {
        Self {
            mode,
            sample_rate,
            channels,
            max_stages,
            filters,
            coefficients,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.coefficients.len()
    }

    pub fn complexity(&self) -> Complexity {
        Complexity::new(self.stage_count(), self.sample_rate)
    }
}

/// Plain-language reading of a filter's parameters
fn describe(spec: &FilterSpec) -> String {
    match spec {
        FilterSpec::Shelf(s) => format!(
            "{:.1} dB below {:.0} Hz, {:.1} dB in range {:.0} - {:.0} Hz, {:.1} dB above {:.0} Hz",
            s.gain_low(),
            s.freq_low(),
            s.gain_middle(),
            s.freq_low(),
            s.freq_high(),
            s.gain_high(),
            s.freq_high()
        ),
        FilterSpec::Peq(p) => format!(
            "{:.1} dB at DC, peak of {:.2} dB at {:.2} Hz with {:.2} oct bandwidth and {:.2} dB at edges",
            p.gain_dc(),
            p.gain_peak(),
            p.freq_peak(),
            p.bandwidth(),
            p.gain_bandwidth()
        ),
        FilterSpec::LowPass(p) | FilterSpec::HighPass(p) => format!(
            "cutoff frequency at {:.2} Hz with ripples at {:.2}% and order {}",
            p.freq(),
            p.ripple(),
            p.order()
        ),
    }
}

impl fmt::Display for BankReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ProcessingMode::Smooth => writeln!(
                f,
                "Smooth mode: coefficients linearly interpolated over one buffer"
            )?,
            ProcessingMode::Fast => writeln!(
                f,
                "Fast mode: no interpolation when filter parameters change"
            )?,
        }
        writeln!(f, "Audio sampling rate: {} Hz", self.sample_rate)?;
        writeln!(f, "Number of audio channels: {}", self.channels)?;
        writeln!(f, "Max number of biquads: {}", self.max_stages)?;

        let mut stage = 0;
        for (index, spec) in self.filters.iter().enumerate() {
            writeln!(f, "Filter {:2} | {}", index + 1, spec)?;
            writeln!(f, "          | i.e. {}", describe(spec))?;
            for _ in 0..spec.stage_count() {
                if let Some(c) = self.coefficients.get(stage) {
                    writeln!(
                        f,
                        "          | Coeffs: [{:.6} {:.6} {:.6} {:.6} {:.6}]",
                        c.a0, c.a1, c.a2, c.b1, c.b2
                    )?;
                }
                stage += 1;
            }
        }

        let complexity = self.complexity();
        writeln!(f, "Number of filters: {}", self.filters.len())?;
        writeln!(f, "Number of biquads: {}", self.stage_count())?;
        writeln!(
            f,
            "Complexity per sample: {} multiplications, {} additions",
            complexity.multiplications_per_sample, complexity.additions_per_sample
        )?;
        write!(
            f,
            "Complexity per second: {:.0} multiplications, {:.0} additions",
            complexity.multiplications_per_second, complexity.additions_per_second
        )
    }
}
