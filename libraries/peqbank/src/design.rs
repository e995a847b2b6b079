//! Coefficient designer
//!
//! Pure functions that turn filter specs into biquad coefficient quintuples.
//! All designs use the direct form I convention
//! `y[n] = a0 x[n] + a1 x[n-1] + a2 x[n-2] - b1 y[n-1] - b2 y[n-2]`.

use std::f64::consts::{LN_2, PI, TAU};
use tracing::warn;

use crate::coefficients::CoefficientSet;
use crate::error::{PeqError, Result};
use crate::filters::{FilterList, FilterSpec, PassKind, PassParams, PeqParams, ShelfParams};

/// One biquad stage: feed-forward `a0..a2`, feedback `b1, b2`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Biquad {
    pub a0: f32,
    pub a1: f32,
    pub a2: f32,
    pub b1: f32,
    pub b2: f32,
}

impl Biquad {
    /// All-zero stage (silences its input)
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0, 0.0);

    /// Pass-through stage
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0, 0.0);

    pub const fn new(a0: f32, a1: f32, a2: f32, b1: f32, b2: f32) -> Self {
        Self { a0, a1, a2, b1, b2 }
    }

    /// Frequency-independent gain stage
    pub const fn flat(gain: f32) -> Self {
        Self::new(gain, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }

    pub fn to_array(&self) -> [f32; 5] {
        [self.a0, self.a1, self.a2, self.b1, self.b2]
    }

    /// Linear magnitude response at `freq` Hz
    ///
    /// Evaluates `H(z) = (a0 + a1 z^-1 + a2 z^-2) / (1 + b1 z^-1 + b2 z^-2)`
    /// at `z = e^(jw)`, `w = 2 pi freq / sample_rate`.
    pub fn response(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = TAU * f64::from(freq) / f64::from(sample_rate);
        let (sin1, cos1) = w.sin_cos();
        let (sin2, cos2) = (2.0 * w).sin_cos();

        let (a0, a1, a2) = (f64::from(self.a0), f64::from(self.a1), f64::from(self.a2));
        let (b1, b2) = (f64::from(self.b1), f64::from(self.b2));

        let num_re = a0 + a1 * cos1 + a2 * cos2;
        let num_im = -(a1 * sin1 + a2 * sin2);
        let den_re = 1.0 + b1 * cos1 + b2 * cos2;
        let den_im = -(b1 * sin1 + b2 * sin2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        (num / den).sqrt() as f32
    }

    /// Magnitude response in dB at `freq` Hz
    pub fn magnitude_db(&self, freq: f32, sample_rate: f32) -> f32 {
        20.0 * self.response(freq, sample_rate).log10()
    }
}

#[inline]
fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db * 0.05)
}

/// Shelving EQ: a low shelf and a high shelf folded into one biquad
///
/// DC gain is `gain_low`, Nyquist gain is `gain_high`.
pub fn design_shelf(sample_rate: f32, params: &ShelfParams) -> Biquad {
    let g1 = db_to_gain(params.gain_low() - params.gain_middle());
    let g2 = db_to_gain(params.gain_middle() - params.gain_high());
    let gh = db_to_gain(params.gain_high());

    let pi = std::f32::consts::PI;

    // Low shelf
    let x = (params.freq_low() * pi / sample_rate).tan() / g1.sqrt();
    let l1 = (x - 1.0) / (x + 1.0);
    let l2 = (g1 * x - 1.0) / (g1 * x + 1.0);
    let l3 = (g1 * x + 1.0) / (x + 1.0);

    // High shelf
    let y = (params.freq_high() * pi / sample_rate).tan() / g2.sqrt();
    let h1 = (y - 1.0) / (y + 1.0);
    let h2 = (g2 * y - 1.0) / (g2 * y + 1.0);
    let h3 = (g2 * y + 1.0) / (y + 1.0);

    let c0 = l3 * h3 * gh;

    Biquad::new(c0, c0 * (l2 + h2), c0 * l2 * h2, l1 + h1, l1 * h1)
}

/// Parametric EQ with prescribed Nyquist gain (Orfanidis)
///
/// Evaluated in `f64`. Gain at DC is `gain_dc`, at `freq_peak` it is
/// `gain_peak`. Gains are corrected first (see [`PeqParams::new`]); a result
/// that is still not finite falls back to a flat `gain_dc` stage.
pub fn design_peq(sample_rate: f32, params: &PeqParams) -> Biquad {
    let params = &PeqParams::new(
        params.freq_peak(),
        params.bandwidth(),
        params.gain_dc(),
        params.gain_peak(),
        params.gain_bandwidth(),
    );
    let fs = f64::from(sample_rate);
    let bandwidth = f64::from(params.bandwidth());

    let gain = |db: f32| 10.0_f64.powf(f64::from(db) * 0.05);
    let g0 = gain(params.gain_dc());
    let g = gain(params.gain_peak());
    let gb = gain(params.gain_bandwidth());

    let w0 = TAU * f64::from(params.freq_peak()) / fs;
    let pi2 = PI * PI;
    let g02 = g0 * g0;
    let gb2 = gb * gb;
    let g2 = g * g;
    let w02 = w0 * w0;

    let v1 = 1.0 / (g2 - gb2).abs();
    let v2 = (g2 - g02).abs();
    let v3 = (gb2 - g02).abs();
    let v4 = (w02 - pi2) * (w02 - pi2);

    // Gain at Nyquist, matched to the analog prototype
    let dw = 2.0 * w0 * (LN_2 * 0.5 * bandwidth).sinh();
    let m2 = v3 * pi2 * dw * dw;
    let g1 = ((g02 * v4 + g2 * m2 * v1) / (v4 + m2 * v1)).sqrt();
    let g12 = g1 * g1;

    let m3 = g0 * g1;
    let v5 = (g2 - m3).abs();
    let v6 = (g2 - g12).abs();
    let v7 = (gb2 - m3).abs();
    let v8 = (gb2 - g12).abs();
    let v9 = ((v3 * v6) / (v8 * v2)).sqrt();

    let tan0 = (w0 * 0.5).tan();
    let w1 = w0 * (-0.5 * bandwidth).exp2();
    let tan1 = (w1 * 0.5).tan();
    let tan2 = v9 * tan0 * tan0 / tan1;

    let w2 = (v6 / v2).sqrt() * tan0 * tan0;
    let dw_edges = tan2 - tan1;

    let c = v8 * dw_edges * dw_edges - 2.0 * w2 * (v7 - (v3 * v8).sqrt());
    let d = 2.0 * w2 * (v5 - (v2 * v6).sqrt());
    let a = ((c + d) * v1).sqrt();
    let b = ((g2 * c + gb2 * d) * v1).sqrt();

    let norm = 1.0 / (1.0 + w2 + a);

    let biquad = Biquad::new(
        ((g1 + g0 * w2 + b) * norm) as f32,
        (-2.0 * (g1 - g0 * w2) * norm) as f32,
        ((g1 - b + g0 * w2) * norm) as f32,
        (-2.0 * (1.0 - w2) * norm) as f32,
        ((1.0 + w2 - a) * norm) as f32,
    );

    if biquad.is_finite() {
        biquad
    } else {
        warn!(
            freq_peak = params.freq_peak(),
            bandwidth = params.bandwidth(),
            gain_dc = params.gain_dc(),
            gain_peak = params.gain_peak(),
            gain_bandwidth = params.gain_bandwidth(),
            "Degenerate parametric EQ design, substituting flat gain stage"
        );
        Biquad::flat(g0 as f32)
    }
}

/// Ripple-parameterised low-pass or high-pass, one biquad per pole pair
///
/// Poles start on the unit circle (Butterworth) and are warped onto the
/// Chebyshev ellipse when `ripple > 0`. Each stage is normalised to unity gain
/// at DC (low-pass) or Nyquist (high-pass).
pub fn design_pass(
    sample_rate: f32,
    params: &PassParams,
    kind: PassKind,
) -> impl Iterator<Item = Biquad> {
    let fc = f64::from(params.freq()) / f64::from(sample_rate);
    let ripple = f64::from(params.ripple());
    let order = f64::from(params.order());

    (0..params.stage_count()).map(move |pole| pass_stage(fc, ripple, order, pole as f64, kind))
}

fn pass_stage(fc: f64, ripple: f64, order: f64, pole: f64, kind: PassKind) -> Biquad {
    // Pole location on the unit circle
    let angle = PI / (order * 2.0) + pole * PI / order;
    let mut rp = -angle.cos();
    let mut ip = angle.sin();

    // Warp from a circle to an ellipse
    if ripple != 0.0 {
        let r = 100.0 / (100.0 - ripple);
        let es = (r * r - 1.0).sqrt();
        let vx = (1.0 / order) * ((1.0 / es) + ((1.0 / (es * es)) + 1.0).sqrt()).ln();
        let kx = (1.0 / order) * ((1.0 / es) + ((1.0 / (es * es)) - 1.0).sqrt()).ln();
        let kx = kx.cosh();
        rp = rp * vx.sinh() / kx;
        ip = ip * vx.cosh() / kx;
    }

    // s-domain to z-domain
    let t = 2.0 * 0.5_f64.tan();
    let w = TAU * fc;
    let m = rp * rp + ip * ip;
    let t2 = t * t;
    let d = 4.0 - 4.0 * rp * t + m * t2;
    let x0 = t2 / d;
    let x1 = 2.0 * t2 / d;
    let x2 = t2 / d;
    let y1 = (8.0 - 2.0 * m * t2) / d;
    let y2 = (-4.0 - 4.0 * rp * t - m * t2) / d;

    // Low-pass to low-pass, or low-pass to high-pass
    let k = match kind {
        PassKind::HighPass => -(w / 2.0 + 0.5).cos() / (w / 2.0 - 0.5).cos(),
        PassKind::LowPass => (0.5 - w / 2.0).sin() / (0.5 + w / 2.0).sin(),
    };
    let k2 = k * k;

    let d = 1.0 + y1 * k - y2 * k2;
    let a0 = (x0 - x1 * k + x2 * k2) / d;
    let mut a1 = (-2.0 * x0 * k + x1 + x1 * k2 - 2.0 * x2 * k) / d;
    let a2 = (x0 * k2 - x1 * k + x2) / d;
    let mut b1 = (2.0 * k + y1 + y1 * k2 - 2.0 * y2 * k) / d;
    let b2 = (-k2 - y1 * k + y2) / d;
    let gain = (1.0 - (b1 + b2)) / (a0 + a1 + a2);

    if kind == PassKind::HighPass {
        a1 = -a1;
        b1 = -b1;
    }

    Biquad::new(
        (a0 * gain) as f32,
        (a1 * gain) as f32,
        (a2 * gain) as f32,
        (-b1) as f32,
        (-b2) as f32,
    )
}

/// Expand one filter into its stages
pub fn design_filter(sample_rate: f32, spec: &FilterSpec) -> Vec<Biquad> {
    let mut stages = Vec::with_capacity(spec.stage_count());
    for_each_stage(sample_rate, spec, |stage| stages.push(stage));
    stages
}

fn for_each_stage(sample_rate: f32, spec: &FilterSpec, mut emit: impl FnMut(Biquad)) {
    match spec {
        FilterSpec::Shelf(params) => emit(design_shelf(sample_rate, params)),
        FilterSpec::Peq(params) => emit(design_peq(sample_rate, params)),
        FilterSpec::LowPass(params) => {
            design_pass(sample_rate, params, PassKind::LowPass).for_each(emit);
        }
        FilterSpec::HighPass(params) => {
            design_pass(sample_rate, params, PassKind::HighPass).for_each(emit);
        }
    }
}

/// Design a whole list into `set`, in cascade order
///
/// Stage offsets follow list position. Fails without touching `set` when the
/// list needs more stages than the set can hold. Never allocates.
pub fn design_into(
    sample_rate: f32,
    filters: &FilterList,
    set: &mut CoefficientSet,
) -> Result<usize> {
    let requested = filters.stage_count();
    if requested > set.capacity() {
        return Err(PeqError::CapacityExceeded {
            requested,
            capacity: set.capacity(),
        });
    }

    set.clear();
    let mut index = 0;
    for spec in filters {
        for_each_stage(sample_rate, spec, |stage| {
            set.write(index, stage);
            index += 1;
        });
    }
    set.set_len(index);
    Ok(index)
}
