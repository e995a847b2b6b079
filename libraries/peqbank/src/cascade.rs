//! Cascade executor
//!
//! Runs the biquad chain over planar channel buffers, stage-major: every
//! stage sweeps every channel over the whole buffer before the next stage
//! starts. Filter history is owned here and persists across buffers.

use crate::coefficients::CoefficientSet;
use crate::design::Biquad;
use crate::error::Result;

/// Direct form I history of one stage on one channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl BiquadState {
    /// Zero subnormal history values so feedback tails don't stall the FPU
    #[inline]
    fn flushed(self) -> Self {
        Self {
            x1: flush_to_zero(self.x1),
            x2: flush_to_zero(self.x2),
            y1: flush_to_zero(self.y1),
            y2: flush_to_zero(self.y2),
        }
    }
}

#[inline]
fn flush_to_zero(value: f32) -> f32 {
    if value.is_subnormal() {
        0.0
    } else {
        value
    }
}

/// Which coefficients to run for one buffer
#[derive(Debug, Clone, Copy)]
pub enum CascadePlan<'a> {
    /// Apply `set` for the whole buffer
    Fast(&'a CoefficientSet),
    /// Interpolate linearly from `from` to `to` over the buffer
    ///
    /// Stages `from` does not have start at `pad`.
    Smooth {
        from: &'a CoefficientSet,
        to: &'a CoefficientSet,
        pad: Biquad,
    },
}

impl CascadePlan<'_> {
    fn stage_count(&self) -> usize {
        match self {
            Self::Fast(set) => set.len(),
            Self::Smooth { to, .. } => to.len(),
        }
    }
}

/// Per-stage, per-channel biquad recursion with persistent history
#[derive(Debug, Clone)]
pub struct Cascade {
    channels: usize,
    capacity: usize,
    history: Vec<BiquadState>,
}

impl Cascade {
    /// Allocate zeroed history for `capacity` stages on `channels` channels
    pub fn new(channels: usize, capacity: usize) -> Result<Self> {
        Ok(Self {
            channels,
            capacity,
            history: Self::allocate(channels, capacity)?,
        })
    }

    fn allocate(channels: usize, capacity: usize) -> Result<Vec<BiquadState>> {
        let len = channels.saturating_mul(capacity);
        let mut history = Vec::new();
        history.try_reserve_exact(len)?;
        history.resize(len, BiquadState::default());
        Ok(history)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Stage capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// History of `stage` on `channel`
    pub fn state(&self, stage: usize, channel: usize) -> Option<BiquadState> {
        if channel >= self.channels {
            return None;
        }
        self.history.get(stage * self.channels + channel).copied()
    }

    /// Zero all history
    pub fn reset(&mut self) {
        self.history.fill(BiquadState::default());
    }

    /// Reallocate (zeroed) history for a new stage capacity
    pub fn resize(&mut self, capacity: usize) -> Result<()> {
        self.history = Self::allocate(self.channels, capacity)?;
        self.capacity = capacity;
        Ok(())
    }

    /// Copy `input` into `output`, then filter `output` in place
    ///
    /// Returns the frames processed per stage, 0 when there are no stages.
    pub fn process(
        &mut self,
        input: &[Vec<f32>],
        output: &mut [Vec<f32>],
        frames: usize,
        plan: CascadePlan<'_>,
    ) -> usize {
        for (src, dst) in input.iter().zip(output.iter_mut()) {
            let n = frames.min(src.len()).min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
        }
        self.process_in_place(output, frames, plan)
    }

    /// Filter the first `frames` samples of each channel buffer in place
    pub fn process_in_place(
        &mut self,
        buffers: &mut [Vec<f32>],
        frames: usize,
        plan: CascadePlan<'_>,
    ) -> usize {
        let stages = plan.stage_count().min(self.capacity);
        if stages == 0 || frames == 0 {
            return 0;
        }

        let rate = 1.0 / frames as f32;
        let channels = self.channels;

        for stage in 0..stages {
            let (start, step) = match plan {
                CascadePlan::Fast(set) => (set.stage(stage), None),
                CascadePlan::Smooth { from, to, pad } => {
                    let start = if stage < from.len() {
                        from.stage(stage)
                    } else {
                        pad
                    };
                    (start, Some(increment(start, to.stage(stage), rate)))
                }
            };

            for (channel, buffer) in buffers.iter_mut().enumerate().take(channels) {
                let n = frames.min(buffer.len());
                let state = &mut self.history[stage * channels + channel];
                *state = match step {
                    None => run_fixed(&mut buffer[..n], start, *state),
                    Some(step) => run_interpolated(&mut buffer[..n], start, step, *state),
                };
            }
        }

        frames
    }
}

fn increment(start: Biquad, target: Biquad, rate: f32) -> Biquad {
    Biquad::new(
        (target.a0 - start.a0) * rate,
        (target.a1 - start.a1) * rate,
        (target.a2 - start.a2) * rate,
        (target.b1 - start.b1) * rate,
        (target.b2 - start.b2) * rate,
    )
}

#[inline]
fn run_fixed(buffer: &mut [f32], c: Biquad, state: BiquadState) -> BiquadState {
    let BiquadState {
        mut x1,
        mut x2,
        mut y1,
        mut y2,
    } = state;

    for sample in buffer.iter_mut() {
        let x = *sample;
        let y = c.a0 * x + c.a1 * x1 + c.a2 * x2 - c.b1 * y1 - c.b2 * y2;
        *sample = y;
        x2 = x1;
        x1 = x;
        y2 = y1;
        y1 = y;
    }

    BiquadState { x1, x2, y1, y2 }.flushed()
}

#[inline]
fn run_interpolated(
    buffer: &mut [f32],
    start: Biquad,
    step: Biquad,
    state: BiquadState,
) -> BiquadState {
    let BiquadState {
        mut x1,
        mut x2,
        mut y1,
        mut y2,
    } = state;
    let mut c = start;

    for sample in buffer.iter_mut() {
        let x = *sample;
        let y = c.a0 * x + c.a1 * x1 + c.a2 * x2 - c.b1 * y1 - c.b2 * y2;
        *sample = y;
        x2 = x1;
        x1 = x;
        y2 = y1;
        y1 = y;

        c.a0 += step.a0;
        c.a1 += step.a1;
        c.a2 += step.a2;
        c.b1 += step.b1;
        c.b2 += step.b2;
    }

    BiquadState { x1, x2, y1, y2 }.flushed()
}
