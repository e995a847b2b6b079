//! Filter bank
//!
//! [`PeqBank`] owns the render side: channel buffers, filter history and the
//! executor's copies of the coefficients. The coefficient ring and the filter
//! list live in state shared with any number of [`BankController`] handles.
//!
//! Control calls lock the shared state, design into the ring's pending slot
//! and publish. Render calls only ever `try_lock`: when the lock is busy the
//! buffer is rendered with the coefficients already held, and the new set is
//! picked up on the next buffer.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, error, info, warn};

use crate::cascade::{BiquadState, Cascade, CascadePlan};
use crate::coefficients::CoefficientSet;
use crate::config::BankConfig;
use crate::design::{design_into, Biquad};
use crate::error::{PeqError, Result, RingError};
use crate::filters::FilterList;
use crate::format::{deinterleave, f32_to_i16, i16_to_f32, interleave};
use crate::report::BankReport;
use crate::ring::CoefficientRing;
use crate::MAX_STAGES;

/// How coefficient changes reach the audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// New coefficients apply from the first sample of the next buffer
    Fast,
    /// New coefficients are linearly interpolated over one buffer
    #[default]
    Smooth,
}

/// State shared between the render side and controllers
#[derive(Debug)]
struct SharedState {
    ring: CoefficientRing,
    filters: FilterList,
    sample_rate: f32,
    /// Bumped whenever history must be zeroed (setup, reset, capacity change)
    history_epoch: u64,
}

impl SharedState {
    fn check_capacity(&self, filters: &FilterList) -> Result<()> {
        let requested = filters.stage_count();
        let capacity = self.ring.capacity();
        if requested > capacity {
            warn!(requested, capacity, "Filter list exceeds stage capacity, not published");
            return Err(PeqError::CapacityExceeded {
                requested,
                capacity,
            });
        }
        Ok(())
    }

    /// Design the stored list into the pending slot and publish it
    fn compute(&mut self, restart: bool) -> Result<(usize, u64)> {
        let set = self.ring.stage().map_err(protocol_violation)?;
        let stages = match design_into(self.sample_rate, &self.filters, set) {
            Ok(stages) => stages,
            Err(e) => {
                self.ring.abandon();
                return Err(e);
            }
        };
        let generation = self.ring.publish(restart).map_err(protocol_violation)?;
        Ok((stages, generation))
    }

    /// Zero all slots and signal the executor to zero its history
    fn restart(&mut self) {
        self.ring.clear();
        self.history_epoch += 1;
    }
}

fn protocol_violation(e: RingError) -> PeqError {
    error!(error = %e, "Coefficient ring protocol violation");
    PeqError::Protocol(e)
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn try_lock(shared: &Mutex<SharedState>) -> Option<MutexGuard<'_, SharedState>> {
    match shared.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Cloneable control handle for redesigning filters from another thread
///
/// Controllers may block briefly on the shared lock; the render side never does.
#[derive(Debug, Clone)]
pub struct BankController {
    shared: Arc<Mutex<SharedState>>,
}

impl BankController {
    /// Replace the filter list, zero all coefficients and history, and publish
    ///
    /// In smooth mode the next buffer fades the new cascade in from silence.
    /// Returns the number of biquad stages.
    pub fn setup(&self, filters: FilterList) -> Result<usize> {
        let mut state = lock(&self.shared);
        state.check_capacity(&filters)?;

        state.restart();
        state.filters = filters;
        let (stages, generation) = state.compute(true)?;

        info!(
            filters = state.filters.len(),
            stages, generation, "Filter bank set up"
        );
        Ok(stages)
    }

    /// Replace the filter list and publish, keeping history
    ///
    /// In smooth mode the next buffer interpolates from the coefficients the
    /// render side is currently running; stages that did not exist before
    /// start from pass-through.
    pub fn update(&self, filters: FilterList) -> Result<usize> {
        let mut state = lock(&self.shared);
        state.check_capacity(&filters)?;

        let previous = std::mem::replace(&mut state.filters, filters);
        match state.compute(false) {
            Ok((stages, generation)) => {
                debug!(
                    filters = state.filters.len(),
                    stages, generation, "Filter bank updated"
                );
                Ok(stages)
            }
            Err(e) => {
                state.filters = previous;
                Err(e)
            }
        }
    }

    /// The stored filter list
    pub fn filters(&self) -> FilterList {
        lock(&self.shared).filters.clone()
    }

    /// Stages in the newest published set
    pub fn stage_count(&self) -> usize {
        lock(&self.shared).ring.current().len()
    }

    /// Generation of the newest published set
    pub fn generation(&self) -> u64 {
        lock(&self.shared).ring.generation()
    }
}

/// Multi-channel cascaded biquad filter bank
#[derive(Debug)]
pub struct PeqBank {
    controller: BankController,
    cascade: Cascade,
    /// Executor copy of the current set
    active: CoefficientSet,
    /// Executor copy of the set a transition starts from
    previous: CoefficientSet,
    history_epoch: u64,
    mode: ProcessingMode,
    sample_rate: u32,
    channels: usize,
    buffer_size: usize,
    max_stages: usize,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
}

fn allocate_channels(channels: usize, frames: usize) -> Result<Vec<Vec<f32>>> {
    let mut buffers = Vec::new();
    buffers.try_reserve_exact(channels)?;
    for _ in 0..channels {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(frames)?;
        buffer.resize(frames, 0.0);
        buffers.push(buffer);
    }
    Ok(buffers)
}

impl PeqBank {
    /// Create a bank with an empty filter list (unity pass-through)
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `channels` - Number of interleaved channels
    /// * `buffer_size` - Maximum frames per render call
    pub fn new(sample_rate: u32, channels: usize, buffer_size: usize) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PeqError::InvalidSampleRate(sample_rate));
        }
        if channels == 0 {
            return Err(PeqError::InvalidChannelCount(channels));
        }
        if buffer_size == 0 {
            return Err(PeqError::InvalidBufferSize(buffer_size));
        }

        let shared = SharedState {
            ring: CoefficientRing::new(MAX_STAGES)?,
            filters: FilterList::new(),
            sample_rate: sample_rate as f32,
            history_epoch: 0,
        };

        let bank = Self {
            controller: BankController {
                shared: Arc::new(Mutex::new(shared)),
            },
            cascade: Cascade::new(channels, MAX_STAGES)?,
            active: CoefficientSet::with_capacity(MAX_STAGES)?,
            previous: CoefficientSet::with_capacity(MAX_STAGES)?,
            history_epoch: 0,
            mode: ProcessingMode::default(),
            sample_rate,
            channels,
            buffer_size,
            max_stages: MAX_STAGES,
            input: allocate_channels(channels, buffer_size)?,
            output: allocate_channels(channels, buffer_size)?,
        };

        info!(
            sample_rate,
            channels,
            buffer_size,
            max_stages = MAX_STAGES,
            "Created filter bank"
        );
        Ok(bank)
    }

    /// Create a bank from configuration and set up its filter list
    pub fn from_config(config: &BankConfig) -> Result<Self> {
        config.validate()?;
        let filters = config.filter_list()?;

        let mut bank = Self::new(config.sample_rate, config.channels, config.buffer_size)?;
        bank.set_mode(config.mode);
        if config.max_stages != bank.max_stages {
            bank.set_max_stages(config.max_stages)?;
        }
        bank.setup(filters)?;
        Ok(bank)
    }

    /// Handle for redesigning filters from a control thread
    pub fn controller(&self) -> BankController {
        self.controller.clone()
    }

    /// See [`BankController::setup`]
    pub fn setup(&mut self, filters: FilterList) -> Result<usize> {
        self.controller.setup(filters)
    }

    /// See [`BankController::update`]
    pub fn update(&mut self, filters: FilterList) -> Result<usize> {
        self.controller.update(filters)
    }

    /// Reallocate the channel buffers for a new maximum render size
    pub fn resize_buffer(&mut self, frames: usize) -> Result<()> {
        if frames == 0 {
            return Err(PeqError::InvalidBufferSize(frames));
        }
        let input = allocate_channels(self.channels, frames)?;
        let output = allocate_channels(self.channels, frames)?;
        self.input = input;
        self.output = output;
        self.buffer_size = frames;
        debug!(buffer_size = frames, "Resized render buffers");
        Ok(())
    }

    /// Change the biquad stage capacity
    ///
    /// Reallocates coefficients and history, then recomputes the stored list.
    /// Fails if the stored list does not fit the new capacity.
    pub fn set_max_stages(&mut self, max_stages: usize) -> Result<()> {
        if max_stages == 0 {
            return Err(PeqError::InvalidStageCapacity(max_stages));
        }
        if max_stages == self.max_stages {
            return Ok(());
        }

        let mut state = lock(&self.controller.shared);
        let requested = state.filters.stage_count();
        if requested > max_stages {
            return Err(PeqError::CapacityExceeded {
                requested,
                capacity: max_stages,
            });
        }

        let cascade = Cascade::new(self.channels, max_stages)?;
        let active = CoefficientSet::with_capacity(max_stages)?;
        let previous = CoefficientSet::with_capacity(max_stages)?;
        state.ring.resize(max_stages)?;

        self.cascade = cascade;
        self.active = active;
        self.previous = previous;
        self.max_stages = max_stages;

        state.history_epoch += 1;
        state.compute(true)?;
        info!(max_stages, "Changed stage capacity");
        Ok(())
    }

    /// Restore the default stage capacity, zero everything and recompute
    ///
    /// Fails without touching the bank if the stored list does not fit the
    /// default capacity.
    pub fn reset(&mut self) -> Result<()> {
        let mut state = lock(&self.controller.shared);
        let requested = state.filters.stage_count();
        if requested > MAX_STAGES {
            warn!(
                requested,
                capacity = MAX_STAGES,
                "Stored filter list exceeds default capacity, bank not reset"
            );
            return Err(PeqError::CapacityExceeded {
                requested,
                capacity: MAX_STAGES,
            });
        }

        if self.max_stages != MAX_STAGES {
            let cascade = Cascade::new(self.channels, MAX_STAGES)?;
            let active = CoefficientSet::with_capacity(MAX_STAGES)?;
            let previous = CoefficientSet::with_capacity(MAX_STAGES)?;
            state.ring.resize(MAX_STAGES)?;

            self.cascade = cascade;
            self.active = active;
            self.previous = previous;
            self.max_stages = MAX_STAGES;
        }

        state.restart();
        let (stages, generation) = state.compute(true)?;
        info!(stages, generation, "Filter bank reset");
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Stages in the newest published set
    pub fn stage_count(&self) -> usize {
        self.controller.stage_count()
    }

    /// The stored filter list
    pub fn filters(&self) -> FilterList {
        self.controller.filters()
    }

    /// Generation of the newest published set
    pub fn generation(&self) -> u64 {
        self.controller.generation()
    }

    /// Generation of the set the render side is running
    pub fn active_generation(&self) -> u64 {
        self.active.generation()
    }

    /// The coefficients the render side is running
    pub fn active_coefficients(&self) -> &CoefficientSet {
        &self.active
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Maximum frames per render call
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn max_stages(&self) -> usize {
        self.max_stages
    }

    /// Filter history of `stage` on `channel`
    pub fn history(&self, stage: usize, channel: usize) -> Option<BiquadState> {
        self.cascade.state(stage, channel)
    }

    /// Human-readable description of the bank and its current coefficients
    pub fn report(&self) -> BankReport {
        let state = lock(&self.controller.shared);
        BankReport::new(
            self.mode,
            self.sample_rate,
            self.channels,
            self.max_stages,
            state.filters.clone(),
            state.ring.current().stages().to_vec(),
        )
    }

    /// Filter interleaved 16-bit frames
    ///
    /// Returns frames processed per stage (0 when the list is empty).
    pub fn render_i16(&mut self, input: &[i16], output: &mut [i16]) -> Result<usize> {
        let frames = self.frames_for(input.len(), output.len())?;
        deinterleave(input, &mut self.input, frames, i16_to_f32);
        let processed = self.run(frames)?;
        interleave(&self.output, output, frames, f32_to_i16);
        Ok(processed)
    }

    /// Filter interleaved float frames
    pub fn render_f32(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize> {
        let frames = self.frames_for(input.len(), output.len())?;
        deinterleave(input, &mut self.input, frames, |s| s);
        let processed = self.run(frames)?;
        interleave(&self.output, output, frames, |s| s);
        Ok(processed)
    }

    /// Filter interleaved float frames in place
    pub fn render_f32_in_place(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let frames = self.frames_for(buffer.len(), buffer.len())?;
        deinterleave(buffer, &mut self.input, frames, |s| s);
        let processed = self.run(frames)?;
        interleave(&self.output, buffer, frames, |s| s);
        Ok(processed)
    }

    fn frames_for(&self, input: usize, output: usize) -> Result<usize> {
        if input != output || input % self.channels != 0 {
            return Err(PeqError::BufferMismatch {
                input,
                output,
                channels: self.channels,
            });
        }
        let frames = input / self.channels;
        if frames > self.buffer_size {
            return Err(PeqError::BufferTooLarge {
                frames,
                capacity: self.buffer_size,
            });
        }
        Ok(frames)
    }

    /// Pick up newly published coefficients without blocking
    ///
    /// Returns the pad for a transition to interpolate, `None` when there is
    /// nothing new or the lock is busy.
    fn pick_up(&mut self) -> Result<Option<Biquad>> {
        let Some(mut state) = try_lock(&self.controller.shared) else {
            return Ok(None);
        };

        if state.history_epoch != self.history_epoch {
            self.cascade.reset();
            self.history_epoch = state.history_epoch;
        }

        let pad = match state.ring.transition() {
            Some((previous, current, restart)) => {
                self.previous.copy_from(previous);
                self.active.copy_from(current);
                if restart {
                    Biquad::ZERO
                } else {
                    Biquad::IDENTITY
                }
            }
            None => return Ok(None),
        };

        state.ring.rotate().map_err(protocol_violation)?;
        Ok(Some(pad))
    }

    fn run(&mut self, frames: usize) -> Result<usize> {
        // An empty buffer must not consume a pending transition
        if frames == 0 {
            return Ok(0);
        }
        let transition = self.pick_up()?;

        let plan = match (self.mode, transition) {
            (ProcessingMode::Smooth, Some(pad)) => CascadePlan::Smooth {
                from: &self.previous,
                to: &self.active,
                pad,
            },
            _ => CascadePlan::Fast(&self.active),
        };

        Ok(self.cascade.process(&self.input, &mut self.output, frames, plan))
    }
}
