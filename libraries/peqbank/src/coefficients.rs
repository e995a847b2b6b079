//! Fixed-capacity coefficient storage

use crate::design::Biquad;
use crate::error::Result;

/// Arena of biquad quintuples indexed by stage
///
/// Capacity is fixed at construction. Writing, clearing and copying between
/// sets of equal capacity never allocate, so sets can be touched from the
/// audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSet {
    stages: Vec<Biquad>,
    len: usize,
    generation: u64,
}

impl CoefficientSet {
    /// Allocate a zeroed set with room for `capacity` stages
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut stages = Vec::new();
        stages.try_reserve_exact(capacity)?;
        stages.resize(capacity, Biquad::ZERO);
        Ok(Self {
            stages,
            len: 0,
            generation: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.stages.len()
    }

    /// Number of active stages
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Publish generation this set was designed for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Stage `index`, or `Biquad::ZERO` past the active length
    pub fn stage(&self, index: usize) -> Biquad {
        if index < self.len {
            self.stages[index]
        } else {
            Biquad::ZERO
        }
    }

    /// Active stages in cascade order
    pub fn stages(&self) -> &[Biquad] {
        &self.stages[..self.len]
    }

    /// Overwrite one stage; indices beyond capacity are ignored
    pub(crate) fn write(&mut self, index: usize, stage: Biquad) {
        if let Some(slot) = self.stages.get_mut(index) {
            *slot = stage;
        }
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(self.stages.len());
    }

    /// Zero every stage and the active length
    pub fn clear(&mut self) {
        self.stages.fill(Biquad::ZERO);
        self.len = 0;
        self.generation = 0;
    }

    /// Copy stages, length and generation from `other` without allocating
    pub(crate) fn copy_from(&mut self, other: &Self) {
        let n = self.stages.len().min(other.stages.len());
        self.stages[..n].copy_from_slice(&other.stages[..n]);
        self.stages[n..].fill(Biquad::ZERO);
        self.len = other.len.min(n);
        self.generation = other.generation;
    }

    /// Linear magnitude response of the whole cascade at `freq` Hz
    pub fn response(&self, freq: f32, sample_rate: f32) -> f32 {
        self.stages()
            .iter()
            .map(|stage| stage.response(freq, sample_rate))
            .product()
    }
}
