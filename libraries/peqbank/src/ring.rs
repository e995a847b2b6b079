//! Coefficient buffer ring
//!
//! Four coefficient slots, each tagged with the role it currently plays in
//! the hand-off between the designer (control side) and the cascade executor
//! (audio side):
//!
//! - `Pending`: being written by the designer, never read by the executor
//! - `Current`: the newest published set
//! - `Previous`: the set the executor was running before the latest publish,
//!   kept until the executor has consumed the transition
//! - `Free`: available for the next design
//!
//! At rest there is exactly one `Current`, at most one `Previous`, at most one
//! `Pending` and therefore always at least one `Free` slot.

use crate::coefficients::CoefficientSet;
use crate::error::{Result, RingError};

const SLOT_COUNT: usize = 4;

/// Role of one ring slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    Free,
    Pending,
    Current,
    Previous,
}

/// Four-slot coefficient ring with role tags
#[derive(Debug, Clone)]
pub struct CoefficientRing {
    slots: [CoefficientSet; SLOT_COUNT],
    roles: [SlotRole; SLOT_COUNT],
    generation: u64,
    restart: bool,
}

impl CoefficientRing {
    /// Allocate four zeroed slots of `capacity` stages each
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            slots: Self::allocate(capacity)?,
            roles: Self::initial_roles(),
            generation: 0,
            restart: false,
        })
    }

    fn allocate(capacity: usize) -> Result<[CoefficientSet; SLOT_COUNT]> {
        Ok([
            CoefficientSet::with_capacity(capacity)?,
            CoefficientSet::with_capacity(capacity)?,
            CoefficientSet::with_capacity(capacity)?,
            CoefficientSet::with_capacity(capacity)?,
        ])
    }

    fn initial_roles() -> [SlotRole; SLOT_COUNT] {
        [
            SlotRole::Current,
            SlotRole::Free,
            SlotRole::Free,
            SlotRole::Free,
        ]
    }

    fn find(&self, role: SlotRole) -> Option<usize> {
        self.roles.iter().position(|r| *r == role)
    }

    /// Stage capacity of every slot
    pub fn capacity(&self) -> usize {
        self.slots[0].capacity()
    }

    /// Generation of the newest published set
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn roles(&self) -> &[SlotRole; SLOT_COUNT] {
        &self.roles
    }

    /// Claim a free slot as `Pending` and hand it out zeroed
    pub fn stage(&mut self) -> std::result::Result<&mut CoefficientSet, RingError> {
        if self.find(SlotRole::Pending).is_some() {
            return Err(RingError::AlreadyStaged);
        }
        let index = self.find(SlotRole::Free).ok_or(RingError::NoFreeSlot)?;
        self.roles[index] = SlotRole::Pending;
        let slot = &mut self.slots[index];
        slot.clear();
        Ok(slot)
    }

    /// Return an unpublished `Pending` slot to `Free`
    pub fn abandon(&mut self) {
        if let Some(index) = self.find(SlotRole::Pending) {
            self.slots[index].clear();
            self.roles[index] = SlotRole::Free;
        }
    }

    /// Make the pending set current
    ///
    /// The old current set becomes `Previous`, unless a transition is still
    /// outstanding: then the executor never saw the old current set, so it is
    /// freed and the existing `Previous` is kept. `restart` marks a transition
    /// that follows a full reset of coefficients and history.
    pub fn publish(&mut self, restart: bool) -> std::result::Result<u64, RingError> {
        let pending = self
            .find(SlotRole::Pending)
            .ok_or(RingError::NothingStaged)?;
        let current = self.find(SlotRole::Current);

        if self.find(SlotRole::Previous).is_some() {
            if let Some(index) = current {
                self.roles[index] = SlotRole::Free;
            }
            self.restart |= restart;
        } else {
            if let Some(index) = current {
                self.roles[index] = SlotRole::Previous;
            }
            self.restart = restart;
        }

        self.generation += 1;
        self.slots[pending].set_generation(self.generation);
        self.roles[pending] = SlotRole::Current;
        Ok(self.generation)
    }

    /// The newest published set
    pub fn current(&self) -> &CoefficientSet {
        let index = self.find(SlotRole::Current).unwrap_or(0);
        &self.slots[index]
    }

    /// Outstanding transition: previous set, current set, restart flag
    pub fn transition(&self) -> Option<(&CoefficientSet, &CoefficientSet, bool)> {
        let previous = self.find(SlotRole::Previous)?;
        Some((&self.slots[previous], self.current(), self.restart))
    }

    /// Executor is done with `Previous`; release it
    pub fn rotate(&mut self) -> std::result::Result<(), RingError> {
        let previous = self
            .find(SlotRole::Previous)
            .ok_or(RingError::NoTransition)?;
        self.roles[previous] = SlotRole::Free;
        self.restart = false;
        Ok(())
    }

    /// Zero every slot; one empty `Current`, the rest `Free`
    ///
    /// The generation counter keeps counting so executors can still detect
    /// the next publish.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.roles = Self::initial_roles();
        self.restart = false;
    }

    /// Reallocate all slots with a new stage capacity
    ///
    /// On allocation failure the ring is left untouched.
    pub fn resize(&mut self, capacity: usize) -> Result<()> {
        self.slots = Self::allocate(capacity)?;
        self.roles = Self::initial_roles();
        self.restart = false;
        Ok(())
    }
}
