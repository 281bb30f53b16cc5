//! Per-frame transient targets.

use crate::recorder::CommandRecorder;
use crate::targets::{BindSlot, TargetDescriptor};

/// A texture bound to a stable slot for the duration of one frame.
///
/// The GPU memory behind it only exists between [`acquire`](Self::acquire) and
/// [`release`](Self::release). Releasing twice is a no-op, so a frame can release
/// every target it might have acquired without tracking which branches ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientTarget {
    slot: BindSlot,
    allocated: bool,
}

impl TransientTarget {
    pub fn new(name: &str) -> Self {
        Self::from_slot(BindSlot::named(name))
    }

    pub const fn from_slot(slot: BindSlot) -> Self {
        Self {
            slot,
            allocated: false,
        }
    }

    pub fn slot(&self) -> BindSlot {
        self.slot
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Binds a texture matching `desc` to this target's slot.
    ///
    /// Acquiring a target twice in one frame is a programming error.
    pub fn acquire<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R, desc: &TargetDescriptor) {
        debug_assert!(!self.allocated, "{:?} acquired twice in one frame", self.slot);
        self.allocated = true;
        recorder.acquire(self.slot, desc);
    }

    /// Frees the texture; does nothing when not allocated.
    pub fn release<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R) {
        if !self.allocated {
            return;
        }
        self.allocated = false;
        recorder.release(self.slot);
    }
}
