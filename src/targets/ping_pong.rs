//! Two targets alternating between read and write roles.

use crate::recorder::CommandRecorder;
use crate::targets::{TargetDescriptor, TransientTarget};

/// A pair of targets where one is read ([`from`](Self::from)) while the other is
/// written ([`to`](Self::to)).
///
/// ```text
/// unflipped:  from = B, to = A
/// flipped:    from = A, to = B
/// ```
///
/// [`flip`](Self::flip) swaps the roles without touching the GPU, so `from` and `to`
/// never alias the same texture.
#[derive(Debug, Clone)]
pub struct PingPong {
    a: TransientTarget,
    b: TransientTarget,
    flipped: bool,
}

impl PingPong {
    /// Pairs two targets. Unflipped, `a` is written and `b` is read.
    ///
    /// # Arguments
    ///
    /// * `a` - The first write target
    /// * `b` - The first read target; must not share a slot with `a`
    pub fn new(a: TransientTarget, b: TransientTarget) -> Self {
        debug_assert_ne!(a.slot(), b.slot(), "ping-pong targets must not alias");
        Self {
            a,
            b,
            flipped: false,
        }
    }

    /// The target currently read.
    pub fn from(&self) -> &TransientTarget {
        if self.flipped { &self.a } else { &self.b }
    }

    /// The target currently written.
    pub fn to(&self) -> &TransientTarget {
        if self.flipped { &self.b } else { &self.a }
    }

    /// Swaps the read and write roles. Called after every draw into [`to`](Self::to).
    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Restores the unflipped roles, ready for the next frame.
    pub fn reset(&mut self) {
        self.flipped = false;
    }

    /// Acquires both targets at `desc`.
    pub fn acquire<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R, desc: &TargetDescriptor) {
        self.a.acquire(recorder, desc);
        self.b.acquire(recorder, desc);
    }

    /// Releases whichever of the two targets are allocated.
    pub fn release<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R) {
        self.a.release(recorder);
        self.b.release(recorder);
    }

    pub fn is_allocated(&self) -> bool {
        self.a.is_allocated() || self.b.is_allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> PingPong {
        PingPong::new(TransientTarget::new("_A"), TransientTarget::new("_B"))
    }

    #[test]
    fn from_and_to_never_alias() {
        let mut pp = pair();
        for _ in 0..5 {
            assert_ne!(pp.from().slot(), pp.to().slot());
            pp.flip();
        }
    }

    #[test]
    fn even_flips_restore_odd_flips_swap() {
        let initial = pair();
        for n in 0..16 {
            let mut pp = pair();
            for _ in 0..n {
                pp.flip();
            }
            if n % 2 == 0 {
                assert_eq!(pp.from(), initial.from());
                assert_eq!(pp.to(), initial.to());
            } else {
                assert_eq!(pp.from(), initial.to());
                assert_eq!(pp.to(), initial.from());
            }
        }
    }

    #[test]
    fn n_flips_then_n_more_is_identity() {
        for n in 0..9 {
            let mut pp = pair();
            let (from, to) = (pp.from().slot(), pp.to().slot());
            for _ in 0..(2 * n) {
                pp.flip();
            }
            assert_eq!((pp.from().slot(), pp.to().slot()), (from, to));
            assert!(!pp.is_flipped());
        }
    }
}
