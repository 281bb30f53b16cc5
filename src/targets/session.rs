//! N-pass post-processing over a ping-pong pair.

use crate::error::{GiError, Result};
use crate::material::Material;
use crate::recorder::{CommandRecorder, RenderDest};
use crate::targets::{PingPong, ids};

/// Chains a first draw and `passes` follow-up draws, ending in a fixed output.
///
/// ```text
/// passes = 0:  setup ─────────────────────────────▶ output
/// passes = 2:  setup ─▶ to │ apply: from ─▶ to │ apply: from ─▶ output
/// ```
///
/// With no passes the first draw goes straight to the output and the pair is never
/// touched. Otherwise the first draw writes the pair and every [`apply`](Self::apply)
/// flips it, reads the previous result as `_MainTex`, and writes either the pair again or,
/// for the last pass, the output.
///
/// The session does not own the pair's GPU memory; the caller acquires it when
/// `passes > 0` and releases it at the end of the frame.
#[derive(Debug, Clone)]
pub struct PostProcessSession {
    flip: PingPong,
    output: RenderDest,
    passes: u32,
    passes_left: u32,
}

impl PostProcessSession {
    /// Creates an idle session over the pair `flip`.
    pub fn new(flip: PingPong) -> Self {
        Self {
            flip,
            output: RenderDest::Camera,
            passes: 0,
            passes_left: 0,
        }
    }

    /// Records the first draw of `material` and arms `passes` follow-up draws.
    pub fn setup<R: CommandRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
        output: RenderDest,
        passes: u32,
        material: &Material,
        pass: u32,
    ) -> Result<()> {
        self.flip.reset();
        self.output = output;
        self.passes = passes;
        self.passes_left = passes;

        let target = if passes > 0 {
            RenderDest::Target(self.flip.to().slot())
        } else {
            output
        };
        recorder.draw_fullscreen(material, pass, target)
    }

    /// Records one follow-up draw reading the previous result.
    pub fn apply<R: CommandRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
        material: &Material,
        pass: u32,
    ) -> Result<()> {
        if self.passes_left == 0 {
            return Err(GiError::SessionExhausted);
        }
        self.flip.flip();
        self.passes_left -= 1;

        recorder.set_global_texture(ids::MAIN_TEX, self.flip.from().slot());
        let target = if self.passes_left > 0 {
            RenderDest::Target(self.flip.to().slot())
        } else {
            self.output
        };
        recorder.draw_fullscreen(material, pass, target)
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Follow-up draws still expected before the session reaches its output.
    pub fn passes_left(&self) -> u32 {
        self.passes_left
    }

    /// Whether the next [`apply`](Self::apply) writes the output.
    pub fn is_last_pass(&self) -> bool {
        self.passes_left == 1
    }

    pub fn pair(&self) -> &PingPong {
        &self.flip
    }

    pub fn pair_mut(&mut self) -> &mut PingPong {
        &mut self.flip
    }
}
