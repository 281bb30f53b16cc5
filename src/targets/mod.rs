//! Transient render target lifecycle.
//!
//! Every intermediate buffer of a GI frame is a [`TransientTarget`]: a stable
//! [`BindSlot`] plus an allocated flag. The GPU memory behind it only exists between
//! `acquire` and `release` inside one frame, and the frame releases every target it
//! acquired no matter which optional passes ran.
//!
//! ```text
//!           acquire                 draws                  release
//! slot ──────────────▶ live texture ─────▶ ... ─────▶ returned to backend
//! ```
//!
//! Passes that iterate over their own output use a [`PingPong`] pair, and the generic
//! "first draw plus N follow-up draws" pattern is a [`PostProcessSession`].

mod descriptor;
mod ping_pong;
mod session;
mod slot;
mod transient;

pub use descriptor::{PixelFormat, TargetDescriptor};
pub use ping_pong::PingPong;
pub use session::PostProcessSession;
pub use slot::{BindSlot, ids};
pub use transient::TransientTarget;
