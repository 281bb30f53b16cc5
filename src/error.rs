//! Error types for the GI pipeline.
//!
//! Errors fall into three groups:
//!
//! - **Configuration errors** (unknown mode values, invalid ranges, unusable camera):
//!   raised at setup, before any transient target is acquired.
//! - **Recoverable resource failures** (noise texture creation): logged and converted
//!   into an "unavailable" state by [`NoiseProvider`](crate::NoiseProvider); they never
//!   reach the caller of a frame.
//! - **Recording failures** (a draw sampling a slot with no live texture): returned from
//!   the frame, after every acquired target has been released.

use thiserror::Error;

/// The error type for `gilight2d`.
#[derive(Error, Debug)]
pub enum GiError {
    // ========================================================================
    // Configuration
    // ========================================================================
    /// A raw scale mode value did not map to [`ScaleMode`](crate::ScaleMode).
    #[error("Unknown scale mode: {0}")]
    UnknownScaleMode(i32),

    /// A raw blur mode value did not map to [`BlurMode`](crate::BlurMode).
    #[error("Unknown blur mode: {0}")]
    UnknownBlurMode(i32),

    /// A raw noise mode value did not map to [`NoiseMode`](crate::NoiseMode).
    #[error("Unknown noise mode: {0}")]
    UnknownNoiseMode(i32),

    /// A raw debug output value did not map to [`DebugOutput`](crate::DebugOutput).
    #[error("Unknown debug output: {0}")]
    UnknownDebugOutput(i32),

    /// A raw output destination did not map to [`FinalBlit`](crate::FinalBlit).
    #[error("Unknown output destination: {0}")]
    UnknownFinalBlit(i32),

    /// A raw camera kind did not map to [`CameraKind`](crate::CameraKind).
    #[error("Unknown camera kind: {0}")]
    UnknownCameraKind(i32),

    /// Settings failed range or consistency validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The camera cannot be planned against (zero target, bad orthographic size).
    #[error("Invalid camera: {width}x{height}, orthographic size {orthographic_size}")]
    InvalidCamera {
        /// Camera target width in pixels
        width: u32,
        /// Camera target height in pixels
        height: u32,
        /// Orthographic half-size of the camera
        orthographic_size: f32,
    },

    /// A settings document could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    // ========================================================================
    // Resources & Recording
    // ========================================================================
    /// A texture could not be created or uploaded.
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    /// A draw referenced a bind slot with no live texture behind it.
    #[error("No live texture bound to slot {0}")]
    UnboundTexture(String),

    /// A draw asked for a pass the program does not have.
    #[error("Program {program} has no pass {pass}")]
    UnknownPass {
        /// Program name
        program: &'static str,
        /// Requested pass index
        pass: u32,
    },

    /// `apply` was called on a post-process session with no passes left.
    #[error("Post-process session has no passes left")]
    SessionExhausted,

    // ========================================================================
    // wgpu backend
    // ========================================================================
    /// No compatible GPU adapter was found.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// The logical device could not be created.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The window surface could not be created.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),
}

/// Alias for `std::result::Result<T, GiError>`.
pub type Result<T> = std::result::Result<T, GiError>;
