//! Cameras and the camera registry
//!
//! A [`Camera`] owns the full chain of spaces between the world and the
//! screen:
//!
//! ```text
//! world <- sensor start <- sensor <- camera <- clip <- uv / pixel
//! ```
//!
//! Every setter recomputes the composed matrices before returning, so reads
//! never observe a stale stack. [`CameraManager`] maps render targets to the
//! cameras drawing into them and answers pixel queries against them.

mod stack;
pub mod manager;
pub mod math;

pub use stack::{Camera, CameraHandle, DeviceOrientation, DisplayRotation};
pub use manager::{CameraManager, RenderTargetId, DEFAULT_SCREEN_RENDER_TARGET};
