//! climagraph Render - Downsampling
//!
//! Reduces a full-resolution series to one aggregate point per output pixel
//! column, and runs those reductions in the background for a surface that
//! can be resized or given new data at any time.

pub mod engine;
pub mod surface;

pub use engine::{reduce, DownsampleBucket, KnownBounds, Reduction, ValueRange};
pub use surface::{Frame, RenderSurface, RenderTicket};
