//! GIF generation service.
//!
//! Samples a time window of a video source and encodes it into an animated
//! GIF: seek, capture, quantize, dither, write, one frame at a time, with
//! cooperative cancellation and progress reporting along the way.

mod config;
mod dither;
mod encode;
mod error;
mod job;
mod quantize;
mod source;

pub use config::{JobConfig, Repeat, MAX_COLORS, MAX_GIF_DIMENSION, MIN_COLORS};
pub use dither::{dither, map_to_indices};
pub use encode::{FrameSink, JobResult};
pub use error::{ConfigError, JobError};
pub use job::{GifService, Job, JobEvent, JobEvents, JobHandle, JobState};
pub use quantize::{NeuQuantizer, Quantizer};
pub use source::{FrameSample, FrameSource};
