use anyhow::Result;
use image::RgbaImage;

/// A seekable provider of RGBA video frames.
///
/// Implementations own any resampling from the source's native dimensions
/// to the output size requested per capture.
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    /// Native source dimensions in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Total source duration in milliseconds.
    fn duration_ms(&self) -> f64;

    /// Move the playback position. Resolves once the source has accepted
    /// the new position; the pipeline adds its own settle delay before
    /// capturing.
    async fn seek(&mut self, timestamp_ms: f64) -> Result<()>;

    /// Capture the currently displayed frame, resampled to
    /// `width` x `height`.
    fn capture_frame(&mut self, width: u32, height: u32) -> Result<RgbaImage>;
}

/// One captured frame and the source timestamp it was taken at. Lives for
/// a single pipeline iteration.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub image: RgbaImage,
    pub timestamp_ms: f64,
}
