//! Thin sink over the `gif` crate: indexed frames in, finished bytes out.
//! The container format itself (LZW, framing) lives in the library.

use anyhow::{Context, Result};
use gif::{Encoder, Frame};
use rgb::RGB8;

use crate::config::{Repeat, MAX_COLORS};

/// Final output of a successfully completed job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Accumulates indexed frames into an in-memory GIF stream.
pub struct FrameSink {
    encoder: Encoder<Vec<u8>>,
    width: u16,
    height: u16,
    frames_written: u32,
}

impl FrameSink {
    pub fn new(width: u32, height: u32, repeat: Repeat) -> Result<Self> {
        anyhow::ensure!(
            (1..=u32::from(u16::MAX)).contains(&width) && (1..=u32::from(u16::MAX)).contains(&height),
            "dimensions {width}x{height} are not encodable as GIF"
        );
        let mut encoder = Encoder::new(Vec::new(), width as u16, height as u16, &[])
            .context("failed to initialize GIF encoder")?;
        let repeat = match repeat {
            Repeat::Infinite => gif::Repeat::Infinite,
            Repeat::Finite(count) => gif::Repeat::Finite(count),
        };
        encoder
            .set_repeat(repeat)
            .context("failed to set GIF repeat mode")?;
        Ok(Self {
            encoder,
            width: width as u16,
            height: height as u16,
            frames_written: 0,
        })
    }

    /// Writes one indexed frame with its local palette. `delay_ms` is
    /// rounded to the GIF's centisecond units.
    pub fn write_frame(&mut self, indices: &[u8], palette: &[RGB8], delay_ms: f64) -> Result<()> {
        anyhow::ensure!(
            indices.len() == usize::from(self.width) * usize::from(self.height),
            "index buffer of {} bytes does not match {}x{}",
            indices.len(),
            self.width,
            self.height
        );
        anyhow::ensure!(
            !palette.is_empty() && palette.len() <= usize::from(MAX_COLORS),
            "palette of {} colors is not encodable",
            palette.len()
        );

        let mut flat = Vec::with_capacity(palette.len() * 3);
        for color in palette {
            flat.extend_from_slice(&[color.r, color.g, color.b]);
        }
        let mut frame = Frame::from_palette_pixels(self.width, self.height, indices, flat, None);
        frame.delay = (delay_ms / 10.0).round() as u16;
        self.encoder
            .write_frame(&frame)
            .context("failed to write GIF frame")?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Finishes the stream and returns the complete GIF bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.encoder
            .into_inner()
            .context("failed to finalize GIF stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAILER: u8 = 0x3B;

    fn bw_palette() -> Vec<RGB8> {
        vec![RGB8 { r: 0, g: 0, b: 0 }, RGB8 { r: 255, g: 255, b: 255 }]
    }

    #[test]
    fn test_finished_stream_is_framed_as_gif89a() {
        let mut sink = FrameSink::new(2, 1, Repeat::Infinite).unwrap();
        sink.write_frame(&[1, 0], &bw_palette(), 100.0).unwrap();
        sink.write_frame(&[0, 1], &bw_palette(), 100.0).unwrap();
        assert_eq!(sink.frames_written(), 2);

        let bytes = sink.finish().unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(*bytes.last().unwrap(), TRAILER);
    }

    #[test]
    fn test_infinite_repeat_writes_netscape_extension() {
        let mut sink = FrameSink::new(1, 1, Repeat::Infinite).unwrap();
        sink.write_frame(&[0], &bw_palette(), 50.0).unwrap();
        let bytes = sink.finish().unwrap();
        let needle = b"NETSCAPE2.0";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_mismatched_index_buffer_rejected() {
        let mut sink = FrameSink::new(2, 2, Repeat::Infinite).unwrap();
        assert!(sink.write_frame(&[0, 1], &bw_palette(), 100.0).is_err());
    }

    #[test]
    fn test_empty_palette_rejected() {
        let mut sink = FrameSink::new(1, 1, Repeat::Infinite).unwrap();
        assert!(sink.write_frame(&[0], &[], 100.0).is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(FrameSink::new(0, 10, Repeat::Infinite).is_err());
    }
}
