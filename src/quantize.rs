use anyhow::Result;
use color_quant::NeuQuant;
use rgb::RGB8;

/// Builds a palette for one frame's pixels. The requested size is an upper
/// bound; implementations may return fewer colors.
pub trait Quantizer {
    fn quantize(&self, rgba: &[u8], max_colors: u16) -> Result<Vec<RGB8>>;
}

/// NeuQuant-based quantizer from the `color_quant` crate.
///
/// The sampling factor trades palette fidelity for speed: quality 10 maps
/// to factor 1 (every pixel sampled), quality 1 to a coarse scan.
pub struct NeuQuantizer {
    sample_factor: i32,
}

impl NeuQuantizer {
    pub fn new(quality: u8) -> Self {
        let sample_factor = (31 - 3 * i32::from(quality)).clamp(1, 30);
        Self { sample_factor }
    }
}

impl Quantizer for NeuQuantizer {
    fn quantize(&self, rgba: &[u8], max_colors: u16) -> Result<Vec<RGB8>> {
        anyhow::ensure!(
            !rgba.is_empty() && rgba.len() % 4 == 0,
            "RGBA buffer of {} bytes is not quantizable",
            rgba.len()
        );
        let quantizer = NeuQuant::new(self.sample_factor, usize::from(max_colors), rgba);
        let palette = quantizer
            .color_map_rgb()
            .chunks_exact(3)
            .map(|c| RGB8::new(c[0], c[1], c[2]))
            .collect();
        Ok(palette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_rgba(color: [u8; 4], pixels: usize) -> Vec<u8> {
        color.iter().copied().cycle().take(pixels * 4).collect()
    }

    #[test]
    fn test_palette_respects_max_colors() {
        let rgba = uniform_rgba([200, 40, 40, 255], 256);
        let palette = NeuQuantizer::new(10).quantize(&rgba, 16).unwrap();
        assert!(!palette.is_empty());
        assert!(palette.len() <= 256);
    }

    #[test]
    fn test_uniform_image_yields_a_close_entry() {
        let rgba = uniform_rgba([250, 10, 10, 255], 1024);
        let palette = NeuQuantizer::new(10).quantize(&rgba, 8).unwrap();
        let close = palette.iter().any(|c| {
            (i32::from(c.r) - 250).abs() <= 32
                && (i32::from(c.g) - 10).abs() <= 32
                && (i32::from(c.b) - 10).abs() <= 32
        });
        assert!(close, "no palette entry near the uniform color: {palette:?}");
    }

    #[test]
    fn test_empty_buffer_rejected() {
        assert!(NeuQuantizer::new(5).quantize(&[], 16).is_err());
    }

    #[test]
    fn test_misaligned_buffer_rejected() {
        assert!(NeuQuantizer::new(5).quantize(&[0, 0, 0], 16).is_err());
    }
}
