//! Floyd-Steinberg error diffusion against an arbitrary palette.

use rgb::RGB8;

const NEAREST_CACHE_SLOTS: usize = 1 << 16;
const CACHE_EMPTY: u16 = u16::MAX;

/// Error kernel as `(dx, dy, weight/16)` for a left-to-right row. `dx` is
/// sign-flipped on right-to-left rows.
const DIFFUSION: [(i32, i32, i32); 4] = [(1, 0, 7), (-1, 1, 3), (0, 1, 5), (1, 1, 1)];

/// Per-call nearest-color memo, keyed by the 5-6-5 packed high bits of a
/// color. Never reused across palettes.
struct NearestCache {
    slots: Vec<u16>,
}

impl NearestCache {
    fn new() -> Self {
        Self {
            slots: vec![CACHE_EMPTY; NEAREST_CACHE_SLOTS],
        }
    }

    fn nearest(&mut self, palette: &[RGB8], r: u8, g: u8, b: u8) -> u8 {
        let key =
            (usize::from(r >> 3) << 11) | (usize::from(g >> 2) << 5) | usize::from(b >> 3);
        let cached = self.slots[key];
        if cached != CACHE_EMPTY {
            return cached as u8;
        }
        let index = nearest_index(palette, r, g, b);
        self.slots[key] = u16::from(index);
        index
    }
}

/// Linear scan for the palette entry with minimum squared RGB distance.
/// First-found wins on ties; a candidate's remaining channels are skipped
/// once its running distance is already no better than the best.
fn nearest_index(palette: &[RGB8], r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let mut best = i32::MAX;
    let mut best_index = 0usize;
    for (index, entry) in palette.iter().enumerate() {
        let dr = r - i32::from(entry.r);
        let mut dist = dr * dr;
        if dist >= best {
            continue;
        }
        let dg = g - i32::from(entry.g);
        dist += dg * dg;
        if dist >= best {
            continue;
        }
        let db = b - i32::from(entry.b);
        dist += db * db;
        if dist < best {
            best = dist;
            best_index = index;
        }
    }
    best_index as u8
}

/// Dithers `pixels` in place so that every RGB triple is an exact palette
/// entry and every alpha byte is 255. Deterministic for identical inputs.
///
/// Rows are scanned serpentine: even rows left-to-right, odd rows
/// right-to-left, with the error kernel mirrored on reverse rows.
/// Quantization error only flows into pixels not yet visited in scan
/// order; targets outside the image are skipped.
pub fn dither(pixels: &mut [u8], width: u32, height: u32, palette: &[RGB8]) {
    let (width, height) = (width as usize, height as usize);
    assert_eq!(
        pixels.len(),
        width * height * 4,
        "pixel buffer does not match {width}x{height} RGBA"
    );
    assert!(!palette.is_empty(), "palette is empty");

    let mut cache = NearestCache::new();
    for y in 0..height {
        let reverse = y % 2 == 1;
        let dir: i32 = if reverse { -1 } else { 1 };
        for step in 0..width {
            let x = if reverse { width - 1 - step } else { step };
            let i = (y * width + x) * 4;

            let original = (
                i32::from(pixels[i]),
                i32::from(pixels[i + 1]),
                i32::from(pixels[i + 2]),
            );
            let chosen_index = cache.nearest(palette, pixels[i], pixels[i + 1], pixels[i + 2]);
            let chosen = palette[usize::from(chosen_index)];
            pixels[i] = chosen.r;
            pixels[i + 1] = chosen.g;
            pixels[i + 2] = chosen.b;
            pixels[i + 3] = 255;

            let err = (
                original.0 - i32::from(chosen.r),
                original.1 - i32::from(chosen.g),
                original.2 - i32::from(chosen.b),
            );
            if err == (0, 0, 0) {
                continue;
            }
            for (dx, dy, weight) in DIFFUSION {
                spread(
                    pixels,
                    width,
                    height,
                    x as i32 + dx * dir,
                    y as i32 + dy,
                    err,
                    weight,
                );
            }
        }
    }
}

fn spread(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    err: (i32, i32, i32),
    weight: i32,
) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let i = (y as usize * width + x as usize) * 4;
    pixels[i] = clamp_channel(i32::from(pixels[i]) + err.0 * weight / 16);
    pixels[i + 1] = clamp_channel(i32::from(pixels[i + 1]) + err.1 * weight / 16);
    pixels[i + 2] = clamp_channel(i32::from(pixels[i + 2]) + err.2 * weight / 16);
}

fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Maps each pixel to the index of its nearest palette entry, with the
/// same tie-break and memoization as the dither pass. Used directly when
/// dithering is disabled, and to index an already dithered buffer.
pub fn map_to_indices(pixels: &[u8], palette: &[RGB8]) -> Vec<u8> {
    assert!(!palette.is_empty(), "palette is empty");
    let mut cache = NearestCache::new();
    pixels
        .chunks_exact(4)
        .map(|px| cache.nearest(palette, px[0], px[1], px[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
    const WHITE: RGB8 = RGB8 {
        r: 255,
        g: 255,
        b: 255,
    };

    fn uniform(color: [u8; 4], pixels: usize) -> Vec<u8> {
        color.iter().copied().cycle().take(pixels * 4).collect()
    }

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                out.extend_from_slice(&[
                    (x * 13 % 256) as u8,
                    (y * 29 % 256) as u8,
                    ((x + y) * 7 % 256) as u8,
                    128,
                ]);
            }
        }
        out
    }

    #[test]
    fn test_output_stays_in_palette_with_opaque_alpha() {
        let palette = vec![
            BLACK,
            WHITE,
            RGB8 { r: 200, g: 30, b: 60 },
            RGB8 { r: 10, g: 80, b: 190 },
        ];
        let mut pixels = gradient(17, 9);
        dither(&mut pixels, 17, 9, &palette);
        for px in pixels.chunks_exact(4) {
            let rgb = RGB8 {
                r: px[0],
                g: px[1],
                b: px[2],
            };
            assert!(palette.contains(&rgb), "{rgb:?} is not a palette entry");
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_identical_inputs_dither_identically() {
        let palette = vec![BLACK, WHITE, RGB8 { r: 128, g: 128, b: 128 }];
        let mut first = gradient(11, 7);
        let mut second = first.clone();
        dither(&mut first, 11, 7, &palette);
        dither(&mut second, 11, 7, &palette);
        assert_eq!(first, second);
    }

    #[test]
    fn test_flat_image_matching_a_palette_entry_is_unchanged() {
        let entry = RGB8 { r: 40, g: 90, b: 160 };
        let palette = vec![BLACK, entry, WHITE];
        let mut pixels = uniform([40, 90, 160, 255], 8 * 8);
        dither(&mut pixels, 8, 8, &palette);
        for px in pixels.chunks_exact(4) {
            assert_eq!(&px[..3], &[40, 90, 160]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_nearest_mid_gray_prefers_black() {
        // 3*120^2 < 3*135^2, so (120,120,120) sits nearer black.
        let indices = map_to_indices(&[120, 120, 120, 255], &[BLACK, WHITE]);
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn test_single_entry_palette_takes_everything() {
        let red = RGB8 { r: 255, g: 0, b: 0 };
        let indices = map_to_indices(&[10, 20, 30, 255], &[red]);
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn test_two_pixel_error_propagation() {
        // 128 resolves to white (127^2 < 128^2); the negative error pushes
        // the right neighbor to black.
        let mut pixels = uniform([128, 128, 128, 255], 2);
        dither(&mut pixels, 2, 1, &[BLACK, WHITE]);
        assert_eq!(&pixels[..4], &[255, 255, 255, 255]);
        assert_eq!(&pixels[4..], &[0, 0, 0, 255]);
        assert_eq!(map_to_indices(&pixels, &[BLACK, WHITE]), vec![1, 0]);
    }

    #[test]
    fn test_odd_rows_scan_right_to_left() {
        // Row 0 is pure black and diffuses nothing. On row 1 the serpentine
        // pass visits (2,1) first: 200 -> white, and its 7/16 error lands on
        // the *left* neighbor, dragging 140 below the midpoint. A
        // left-to-right pass would resolve 140 to white instead.
        let mut pixels = vec![
            0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255, // row 0
            0, 0, 0, 255, 140, 140, 140, 255, 200, 200, 200, 255, // row 1
        ];
        dither(&mut pixels, 3, 2, &[BLACK, WHITE]);
        let row1: Vec<&[u8]> = pixels[12..].chunks_exact(4).collect();
        assert_eq!(&row1[0][..3], &[0, 0, 0]);
        assert_eq!(&row1[1][..3], &[0, 0, 0]);
        assert_eq!(&row1[2][..3], &[255, 255, 255]);
    }

    #[test]
    fn test_single_pixel_image_does_not_diffuse_out_of_bounds() {
        let mut pixels = uniform([128, 128, 128, 0], 1);
        dither(&mut pixels, 1, 1, &[BLACK, WHITE]);
        assert_eq!(pixels, vec![255, 255, 255, 255]);
    }

    #[test]
    fn test_cache_buckets_by_high_bits() {
        // (0,0,0) and (7,3,7) share a 5-6-5 key, so whichever is resolved
        // first decides the bucket for both within one call.
        let palette = vec![BLACK, RGB8 { r: 8, g: 8, b: 8 }];
        let indices = map_to_indices(&[7, 3, 7, 255, 0, 0, 0, 255], &palette);
        assert_eq!(indices, vec![1, 1]);
    }

    #[test]
    fn test_indices_always_address_the_palette() {
        let palette = vec![BLACK, WHITE, RGB8 { r: 90, g: 14, b: 220 }];
        let pixels = gradient(23, 5);
        for index in map_to_indices(&pixels, &palette) {
            assert!(usize::from(index) < palette.len());
        }
    }
}
