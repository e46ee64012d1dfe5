use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MIN_QUALITY: u8 = 1;
const MAX_QUALITY: u8 = 10;
pub const MIN_COLORS: u16 = 2;
pub const MAX_COLORS: u16 = 256;
pub const MAX_GIF_DIMENSION: u32 = 4096;

/// How many times the finished GIF loops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    Infinite,
    Finite(u16),
}

/// Parameters for one GIF generation job. Immutable once the job starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Overall quality knob, 1-10. Drives the quantizer sampling rate and,
    /// when `max_colors` is absent, the palette size.
    pub quality: u8,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Window start in source milliseconds.
    pub start_ms: f64,
    /// Window end in source milliseconds. Must be after `start_ms`.
    pub end_ms: f64,
    /// Frames sampled per second of source time.
    pub fps: f64,
    /// Palette size, 2-256. Derived from `quality` when absent.
    #[serde(default)]
    pub max_colors: Option<u16>,
    /// Skip error diffusion and map pixels straight to the palette.
    #[serde(default)]
    pub no_dither: bool,
    #[serde(default)]
    pub repeat: Repeat,
}

impl JobConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality < MIN_QUALITY || self.quality > MAX_QUALITY {
            return Err(ConfigError::Quality(self.quality));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > MAX_GIF_DIMENSION || self.height > MAX_GIF_DIMENSION {
            return Err(ConfigError::DimensionTooLarge {
                width: self.width,
                height: self.height,
                max: MAX_GIF_DIMENSION,
            });
        }
        if !self.end_ms.is_finite() || !self.start_ms.is_finite() || self.end_ms <= self.start_ms {
            return Err(ConfigError::EmptyWindow {
                start_ms: self.start_ms,
                end_ms: self.end_ms,
            });
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::Fps(self.fps));
        }
        if let Some(max_colors) = self.max_colors {
            if max_colors < MIN_COLORS || max_colors > MAX_COLORS {
                return Err(ConfigError::MaxColors(max_colors));
            }
        }
        Ok(())
    }

    /// The palette size to request: the explicit `max_colors`, or a size
    /// derived from `quality`.
    pub fn effective_max_colors(&self) -> u16 {
        self.max_colors.unwrap_or_else(|| {
            let derived = (f64::from(self.quality) / 10.0 * 256.0).round() as u16;
            derived.clamp(MIN_COLORS, MAX_COLORS)
        })
    }

    /// Display time of each frame in milliseconds.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Progress denominator: the window length, at least one frame interval
    /// and truncated down to a whole number of intervals, so progress hits
    /// exactly 1.0 at the last emitted frame.
    pub fn true_duration_ms(&self) -> f64 {
        let interval = self.frame_interval_ms();
        let span = (self.end_ms - self.start_ms).max(interval);
        (span / interval).floor() * interval
    }
}
