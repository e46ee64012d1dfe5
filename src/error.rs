use thiserror::Error;

/// Rejected synchronously when a job is created; the pipeline never runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("quality must be between 1 and 10, got {0}")]
    Quality(u8),

    #[error("output dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("output dimensions exceed the {max} px GIF limit, got {width}x{height}")]
    DimensionTooLarge { width: u32, height: u32, max: u32 },

    #[error("end ({end_ms} ms) must be after start ({start_ms} ms)")]
    EmptyWindow { start_ms: f64, end_ms: f64 },

    #[error("fps must be positive and finite, got {0}")]
    Fps(f64),

    #[error("max_colors must be between 2 and 256, got {0}")]
    MaxColors(u16),
}

/// Terminal failure of a running job. Carried by the job's single error
/// event; an aborted job is a distinct outcome, never an error.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("frame source error: {0:#}")]
    FrameSource(anyhow::Error),

    #[error("encoding error: {0:#}")]
    Encoding(anyhow::Error),
}
