use std::time::Duration;

use anyhow::{Context, Result};

use crate::source::FrameSource;

/// Wait after the source reports a completed seek so the frame is actually
/// rendered before capture. Capturing earlier can return a stale frame.
pub(crate) const SEEK_SETTLE: Duration = Duration::from_millis(50);

/// Moves the source's playback position and resolves once the frame at
/// `timestamp_ms` is ready to be captured.
pub(crate) async fn seek_settled<S: FrameSource>(
    source: &mut S,
    timestamp_ms: f64,
) -> Result<()> {
    source
        .seek(timestamp_ms)
        .await
        .with_context(|| format!("seek to {timestamp_ms} ms failed"))?;
    tokio::time::sleep(SEEK_SETTLE).await;
    Ok(())
}
