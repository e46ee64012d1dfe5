//! The frame pipeline orchestrator: drives one job from the first seek to
//! its terminal event.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedSender};

use super::cancel::CancelToken;
use super::seek::seek_settled;
use super::{JobEvent, JobEvents, JobState};
use crate::config::{JobConfig, MAX_COLORS};
use crate::dither;
use crate::encode::{FrameSink, JobResult};
use crate::error::JobError;
use crate::quantize::Quantizer;
use crate::source::{FrameSample, FrameSource};

/// Control handle for a job. Cloneable; all clones refer to the same job.
#[derive(Clone)]
pub struct JobHandle {
    cancel: CancelToken,
    state: Arc<Mutex<JobState>>,
}

impl JobHandle {
    /// Requests cooperative cancellation: the current frame finishes, the
    /// next one is never started. Idempotent, and a no-op once the job has
    /// reached a terminal state.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

enum Termination {
    Completed(JobResult),
    Aborted,
}

/// One GIF generation job. Created through [`crate::GifService`]; makes no
/// progress until [`Job::run`] is awaited.
pub struct Job<S, Q> {
    config: JobConfig,
    source: S,
    quantizer: Q,
    cancel: CancelToken,
    state: Arc<Mutex<JobState>>,
    events: UnboundedSender<JobEvent>,
}

impl<S: FrameSource, Q: Quantizer> Job<S, Q> {
    /// Assumes `config` has already been validated.
    pub(crate) fn new(config: JobConfig, source: S, quantizer: Q) -> (Self, JobEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let job = Self {
            config,
            source,
            quantizer,
            cancel: CancelToken::new(),
            state: Arc::new(Mutex::new(JobState::Idle)),
            events,
        };
        (job, receiver)
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            cancel: self.cancel.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn set_state(&self, state: JobState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn emit(&self, event: JobEvent) {
        // The receiver may already be gone; the job still runs to its
        // terminal state.
        let _ = self.events.send(event);
    }

    /// Drives the job to a terminal state, emitting exactly one of
    /// `Complete`, `Aborted` or `Error` after zero or more `Progress`
    /// events. All working buffers and the encoder are released on return.
    pub async fn run(mut self) {
        let (native_w, native_h) = self.source.dimensions();
        tracing::debug!(
            "gif job: {}x{} source, window {}..{} ms at {} fps",
            native_w,
            native_h,
            self.config.start_ms,
            self.config.end_ms,
            self.config.fps
        );
        if self.config.end_ms > self.source.duration_ms() {
            tracing::warn!(
                "window end {} ms is past the {} ms source duration",
                self.config.end_ms,
                self.source.duration_ms()
            );
        }

        match self.drive().await {
            Ok(Termination::Completed(result)) => {
                self.set_state(JobState::Complete);
                tracing::debug!("gif job complete: {} bytes", result.bytes.len());
                self.emit(JobEvent::Complete(result));
            }
            Ok(Termination::Aborted) => {
                self.set_state(JobState::Aborted);
                tracing::debug!("gif job aborted");
                self.emit(JobEvent::Aborted);
            }
            Err(err) => {
                self.set_state(JobState::Errored);
                tracing::warn!("gif job failed: {err}");
                self.emit(JobEvent::Error(err));
            }
        }
    }

    async fn drive(&mut self) -> Result<Termination, JobError> {
        let width = self.config.width;
        let height = self.config.height;
        let max_colors = self.config.effective_max_colors();
        let interval = self.config.frame_interval_ms();
        let true_duration = self.config.true_duration_ms();
        let start = self.config.start_ms;
        let end = self.config.end_ms;

        // The sink and the dither scratch live for the whole job; the
        // scratch is overwritten each frame instead of reallocated.
        let mut sink =
            FrameSink::new(width, height, self.config.repeat).map_err(JobError::Encoding)?;
        let mut scratch: Vec<u8> = Vec::new();
        let mut frames_written = 0u32;
        let mut timestamp = start;

        // An implicit abort (a replacement job) may have fired before this
        // job ever ran; don't touch the source in that case.
        if self.cancel.is_cancelled() {
            return Ok(Termination::Aborted);
        }

        self.set_state(JobState::Seeking);
        seek_settled(&mut self.source, timestamp)
            .await
            .map_err(JobError::FrameSource)?;
        if self.cancel.is_cancelled() {
            return Ok(Termination::Aborted);
        }

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Termination::Aborted);
            }

            self.set_state(JobState::Capturing);
            let sample = self.capture(timestamp)?;

            self.set_state(JobState::Encoding);
            let palette = self
                .quantizer
                .quantize(sample.image.as_raw(), max_colors)
                .map_err(JobError::Encoding)?;
            if palette.is_empty() || palette.len() > usize::from(MAX_COLORS) {
                return Err(JobError::Encoding(anyhow::anyhow!(
                    "quantizer produced {} colors",
                    palette.len()
                )));
            }

            let indices = if self.config.no_dither {
                dither::map_to_indices(sample.image.as_raw(), &palette)
            } else {
                scratch.clear();
                scratch.extend_from_slice(sample.image.as_raw());
                dither::dither(&mut scratch, width, height, &palette);
                dither::map_to_indices(&scratch, &palette)
            };

            sink.write_frame(&indices, &palette, interval)
                .map_err(JobError::Encoding)?;
            frames_written += 1;

            let elapsed = sample.timestamp_ms - start;
            self.emit(JobEvent::Progress {
                ratio: (elapsed / true_duration).clamp(0.0, 1.0) as f32,
                frames_written,
            });

            let next = timestamp + interval;
            if next >= end {
                break;
            }

            self.set_state(JobState::Seeking);
            seek_settled(&mut self.source, next)
                .await
                .map_err(JobError::FrameSource)?;
            if self.cancel.is_cancelled() {
                return Ok(Termination::Aborted);
            }
            timestamp = next;

            // Explicit yield between frames keeps the host responsive over
            // long jobs.
            tokio::task::yield_now().await;
        }

        self.set_state(JobState::Finalizing);
        let bytes = sink.finish().map_err(JobError::Encoding)?;
        Ok(Termination::Completed(JobResult {
            bytes,
            width,
            height,
        }))
    }

    fn capture(&mut self, timestamp_ms: f64) -> Result<FrameSample, JobError> {
        let width = self.config.width;
        let height = self.config.height;
        let image = self
            .source
            .capture_frame(width, height)
            .map_err(JobError::FrameSource)?;
        if image.width() != width || image.height() != height {
            return Err(JobError::FrameSource(anyhow::anyhow!(
                "frame source returned {}x{} for a {}x{} request",
                image.width(),
                image.height(),
                width,
                height
            )));
        }
        Ok(FrameSample {
            image,
            timestamp_ms,
        })
    }
}
