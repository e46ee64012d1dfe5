//! Job lifecycle: states, events, and the single-flight service.

mod cancel;
mod pipeline;
mod seek;

pub use pipeline::{Job, JobHandle};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::JobConfig;
use crate::encode::JobResult;
use crate::error::{ConfigError, JobError};
use crate::quantize::{NeuQuantizer, Quantizer};
use crate::source::FrameSource;

/// Lifecycle of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Seeking,
    Capturing,
    Encoding,
    Finalizing,
    Complete,
    Aborted,
    Errored,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::Aborted | JobState::Errored
        )
    }
}

/// Signals delivered to the caller over the job's event channel. Exactly
/// one of `Complete`, `Aborted` or `Error` fires per job, after zero or
/// more `Progress` events.
#[derive(Debug)]
pub enum JobEvent {
    Progress { ratio: f32, frames_written: u32 },
    Complete(JobResult),
    Aborted,
    Error(JobError),
}

/// Receiving half of a job's event channel.
pub type JobEvents = UnboundedReceiver<JobEvent>;

/// Creates and tracks jobs, enforcing the single-flight rule: at most one
/// job is non-terminal per service instance, and starting a new job aborts
/// any prior one.
#[derive(Default)]
pub struct GifService {
    active: Option<JobHandle>,
}

impl GifService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config` and prepares a job over `source` with the default
    /// quantizer. The returned job makes no progress until `Job::run` is
    /// awaited.
    pub fn create_job<S: FrameSource>(
        &mut self,
        config: JobConfig,
        source: S,
    ) -> Result<(Job<S, NeuQuantizer>, JobEvents), ConfigError> {
        let quantizer = NeuQuantizer::new(config.quality);
        self.create_job_with(config, source, quantizer)
    }

    /// As [`GifService::create_job`], with a caller-supplied quantizer.
    pub fn create_job_with<S: FrameSource, Q: Quantizer>(
        &mut self,
        config: JobConfig,
        source: S,
        quantizer: Q,
    ) -> Result<(Job<S, Q>, JobEvents), ConfigError> {
        config.validate()?;
        if let Some(previous) = self.active.take() {
            previous.abort();
        }
        let (job, events) = Job::new(config, source, quantizer);
        self.active = Some(job.handle());
        Ok((job, events))
    }

    /// Requests cancellation of the active job. No-op when idle or when the
    /// job has already terminated.
    pub fn abort(&self) {
        if let Some(handle) = &self.active {
            handle.abort();
        }
    }

    /// Aborts anything running and detaches from it.
    pub fn destroy(&mut self) {
        self.abort();
        self.active = None;
    }
}
