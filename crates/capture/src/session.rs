use crate::{
    CaptureError, CaptureWorker, Driver, FrameChannel, PublishedFrame, SessionConfig,
    SessionReport, diagnostics,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session is already active; nothing was changed.
    AlreadyRunning,
}

/// Host-facing handle: one session at a time, one latest-frame buffer.
///
/// The frame buffer outlives sessions, so the last published frame stays
/// readable after `stop` until a new session overwrites it.
#[derive(Default)]
pub struct Capture {
    channel: Arc<FrameChannel>,
    worker: Option<CaptureWorker>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<D: Driver>(
        &mut self,
        driver: D,
        config: SessionConfig,
    ) -> Result<StartOutcome, CaptureError> {
        if self.worker.is_some() {
            warn!("Capture already running, ignoring start");
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.worker = Some(CaptureWorker::spawn(
            driver,
            config,
            Arc::clone(&self.channel),
        )?);
        Ok(StartOutcome::Started)
    }

    /// Blocks until the session's thread has exited. `None` if nothing was
    /// running.
    pub fn stop(&mut self) -> Option<SessionReport> {
        let report = self.worker.take()?.stop();
        info!("Capture stopped after {} frames", report.frames_published);
        Some(report)
    }

    /// True from `start` until `stop`, even if the session ended on an
    /// error in between.
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// True once the session's thread has exited, whether or not `stop` has
    /// been called yet.
    pub fn has_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(CaptureWorker::is_finished)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.channel.dimensions()
    }

    /// Copies at most `dst.len()` bytes of the latest frame and returns how
    /// many were written.
    pub fn read_frame(&self, dst: &mut [u8]) -> usize {
        self.channel.try_snapshot(dst)
    }

    pub fn snapshot(&self) -> Option<PublishedFrame> {
        self.channel.snapshot()
    }

    pub fn channel(&self) -> &Arc<FrameChannel> {
        &self.channel
    }

    pub fn drain_log(&self) -> String {
        diagnostics::drain()
    }
}
