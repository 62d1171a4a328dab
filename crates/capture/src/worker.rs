use crate::{
    Board, CaptureMode, CaptureStream, DeviceError, Driver, FrameChannel, SessionConfig, Slot,
    StateError,
    signal::{Decision, SignalState, SignalStateMachine},
};
use dcap_frame_converter::{
    ConversionConfig, ConvertError, ConvertedFrame, FrameConverter, RawFrame, create_converter,
    pack_side_by_side, packed_dimensions,
};
use dcap_media_info::{FieldParity, PixelPacking, VideoFormat};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("No input detected on stream {0}")]
    NoInputDetected(u32),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Failed to spawn capture thread: {0}")]
    Spawn(String),
    #[error("Capture thread panicked")]
    Panicked,
}

/// Counters collected over one session, returned by [`CaptureWorker::stop`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_published: u64,
    pub reconfigurations: u64,
    pub skipped_iterations: u64,
    pub signal_losses: u64,
    /// Why the session ended early, if it did.
    pub error: Option<CaptureError>,
}

/// Formats of every stream in the session, left leg first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveFormat {
    pub primary: VideoFormat,
    pub secondary: Option<VideoFormat>,
}

impl ActiveFormat {
    pub fn single(format: VideoFormat) -> Self {
        Self {
            primary: format,
            secondary: None,
        }
    }

    pub fn pair(left: VideoFormat, right: VideoFormat) -> Self {
        Self {
            primary: left,
            secondary: Some(right),
        }
    }

    pub fn legs(&self) -> impl Iterator<Item = &VideoFormat> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    pub fn is_degenerate(&self, packing: PixelPacking) -> bool {
        self.legs().any(|leg| leg.is_degenerate(packing))
    }

    /// Size of the frame the session publishes.
    pub fn output_dimensions(&self) -> (u32, u32) {
        let left = (self.primary.width, self.primary.height);
        match self.secondary {
            Some(right) => packed_dimensions(left, (right.width, right.height)),
            None => left,
        }
    }
}

impl fmt::Display for ActiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(right) => write!(f, "{} | {}", self.primary, right),
            None => write!(f, "{}", self.primary),
        }
    }
}

/// Owns the capture thread of one session.
///
/// Dropping the worker stops it and waits for the thread.
pub struct CaptureWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<SessionReport>>,
}

impl CaptureWorker {
    pub fn spawn<D: Driver>(
        driver: D,
        config: SessionConfig,
        channel: Arc<FrameChannel>,
    ) -> Result<Self, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));

        let handle = thread::Builder::new()
            .name(format!("capture-{}-{}", config.device_id, config.stream_index))
            .spawn({
                let running = Arc::clone(&running);
                move || Pipeline::new(config, channel, running).run(&driver)
            })
            .map_err(|e| CaptureError::Spawn(e.to_string()))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Whether the capture thread has exited on its own. The worker still
    /// has to be stopped before a new session can start.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Clears the running flag and joins the thread. When this returns every
    /// stream the session started has been stopped.
    pub fn stop(mut self) -> SessionReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> SessionReport {
        self.running.store(false, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return SessionReport::default();
        };

        handle.join().unwrap_or_else(|_| {
            error!("Capture thread panicked");
            SessionReport {
                error: Some(CaptureError::Panicked),
                ..Default::default()
            }
        })
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

/// Per-session state living on the capture thread.
struct Pipeline {
    config: SessionConfig,
    channel: Arc<FrameChannel>,
    running: Arc<AtomicBool>,
    machine: SignalStateMachine<ActiveFormat>,
    converter: Arc<dyn FrameConverter>,
    left: ConvertedFrame,
    right: ConvertedFrame,
    packed: ConvertedFrame,
    /// One flag per opened stream, set while the board has it started.
    live: Vec<bool>,
    report: SessionReport,
}

impl Pipeline {
    fn new(config: SessionConfig, channel: Arc<FrameChannel>, running: Arc<AtomicBool>) -> Self {
        let converter = create_converter(ConversionConfig::new(
            config.packing(),
            config.flip_vertical,
        ));

        Self {
            config,
            channel,
            running,
            machine: SignalStateMachine::new(),
            converter,
            left: ConvertedFrame::default(),
            right: ConvertedFrame::default(),
            packed: ConvertedFrame::default(),
            live: Vec::new(),
            report: SessionReport::default(),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn run<D: Driver>(mut self, driver: &D) -> SessionReport {
        info!(
            "Starting capture on device {} stream {} ({:?})",
            self.config.device_id, self.config.stream_index, self.config.mode
        );

        if let Err(e) = self.open_and_pump(driver) {
            error!("Capture session ended: {e}");
            self.report.error = Some(e);
        }

        self.machine.stop();
        self.report.reconfigurations = self.machine.reconfigurations();

        info!(
            "Capture finished: {} frames, {} reconfigurations, {} skipped",
            self.report.frames_published,
            self.report.reconfigurations,
            self.report.skipped_iterations
        );

        self.report
    }

    fn open_and_pump<D: Driver>(&mut self, driver: &D) -> Result<(), CaptureError> {
        let mut board = driver.open_board(self.config.device_id)?;
        let mut streams = self
            .config
            .stream_indices()
            .into_iter()
            .map(|index| board.open_stream(index))
            .collect::<Result<Vec<_>, _>>()?;
        self.live = vec![false; streams.len()];

        let result = self.pump(&mut board, &mut streams);
        self.halt(&mut streams);
        result
    }

    fn pump<B: Board>(
        &mut self,
        board: &mut B,
        streams: &mut [B::Stream],
    ) -> Result<(), CaptureError> {
        let connector = self.config.stream_index;

        while self.is_running() {
            if !board.wait_for_input(connector, &self.running) {
                if !self.is_running() {
                    break;
                }
                if self.machine.configured().is_none() {
                    return Err(CaptureError::NoInputDetected(connector));
                }
                if self.machine.signal_lost()? {
                    self.report.signal_losses += 1;
                    warn!("Signal lost on stream {connector}");
                }
                continue;
            }

            if matches!(self.machine.state(), SignalState::NoSignal) {
                self.machine.signal_present()?;
            }

            let detected = self.detect(streams)?;
            match self.machine.format_detected(detected)? {
                Decision::Configure(format) => {
                    info!("Configuring for {format}");
                    self.apply(streams, &format)?;
                }
                Decision::Reconfigure(format) => {
                    info!("Signal changed, reconfiguring for {format}");
                    self.stop_streams(streams)?;
                    self.machine.reconfigured()?;
                    self.apply(streams, &format)?;
                }
                Decision::Acquire => self.acquire(streams)?,
            }
        }

        Ok(())
    }

    fn detect<S: CaptureStream>(&self, streams: &mut [S]) -> Result<ActiveFormat, CaptureError> {
        let first_configuration = self.machine.configured().is_none();

        let format = match self.config.mode {
            CaptureMode::Auto => ActiveFormat::single(streams[0].detect_format()?),
            CaptureMode::Explicit { signal, .. } if first_configuration => {
                ActiveFormat::single(VideoFormat::from_signal(&signal))
            }
            CaptureMode::Explicit { .. } => ActiveFormat::single(streams[0].detect_format()?),
            CaptureMode::Stereo { format, .. } => match format.pinned_format() {
                Some(pinned) => ActiveFormat::pair(pinned, pinned),
                None => {
                    let left = streams[0].detect_format()?;
                    ActiveFormat::pair(left, streams[1].detect_format()?)
                }
            },
        };

        Ok(format)
    }

    /// Configures and starts every stream for `format`, resizing the frame
    /// buffers to match.
    fn apply<S: CaptureStream>(
        &mut self,
        streams: &mut [S],
        format: &ActiveFormat,
    ) -> Result<(), CaptureError> {
        self.resize_buffers(format)?;

        let depth = self.config.effective_queue_depth();
        for (stream, leg) in streams.iter_mut().zip(format.legs()) {
            stream.set_queue_depth(depth)?;
            stream.set_packing(self.config.packing())?;
            stream.enable_field_merge(self.config.field_merge())?;
            stream.configure(leg)?;
        }

        for (stream, live) in streams.iter_mut().zip(self.live.iter_mut()) {
            stream.start()?;
            *live = true;
        }
        self.machine.stream_started()?;

        debug!(
            "Streams started, output {:?}, queue depth {depth}",
            format.output_dimensions()
        );
        Ok(())
    }

    fn resize_buffers(&mut self, format: &ActiveFormat) -> Result<(), ConvertError> {
        self.left.resize(format.primary.width, format.primary.height)?;

        if let Some(right) = format.secondary {
            self.right.resize(right.width, right.height)?;
            let (width, height) = format.output_dimensions();
            self.packed.resize(width, height)?;
        }

        Ok(())
    }

    fn acquire<S: CaptureStream>(&mut self, streams: &mut [S]) -> Result<(), CaptureError> {
        let Some(format) = self.machine.configured().copied() else {
            return Ok(());
        };

        match (format.secondary, self.config.mode) {
            (Some(right), CaptureMode::Stereo { deinterlace, .. }) => {
                let left_parity = convert_leg(
                    &mut streams[0],
                    &format.primary,
                    self.converter.as_ref(),
                    &mut self.left,
                )?;
                let right_parity =
                    convert_leg(&mut streams[1], &right, self.converter.as_ref(), &mut self.right)?;

                let (Some(parity), Some(_)) = (left_parity, right_parity) else {
                    self.skip();
                    return Ok(());
                };

                pack_side_by_side(
                    &self.left.view(),
                    &self.right.view(),
                    deinterlace,
                    parity,
                    &mut self.packed,
                )?;
                self.channel.publish(&self.packed);
            }
            _ => {
                let parity = convert_leg(
                    &mut streams[0],
                    &format.primary,
                    self.converter.as_ref(),
                    &mut self.left,
                )?;
                if parity.is_none() {
                    self.skip();
                    return Ok(());
                }
                self.channel.publish(&self.left);
            }
        }

        self.report.frames_published += 1;
        trace!("Published frame {}", self.report.frames_published);
        Ok(())
    }

    fn skip(&mut self) {
        self.report.skipped_iterations += 1;
    }

    /// Stops every started stream. A stream whose stop fails stays marked
    /// live so `halt` tries it again.
    fn stop_streams<S: CaptureStream>(&mut self, streams: &mut [S]) -> Result<(), DeviceError> {
        for (stream, live) in streams.iter_mut().zip(self.live.iter_mut()) {
            if *live {
                stream.stop()?;
                *live = false;
            }
        }
        Ok(())
    }

    /// Stops whatever is still running. Errors are logged since the session
    /// is already ending.
    fn halt<S: CaptureStream>(&mut self, streams: &mut [S]) {
        for (stream, live) in streams.iter_mut().zip(self.live.iter_mut()) {
            if !*live {
                continue;
            }
            match stream.stop() {
                Ok(()) => *live = false,
                Err(e) => warn!("Failed to stop stream: {e}"),
            }
        }
    }
}

/// Pops one slot and converts it into `output`.
///
/// Returns the slot's field parity, or `None` when the iteration has to be
/// skipped because the format is unusable or the slot is malformed.
fn convert_leg<S: CaptureStream>(
    stream: &mut S,
    format: &VideoFormat,
    converter: &dyn FrameConverter,
    output: &mut ConvertedFrame,
) -> Result<Option<FieldParity>, CaptureError> {
    let slot = stream.pop_slot()?;

    if format.is_degenerate(converter.packing()) {
        debug!("Skipping slot for unusable format {format}");
        return Ok(None);
    }

    let parity = slot.parity();
    let raw = RawFrame::from_slot(slot.video(), format.width, format.height, parity)?;

    match converter.convert(&raw, output) {
        Ok(()) => Ok(Some(parity)),
        Err(e @ (ConvertError::SourceTooShort { .. } | ConvertError::PitchTooSmall { .. })) => {
            warn!("Dropping malformed slot: {e}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
