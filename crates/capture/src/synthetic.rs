//! In-process board that produces generated frames.
//!
//! Every aspect a real board varies on can be scripted: the sequence of
//! detected formats, whether input is present, per-stream field parity, row
//! padding and injected failures. Formats and input presence can also be
//! pushed while a session is running through [`SyntheticControl`].

use crate::{Board, CaptureStream, DeviceError, Driver, Slot};
use dcap_media_info::{FieldParity, PixelPacking, VideoFormat};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, trace};

#[derive(Clone, Default)]
pub enum TestPattern {
    #[default]
    ColorBars,
    Gradient,
    Solid {
        r: u8,
        g: u8,
        b: u8,
    },
    /// Fills row `y` (without padding) in the stream's packing.
    Custom(Arc<dyn Fn(usize, &mut [u8]) + Send + Sync>),
}

impl fmt::Debug for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColorBars => write!(f, "ColorBars"),
            Self::Gradient => write!(f, "Gradient"),
            Self::Solid { r, g, b } => write!(f, "Solid({r}, {g}, {b})"),
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Behaviour of one synthetic stream.
#[derive(Debug, Clone)]
pub struct StreamSetup {
    formats: Vec<VideoFormat>,
    pattern: TestPattern,
    row_padding: usize,
    truncate: usize,
    parity: FieldParity,
    frame_interval: Duration,
    fail_open: bool,
    fail_start: bool,
    fail_stop: bool,
    fail_pop_after: Option<u64>,
}

impl StreamSetup {
    pub fn new(format: VideoFormat) -> Self {
        Self {
            formats: vec![format],
            pattern: TestPattern::default(),
            row_padding: 0,
            truncate: 0,
            parity: FieldParity::Unknown,
            frame_interval: Duration::from_millis(1),
            fail_open: false,
            fail_start: false,
            fail_stop: false,
            fail_pop_after: None,
        }
    }

    /// One format per detection. The last one repeats.
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = VideoFormat>) -> Self {
        let formats: Vec<_> = formats.into_iter().collect();
        if !formats.is_empty() {
            self.formats = formats;
        }
        self
    }

    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_row_padding(mut self, bytes: usize) -> Self {
        self.row_padding = bytes;
        self
    }

    /// Cuts `bytes` off the end of every slot.
    pub fn with_truncated_slots(mut self, bytes: usize) -> Self {
        self.truncate = bytes;
        self
    }

    pub fn with_parity(mut self, parity: FieldParity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// `stop` errors and leaves the stream running.
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn failing_pop_after(mut self, pops: u64) -> Self {
        self.fail_pop_after = Some(pops);
        self
    }
}

/// Settings a stream held when it was last configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub queue_depth: u32,
    pub packing: PixelPacking,
    pub field_merge: bool,
}

#[derive(Debug, Default)]
pub struct SyntheticCounters {
    boards_opened: AtomicU64,
    streams_opened: AtomicU64,
    detections: AtomicU64,
    configures: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    slots_popped: AtomicU64,
    waits: AtomicU64,
    applied: Mutex<BTreeMap<u32, StreamSettings>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub boards_opened: u64,
    pub streams_opened: u64,
    pub detections: u64,
    pub configures: u64,
    pub starts: u64,
    pub stops: u64,
    pub slots_popped: u64,
    pub waits: u64,
}

impl SyntheticCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            boards_opened: self.boards_opened.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            configures: self.configures.load(Ordering::Relaxed),
            starts: self.starts.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            slots_popped: self.slots_popped.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }

    pub fn applied(&self, stream: u32) -> Option<StreamSettings> {
        self.applied.lock().get(&stream).copied()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

type FormatQueue = (flume::Sender<VideoFormat>, flume::Receiver<VideoFormat>);

#[derive(Default)]
struct FormatQueues(Mutex<BTreeMap<u32, FormatQueue>>);

impl FormatQueues {
    fn get(&self, index: u32) -> FormatQueue {
        self.0
            .lock()
            .entry(index)
            .or_insert_with(flume::unbounded)
            .clone()
    }
}

/// Pushes input changes into a driver that has already been handed to a
/// session.
#[derive(Clone)]
pub struct SyntheticControl {
    input_tx: flume::Sender<bool>,
    queues: Arc<FormatQueues>,
    counters: Arc<SyntheticCounters>,
}

impl SyntheticControl {
    /// Queues the result of upcoming input waits.
    pub fn push_input(&self, present: bool) {
        let _ = self.input_tx.send(present);
    }

    /// The format `stream` reports from its next detection on, once its
    /// scripted formats are used up.
    pub fn push_format(&self, stream: u32, format: VideoFormat) {
        let _ = self.queues.get(stream).0.send(format);
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// What the session last configured `stream` with.
    pub fn applied(&self, stream: u32) -> Option<StreamSettings> {
        self.counters.applied(stream)
    }
}

pub struct SyntheticDriver {
    default_stream: StreamSetup,
    streams: BTreeMap<u32, StreamSetup>,
    input_default: bool,
    input: (flume::Sender<bool>, flume::Receiver<bool>),
    wait_interval: Duration,
    fail_open: bool,
    queues: Arc<FormatQueues>,
    counters: Arc<SyntheticCounters>,
}

impl SyntheticDriver {
    /// Every stream behaves like `setup` unless overridden.
    pub fn new(setup: StreamSetup) -> Self {
        Self {
            default_stream: setup,
            streams: BTreeMap::new(),
            input_default: true,
            input: flume::unbounded(),
            wait_interval: Duration::from_millis(5),
            fail_open: false,
            queues: Arc::default(),
            counters: Arc::default(),
        }
    }

    pub fn with_stream(mut self, index: u32, setup: StreamSetup) -> Self {
        self.streams.insert(index, setup);
        self
    }

    /// Results of the first input waits, in order. Afterwards waits return
    /// the default.
    pub fn with_input_script(self, script: impl IntoIterator<Item = bool>) -> Self {
        for present in script {
            let _ = self.input.0.send(present);
        }
        self
    }

    pub fn with_input_default(mut self, present: bool) -> Self {
        self.input_default = present;
        self
    }

    /// How long a wait without input blocks before returning.
    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn control(&self) -> SyntheticControl {
        SyntheticControl {
            input_tx: self.input.0.clone(),
            queues: Arc::clone(&self.queues),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl Driver for SyntheticDriver {
    type Board = SyntheticBoard;

    fn open_board(&self, device_id: u32) -> Result<SyntheticBoard, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::BoardNotFound(device_id));
        }
        SyntheticCounters::bump(&self.counters.boards_opened);
        debug!("Opened synthetic board {device_id}");

        Ok(SyntheticBoard {
            device_id,
            default_stream: self.default_stream.clone(),
            streams: self.streams.clone(),
            input_default: self.input_default,
            input_rx: self.input.1.clone(),
            wait_interval: self.wait_interval,
            queues: Arc::clone(&self.queues),
            counters: Arc::clone(&self.counters),
        })
    }
}

pub struct SyntheticBoard {
    device_id: u32,
    default_stream: StreamSetup,
    streams: BTreeMap<u32, StreamSetup>,
    input_default: bool,
    input_rx: flume::Receiver<bool>,
    wait_interval: Duration,
    queues: Arc<FormatQueues>,
    counters: Arc<SyntheticCounters>,
}

impl Board for SyntheticBoard {
    type Stream = SyntheticStream;

    fn open_stream(&mut self, index: u32) -> Result<SyntheticStream, DeviceError> {
        let setup = self
            .streams
            .get(&index)
            .unwrap_or(&self.default_stream)
            .clone();

        if setup.fail_open {
            return Err(DeviceError::StreamUnavailable {
                board: self.device_id,
                index,
            });
        }
        SyntheticCounters::bump(&self.counters.streams_opened);

        let script: VecDeque<_> = setup.formats.iter().copied().collect();
        let current = setup.formats[0];

        Ok(SyntheticStream {
            index,
            setup,
            script,
            pushed: self.queues.get(index).1,
            current,
            configured: None,
            packing: PixelPacking::default(),
            field_merge: false,
            queue_depth: 0,
            started: false,
            buffer: Vec::new(),
            pops: 0,
            counters: Arc::clone(&self.counters),
        })
    }

    fn wait_for_input(&mut self, index: u32, running: &AtomicBool) -> bool {
        SyntheticCounters::bump(&self.counters.waits);

        let present = self.input_rx.try_recv().unwrap_or(self.input_default);
        if present {
            return running.load(Ordering::Acquire);
        }

        trace!("No input on synthetic stream {index}");
        let deadline = Instant::now() + self.wait_interval;
        while running.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        false
    }
}

pub struct SyntheticStream {
    index: u32,
    setup: StreamSetup,
    script: VecDeque<VideoFormat>,
    pushed: flume::Receiver<VideoFormat>,
    current: VideoFormat,
    configured: Option<VideoFormat>,
    packing: PixelPacking,
    field_merge: bool,
    queue_depth: u32,
    started: bool,
    buffer: Vec<u8>,
    pops: u64,
    counters: Arc<SyntheticCounters>,
}

impl SyntheticStream {
    fn render(&mut self, format: &VideoFormat) {
        let width = format.width as usize;
        let height = format.height as usize;
        let row_bytes = width * self.packing.bytes_per_pixel();
        let pitch = row_bytes + self.setup.row_padding;

        self.buffer.clear();
        self.buffer.resize(pitch * height, 0);

        if row_bytes > 0 {
            for (y, row) in self.buffer.chunks_exact_mut(pitch).enumerate() {
                fill_row(
                    &self.setup.pattern,
                    self.packing,
                    (width, height),
                    y,
                    &mut row[..row_bytes],
                );
            }
        }

        let len = self.buffer.len().saturating_sub(self.setup.truncate);
        self.buffer.truncate(len);
    }
}

impl CaptureStream for SyntheticStream {
    type Slot<'a> = SyntheticSlot<'a>;

    fn detect_format(&mut self) -> Result<VideoFormat, DeviceError> {
        SyntheticCounters::bump(&self.counters.detections);

        if let Some(format) = self.script.pop_front() {
            self.current = format;
        } else if let Ok(format) = self.pushed.try_recv() {
            self.current = format;
        }
        Ok(self.current)
    }

    fn configure(&mut self, format: &VideoFormat) -> Result<(), DeviceError> {
        if self.started {
            return Err(DeviceError::Configure(format!(
                "stream {} is running",
                self.index
            )));
        }
        SyntheticCounters::bump(&self.counters.configures);
        self.counters.applied.lock().insert(
            self.index,
            StreamSettings {
                queue_depth: self.queue_depth,
                packing: self.packing,
                field_merge: self.field_merge,
            },
        );

        self.render(format);
        self.configured = Some(*format);
        Ok(())
    }

    fn set_queue_depth(&mut self, depth: u32) -> Result<(), DeviceError> {
        self.queue_depth = depth;
        Ok(())
    }

    fn set_packing(&mut self, packing: PixelPacking) -> Result<(), DeviceError> {
        self.packing = packing;
        Ok(())
    }

    fn enable_field_merge(&mut self, enabled: bool) -> Result<(), DeviceError> {
        self.field_merge = enabled;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        if self.configured.is_none() {
            return Err(DeviceError::Start(format!(
                "stream {} is not configured",
                self.index
            )));
        }
        if self.setup.fail_start {
            return Err(DeviceError::Start(format!(
                "injected failure on stream {}",
                self.index
            )));
        }
        SyntheticCounters::bump(&self.counters.starts);
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if self.started && self.setup.fail_stop {
            return Err(DeviceError::Stop(format!(
                "injected failure on stream {}",
                self.index
            )));
        }
        if self.started {
            SyntheticCounters::bump(&self.counters.stops);
            self.started = false;
        }
        Ok(())
    }

    fn pop_slot(&mut self) -> Result<SyntheticSlot<'_>, DeviceError> {
        if !self.started {
            return Err(DeviceError::PopSlot(format!(
                "stream {} is not started",
                self.index
            )));
        }
        if self.setup.fail_pop_after.is_some_and(|n| self.pops >= n) {
            return Err(DeviceError::PopSlot(format!(
                "injected failure on stream {} after {} slots",
                self.index, self.pops
            )));
        }

        if !self.setup.frame_interval.is_zero() {
            thread::sleep(self.setup.frame_interval);
        }
        self.pops += 1;
        SyntheticCounters::bump(&self.counters.slots_popped);

        Ok(SyntheticSlot {
            data: &self.buffer,
            parity: self.setup.parity,
        })
    }
}

pub struct SyntheticSlot<'a> {
    data: &'a [u8],
    parity: FieldParity,
}

impl Slot for SyntheticSlot<'_> {
    fn video(&self) -> &[u8] {
        self.data
    }

    fn parity(&self) -> FieldParity {
        self.parity
    }
}

const BAR_COLORS: [(u8, u8, u8); 8] = [
    (192, 192, 192),
    (192, 192, 0),
    (0, 192, 192),
    (0, 192, 0),
    (192, 0, 192),
    (192, 0, 0),
    (0, 0, 192),
    (0, 0, 0),
];

fn pattern_rgb(pattern: &TestPattern, x: usize, y: usize, size: (usize, usize)) -> (u8, u8, u8) {
    let (width, height) = size;
    match pattern {
        TestPattern::ColorBars => {
            let bar_width = (width / 8).max(1);
            BAR_COLORS[(x / bar_width).min(7)]
        }
        TestPattern::Gradient => {
            let level = (y * 255 / height.saturating_sub(1).max(1)) as u8;
            (level, level, level)
        }
        TestPattern::Solid { r, g, b } => (*r, *g, *b),
        TestPattern::Custom(_) => (0, 0, 0),
    }
}

fn fill_row(
    pattern: &TestPattern,
    packing: PixelPacking,
    size: (usize, usize),
    y: usize,
    row: &mut [u8],
) {
    if let TestPattern::Custom(fill) = pattern {
        fill(y, row);
        return;
    }

    match packing {
        PixelPacking::Yuv422_8 => {
            for (i, pair) in row.chunks_exact_mut(4).enumerate() {
                let (r0, g0, b0) = pattern_rgb(pattern, i * 2, y, size);
                let (r1, g1, b1) = pattern_rgb(pattern, i * 2 + 1, y, size);
                let (u, v) = rgb_to_uv(r0, g0, b0);
                pair.copy_from_slice(&[u, rgb_to_y(r0, g0, b0), v, rgb_to_y(r1, g1, b1)]);
            }
        }
        PixelPacking::Bgra8 => {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let (r, g, b) = pattern_rgb(pattern, x, y, size);
                px.copy_from_slice(&[b, g, r, 255]);
            }
        }
    }
}

fn rgb_to_y(r: u8, g: u8, b: u8) -> u8 {
    let y = 16.0 + (65.481 * f64::from(r) + 128.553 * f64::from(g) + 24.966 * f64::from(b)) / 255.0;
    y.clamp(16.0, 235.0) as u8
}

fn rgb_to_uv(r: u8, g: u8, b: u8) -> (u8, u8) {
    let u = 128.0 + (-37.797 * f64::from(r) - 74.203 * f64::from(g) + 112.0 * f64::from(b)) / 255.0;
    let v = 128.0 + (112.0 * f64::from(r) - 93.786 * f64::from(g) - 18.214 * f64::from(b)) / 255.0;
    (u.clamp(16.0, 240.0) as u8, v.clamp(16.0, 240.0) as u8)
}
