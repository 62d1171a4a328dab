use dcap_media_info::{FieldParity, PixelPacking, VideoFormat};
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Board {0} not found")]
    BoardNotFound(u32),
    #[error("Stream {index} is not available on board {board}")]
    StreamUnavailable { board: u32, index: u32 },
    #[error("Failed to detect signal: {0}")]
    Detect(String),
    #[error("Failed to configure stream: {0}")]
    Configure(String),
    #[error("Failed to start stream: {0}")]
    Start(String),
    #[error("Failed to stop stream: {0}")]
    Stop(String),
    #[error("Failed to pop slot: {0}")]
    PopSlot(String),
}

/// Entry point to the vendor SDK.
pub trait Driver: Send + 'static {
    type Board: Board;

    fn open_board(&self, device_id: u32) -> Result<Self::Board, DeviceError>;
}

pub trait Board {
    type Stream: CaptureStream;

    fn open_stream(&mut self, index: u32) -> Result<Self::Stream, DeviceError>;

    /// Waits a bounded time for a signal on the connector feeding `index`.
    ///
    /// Implementations must return `false` promptly once `running` is
    /// cleared.
    fn wait_for_input(&mut self, index: u32, running: &AtomicBool) -> bool;
}

/// One receive stream on a board.
pub trait CaptureStream {
    type Slot<'a>: Slot
    where
        Self: 'a;

    fn detect_format(&mut self) -> Result<VideoFormat, DeviceError>;

    fn configure(&mut self, format: &VideoFormat) -> Result<(), DeviceError>;

    fn set_queue_depth(&mut self, depth: u32) -> Result<(), DeviceError>;

    fn set_packing(&mut self, packing: PixelPacking) -> Result<(), DeviceError>;

    fn enable_field_merge(&mut self, enabled: bool) -> Result<(), DeviceError>;

    fn start(&mut self) -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Blocks until the board has filled a slot. The slot goes back to the
    /// driver when dropped.
    fn pop_slot(&mut self) -> Result<Self::Slot<'_>, DeviceError>;
}

pub trait Slot {
    /// Video bytes including any per-row padding.
    fn video(&self) -> &[u8];

    fn parity(&self) -> FieldParity;
}
