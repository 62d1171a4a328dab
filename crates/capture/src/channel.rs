use dcap_frame_converter::ConvertedFrame;
use parking_lot::Mutex;

/// Copy of the most recently published frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub version: u64,
}

#[derive(Default)]
struct Latest {
    data: Vec<u8>,
    width: u32,
    height: u32,
    version: u64,
}

/// Single-slot holder for the newest output frame. Publishing overwrites;
/// readers copy out under the same lock, so a torn frame is never visible.
#[derive(Default)]
pub struct FrameChannel {
    latest: Mutex<Latest>,
}

impl FrameChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: &ConvertedFrame) {
        let mut latest = self.latest.lock();
        latest.data.clear();
        latest.data.extend_from_slice(frame.as_bytes());
        latest.width = frame.width();
        latest.height = frame.height();
        latest.version += 1;
    }

    /// Copies as much of the latest frame as fits in `dst` and returns the
    /// number of bytes written. Zero until something is published.
    pub fn try_snapshot(&self, dst: &mut [u8]) -> usize {
        let latest = self.latest.lock();
        let n = dst.len().min(latest.data.len());
        dst[..n].copy_from_slice(&latest.data[..n]);
        n
    }

    pub fn snapshot(&self) -> Option<PublishedFrame> {
        let latest = self.latest.lock();
        (latest.version > 0).then(|| PublishedFrame {
            data: latest.data.clone(),
            width: latest.width,
            height: latest.height,
            version: latest.version,
        })
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let latest = self.latest.lock();
        (latest.version > 0).then_some((latest.width, latest.height))
    }

    pub fn version(&self) -> u64 {
        self.latest.lock().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    fn filled(width: u32, height: u32, value: u8) -> ConvertedFrame {
        let mut frame = ConvertedFrame::new(width, height).unwrap();
        for y in 0..height as usize {
            frame.row_mut(y).fill(value);
        }
        frame
    }

    #[test]
    fn empty_before_first_publish() {
        let channel = FrameChannel::new();
        let mut dst = [0xAA; 16];

        assert_eq!(channel.try_snapshot(&mut dst), 0);
        assert_eq!(dst, [0xAA; 16]);
        assert!(channel.snapshot().is_none());
        assert!(channel.dimensions().is_none());
    }

    #[test]
    fn latest_publish_wins() {
        let channel = FrameChannel::new();
        channel.publish(&filled(2, 1, 1));
        channel.publish(&filled(1, 1, 2));

        let snapshot = channel.snapshot().unwrap();
        assert_eq!(snapshot.data, vec![2; 4]);
        assert_eq!((snapshot.width, snapshot.height), (1, 1));
        assert_eq!(snapshot.version, 2);
    }

    #[test]
    fn snapshot_is_truncated_to_destination() {
        let channel = FrameChannel::new();
        channel.publish(&filled(2, 2, 9));

        let mut small = [0u8; 5];
        assert_eq!(channel.try_snapshot(&mut small), 5);
        assert_eq!(small, [9; 5]);

        let mut large = [0u8; 64];
        assert_eq!(channel.try_snapshot(&mut large), 16);
        assert_eq!(&large[16..], &[0; 48]);
    }

    #[test]
    fn readers_never_see_mixed_frames() {
        let channel = Arc::new(FrameChannel::new());
        let writer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let a = filled(64, 64, 0x11);
                let b = filled(64, 64, 0x22);
                for i in 0..500 {
                    channel.publish(if i % 2 == 0 { &a } else { &b });
                }
            })
        };

        let mut dst = vec![0u8; 64 * 64 * 4];
        for _ in 0..500 {
            if channel.try_snapshot(&mut dst) > 0 {
                assert!(dst.iter().all(|b| *b == dst[0]));
            }
        }

        writer.join().unwrap();
        assert_eq!(channel.version(), 500);
    }
}
