use dcap_capture::{
    Capture, CaptureError, CaptureMode, DeviceError, SessionConfig, StartOutcome, StereoFormat,
    synthetic::{StreamSettings, StreamSetup, SyntheticDriver, TestPattern},
};
use dcap_media_info::{
    CableColorSpace, CableSampling, FieldParity, PixelPacking, SignalInformation, VideoFormat,
};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn rows(rows: Vec<Vec<u8>>) -> TestPattern {
    TestPattern::Custom(Arc::new(move |y: usize, row: &mut [u8]| {
        row.copy_from_slice(&rows[y])
    }))
}

/// 4x2 UYVY: black, white, red-ish pair / mid grey pair, white, black.
fn reference_pattern() -> TestPattern {
    rows(vec![
        vec![128, 16, 128, 235, 90, 82, 240, 82],
        vec![128, 126, 128, 126, 128, 235, 128, 16],
    ])
}

const REFERENCE_ROW_0: [u8; 16] = [
    0, 0, 0, 255, 255, 255, 255, 255, 0, 1, 255, 255, 0, 1, 255, 255,
];
const REFERENCE_ROW_1: [u8; 16] = [
    128, 128, 128, 255, 128, 128, 128, 255, 255, 255, 255, 255, 0, 0, 0, 255,
];

fn small() -> VideoFormat {
    VideoFormat::dv(4, 2, 60)
}

#[test]
fn single_stream_frame_is_converted_exactly() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()).with_pattern(reference_pattern()));
    let control = driver.control();

    let mut capture = Capture::new();
    let config = SessionConfig::default()
        .with_queue_depth(1)
        .with_flip(false);
    assert_eq!(capture.start(driver, config).unwrap(), StartOutcome::Started);

    assert!(wait_until(|| capture.dimensions().is_some()));
    assert_eq!(capture.dimensions(), Some((4, 2)));

    let mut frame = [0u8; 32];
    assert_eq!(capture.read_frame(&mut frame), 32);
    assert_eq!(&frame[..16], &REFERENCE_ROW_0);
    assert_eq!(&frame[16..], &REFERENCE_ROW_1);

    let report = capture.stop().unwrap();
    assert!(report.frames_published >= 1);
    assert_eq!(report.error, None);
    assert!(!capture.is_active());

    let counters = control.counters();
    assert_eq!(counters.starts, 1);
    assert_eq!(counters.stops, 1);
    assert_eq!(
        control.applied(0),
        Some(StreamSettings {
            queue_depth: 1,
            packing: PixelPacking::Yuv422_8,
            field_merge: false,
        })
    );
}

#[test]
fn flip_is_applied_before_publishing() {
    let driver = SyntheticDriver::new(
        StreamSetup::new(small())
            .with_pattern(reference_pattern())
            .with_row_padding(12),
    );

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| capture.snapshot().is_some()));

    let frame = capture.snapshot().unwrap();
    assert_eq!(&frame.data[..16], &REFERENCE_ROW_1);
    assert_eq!(&frame.data[16..], &REFERENCE_ROW_0);

    capture.stop();
}

#[test]
fn read_is_empty_before_first_frame() {
    let capture = Capture::new();
    let mut frame = [0u8; 8];

    assert_eq!(capture.read_frame(&mut frame), 0);
    assert_eq!(capture.dimensions(), None);
}

#[test]
fn stop_before_any_frame_then_restart() {
    let idle = SyntheticDriver::new(StreamSetup::new(small()))
        .with_input_default(false)
        .with_wait_interval(Duration::from_secs(30));

    let mut capture = Capture::new();
    capture.start(idle, SessionConfig::default()).unwrap();
    assert!(capture.is_active());

    let started = Instant::now();
    let report = capture.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.frames_published, 0);
    assert_eq!(report.error, None);
    assert_eq!(capture.read_frame(&mut [0u8; 8]), 0);

    let driver = SyntheticDriver::new(StreamSetup::new(small()));
    assert_eq!(
        capture.start(driver, SessionConfig::default()).unwrap(),
        StartOutcome::Started
    );
    assert!(wait_until(|| capture.dimensions() == Some((4, 2))));
    assert!(capture.stop().unwrap().frames_published >= 1);
}

#[test]
fn starting_twice_is_a_no_op() {
    let mut capture = Capture::new();
    capture
        .start(
            SyntheticDriver::new(StreamSetup::new(small())),
            SessionConfig::default(),
        )
        .unwrap();

    let second = SyntheticDriver::new(StreamSetup::new(VideoFormat::dv(8, 8, 60)));
    let second_control = second.control();
    assert_eq!(
        capture.start(second, SessionConfig::default()).unwrap(),
        StartOutcome::AlreadyRunning
    );

    assert!(wait_until(|| capture.dimensions().is_some()));
    assert_eq!(capture.dimensions(), Some((4, 2)));
    assert_eq!(second_control.counters().boards_opened, 0);

    capture.stop();
    assert!(capture.stop().is_none());
}

#[test]
fn format_change_reconfigures_once() {
    let f = small();
    let g = VideoFormat::dv(8, 4, 60);
    let driver = SyntheticDriver::new(StreamSetup::new(f).with_formats([f, f, f, g, g]));
    let control = driver.control();

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| capture.dimensions() == Some((8, 4))));

    let frame = capture.snapshot().unwrap();
    assert_eq!(frame.data.len(), 8 * 4 * 4);

    let report = capture.stop().unwrap();
    assert_eq!(report.reconfigurations, 1);
    assert_eq!(report.error, None);

    let counters = control.counters();
    assert_eq!(counters.configures, 2);
    assert_eq!(counters.starts, 2);
    assert_eq!(counters.stops, 2);
}

#[test]
fn format_pushed_mid_session_is_followed() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()));
    let control = driver.control();

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| capture.dimensions() == Some((4, 2))));

    control.push_format(0, VideoFormat::dv(6, 2, 60));
    assert!(wait_until(|| capture.dimensions() == Some((6, 2))));

    assert_eq!(capture.stop().unwrap().reconfigurations, 1);
}

#[test]
fn signal_loss_resumes_without_reconfiguring() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()))
        .with_input_script([true, true, false, false])
        .with_wait_interval(Duration::from_millis(1));
    let control = driver.control();

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| capture.channel().version() >= 3));

    let report = capture.stop().unwrap();
    assert_eq!(report.signal_losses, 1);
    assert_eq!(report.reconfigurations, 0);
    assert_eq!(control.counters().starts, 1);
}

#[test]
fn stereo_legs_are_packed_side_by_side() {
    let white = rows(vec![vec![128, 235, 128, 235, 128, 235, 128, 235]; 2]);
    let black = rows(vec![vec![128, 16, 128, 16]]);

    let driver = SyntheticDriver::new(StreamSetup::new(small()).with_pattern(white))
        .with_stream(
            1,
            StreamSetup::new(VideoFormat::dv(2, 1, 60))
                .with_pattern(black)
                .with_parity(FieldParity::Odd),
        );
    let control = driver.control();

    let config = SessionConfig::default()
        .with_flip(false)
        .with_mode(CaptureMode::Stereo {
            right_stream: 1,
            format: StereoFormat::Detect,
            deinterlace: true,
        });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.snapshot().is_some()));

    let frame = capture.snapshot().unwrap();
    assert_eq!((frame.width, frame.height), (6, 2));

    let pitch = 6 * 4;
    let (row0, row1) = frame.data.split_at(pitch);
    assert_eq!(&row0[..16], &[255; 16]);
    assert_eq!(&row0[16..], &[0, 0, 0, 255, 0, 0, 0, 255]);
    assert_eq!(&row1[..16], &[255; 16]);
    assert_eq!(&row1[16..], &[0; 8]);

    let report = capture.stop().unwrap();
    assert_eq!(report.error, None);

    let counters = control.counters();
    assert_eq!(counters.streams_opened, 2);
    assert_eq!(counters.starts, 2);
    assert_eq!(counters.stops, 2);

    let merged = StreamSettings {
        queue_depth: SessionConfig::DEFAULT_QUEUE_DEPTH,
        packing: PixelPacking::Yuv422_8,
        field_merge: true,
    };
    assert_eq!(control.applied(0), Some(merged));
    assert_eq!(control.applied(1), Some(merged));
}

#[test]
fn right_leg_start_failure_stops_the_left_leg() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()))
        .with_stream(1, StreamSetup::new(small()).failing_start());
    let control = driver.control();

    let config = SessionConfig::default().with_mode(CaptureMode::Stereo {
        right_stream: 1,
        format: StereoFormat::Detect,
        deinterlace: false,
    });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.has_finished()));

    let report = capture.stop().unwrap();
    assert!(matches!(
        report.error,
        Some(CaptureError::Device(DeviceError::Start(_)))
    ));
    assert_eq!(report.frames_published, 0);

    let counters = control.counters();
    assert_eq!(counters.starts, 1);
    assert_eq!(counters.stops, 1);
}

#[test]
fn failed_stop_still_releases_the_other_leg() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()).failing_stop()).with_stream(
        1,
        StreamSetup::new(small()).with_formats([small(), VideoFormat::dv(2, 2, 60)]),
    );
    let control = driver.control();

    let config = SessionConfig::default().with_mode(CaptureMode::Stereo {
        right_stream: 1,
        format: StereoFormat::Detect,
        deinterlace: false,
    });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.has_finished()));

    let report = capture.stop().unwrap();
    assert!(matches!(
        report.error,
        Some(CaptureError::Device(DeviceError::Stop(_)))
    ));

    let counters = control.counters();
    assert_eq!(counters.starts, 2);
    assert_eq!(counters.stops, 1);
}

#[test]
fn pinned_stereo_ignores_detection() {
    let driver = SyntheticDriver::new(StreamSetup::new(VideoFormat::dv(16, 16, 60)));
    let control = driver.control();

    let config = SessionConfig::default().with_mode(CaptureMode::Stereo {
        right_stream: 1,
        format: StereoFormat::Pinned(SignalInformation::Dv {
            width: 4,
            height: 2,
            progressive: true,
            frame_rate: 60,
            color_space: CableColorSpace::Yuv709,
            sampling: CableSampling::Yuv422,
        }),
        deinterlace: true,
    });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.channel().version() >= 2));
    assert_eq!(capture.dimensions(), Some((8, 2)));

    let report = capture.stop().unwrap();
    assert_eq!(report.reconfigurations, 0);
    assert_eq!(control.counters().detections, 0);
}

#[test]
fn explicit_bgra_session_copies_frames() {
    let row0 = vec![1, 2, 3, 255, 4, 5, 6, 255, 7, 8, 9, 255, 10, 11, 12, 255];
    let row1 = vec![13, 14, 15, 255, 16, 17, 18, 255, 19, 20, 21, 255, 22, 23, 24, 255];
    let bgra = rows(vec![row0.clone(), row1.clone()]);
    let driver = SyntheticDriver::new(StreamSetup::new(small()).with_pattern(bgra));
    let control = driver.control();

    let config = SessionConfig::default()
        .with_flip(false)
        .with_mode(CaptureMode::Explicit {
            signal: SignalInformation::Dv {
                width: 4,
                height: 2,
                progressive: true,
                frame_rate: 60,
                color_space: CableColorSpace::Yuv709,
                sampling: CableSampling::Yuv422,
            },
            packing: PixelPacking::Bgra8,
            field_merge: true,
        });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.channel().version() >= 2));

    let frame = capture.snapshot().unwrap();
    assert_eq!(frame.data, [row0, row1].concat());

    let report = capture.stop().unwrap();
    assert_eq!(report.reconfigurations, 0);
    assert_eq!(
        control.applied(0),
        Some(StreamSettings {
            queue_depth: SessionConfig::DEFAULT_QUEUE_DEPTH,
            packing: PixelPacking::Bgra8,
            field_merge: true,
        })
    );
}

#[test]
fn explicit_bgra_session_accepts_odd_width() {
    let row0 = vec![1, 2, 3, 255, 4, 5, 6, 255, 7, 8, 9, 255];
    let row1 = vec![10, 11, 12, 255, 13, 14, 15, 255, 16, 17, 18, 255];
    let bgra = rows(vec![row0.clone(), row1.clone()]);
    let driver =
        SyntheticDriver::new(StreamSetup::new(VideoFormat::dv(3, 2, 60)).with_pattern(bgra));

    let config = SessionConfig::default()
        .with_flip(false)
        .with_mode(CaptureMode::Explicit {
            signal: SignalInformation::Dv {
                width: 3,
                height: 2,
                progressive: true,
                frame_rate: 60,
                color_space: CableColorSpace::Yuv709,
                sampling: CableSampling::Yuv422,
            },
            packing: PixelPacking::Bgra8,
            field_merge: false,
        });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.channel().version() >= 1));

    let frame = capture.snapshot().unwrap();
    assert_eq!((frame.width, frame.height), (3, 2));
    assert_eq!(frame.data, [row0, row1].concat());

    let report = capture.stop().unwrap();
    assert_eq!(report.skipped_iterations, 0);
    assert_eq!(report.error, None);
}

#[test]
fn explicit_format_gives_way_to_detection() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()));
    let control = driver.control();

    let config = SessionConfig::explicit(SignalInformation::Dv {
        width: 8,
        height: 2,
        progressive: true,
        frame_rate: 60,
        color_space: CableColorSpace::Yuv709,
        sampling: CableSampling::Yuv422,
    });

    let mut capture = Capture::new();
    capture.start(driver, config).unwrap();
    assert!(wait_until(|| capture.dimensions() == Some((4, 2))));

    let report = capture.stop().unwrap();
    assert_eq!(report.reconfigurations, 1);
    assert_eq!(control.counters().configures, 2);
}

#[test]
fn acquisition_failure_ends_session_until_stopped() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()).failing_pop_after(2));
    let control = driver.control();

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| capture.has_finished()));

    assert!(capture.is_active());
    let retry = SyntheticDriver::new(StreamSetup::new(small()));
    assert_eq!(
        capture.start(retry, SessionConfig::default()).unwrap(),
        StartOutcome::AlreadyRunning
    );

    let report = capture.stop().unwrap();
    assert_eq!(report.frames_published, 2);
    assert!(matches!(
        report.error,
        Some(CaptureError::Device(DeviceError::PopSlot(_)))
    ));

    let counters = control.counters();
    assert_eq!(counters.starts, 1);
    assert_eq!(counters.stops, 1);

    let retry = SyntheticDriver::new(StreamSetup::new(small()));
    assert_eq!(
        capture.start(retry, SessionConfig::default()).unwrap(),
        StartOutcome::Started
    );
    capture.stop();
}

#[test]
fn missing_board_is_reported() {
    let driver = SyntheticDriver::new(StreamSetup::new(small())).failing_open();

    let mut capture = Capture::new();
    capture
        .start(driver, SessionConfig::default().with_device(4))
        .unwrap();
    assert!(wait_until(|| capture.has_finished()));

    let report = capture.stop().unwrap();
    assert_eq!(
        report.error,
        Some(CaptureError::Device(DeviceError::BoardNotFound(4)))
    );
}

#[test]
fn no_input_at_start_ends_session() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()))
        .with_input_default(false)
        .with_wait_interval(Duration::from_millis(1));
    let control = driver.control();

    let mut capture = Capture::new();
    capture
        .start(driver, SessionConfig::default().with_stream(2))
        .unwrap();
    assert!(wait_until(|| capture.has_finished()));

    let report = capture.stop().unwrap();
    assert_eq!(report.error, Some(CaptureError::NoInputDetected(2)));
    assert_eq!(control.counters().starts, 0);
}

#[test]
fn malformed_slots_are_skipped() {
    let driver = SyntheticDriver::new(StreamSetup::new(small()).with_truncated_slots(4));
    let control = driver.control();

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| control.counters().slots_popped >= 3));

    let report = capture.stop().unwrap();
    assert_eq!(report.frames_published, 0);
    assert!(report.skipped_iterations >= 3);
    assert_eq!(report.error, None);
    assert_eq!(capture.dimensions(), None);
}

#[test]
fn degenerate_format_is_skipped() {
    let driver = SyntheticDriver::new(StreamSetup::new(VideoFormat::dv(4, 0, 60)));
    let control = driver.control();

    let mut capture = Capture::new();
    capture.start(driver, SessionConfig::default()).unwrap();
    assert!(wait_until(|| control.counters().slots_popped >= 3));

    let report = capture.stop().unwrap();
    assert_eq!(report.frames_published, 0);
    assert!(report.skipped_iterations >= 3);
    assert_eq!(report.error, None);
}
