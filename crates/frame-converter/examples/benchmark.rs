use dcap_frame_converter::{
    ConversionConfig, ConvertedFrame, RawFrame, create_converter, deinterlace, pack_side_by_side,
    packed_dimensions,
};
use dcap_media_info::{FieldParity, PixelPacking};
use std::time::{Duration, Instant};

fn create_test_slot(width: u32, height: u32, padding: usize) -> (Vec<u8>, usize) {
    let pitch = width as usize * 2 + padding;
    let data = (0..pitch * height as usize)
        .map(|i| ((i * 17) % 256) as u8)
        .collect();
    (data, pitch)
}

fn benchmark_convert(iterations: u32, width: u32, height: u32, flip: bool) -> Duration {
    let converter = create_converter(ConversionConfig::new(PixelPacking::Yuv422_8, flip));
    let (data, pitch) = create_test_slot(width, height, 64);
    let raw = RawFrame::with_pitch(&data, pitch, width, height, FieldParity::Even);
    let mut output = ConvertedFrame::new(width, height).expect("Failed to allocate output");

    let mut total_time = Duration::ZERO;
    let mut first_frame = true;

    for _ in 0..iterations {
        let start = Instant::now();
        converter
            .convert(&raw, &mut output)
            .expect("Conversion failed");
        let elapsed = start.elapsed();

        if first_frame {
            println!("  First frame: {elapsed:?}");
            first_frame = false;
        }
        total_time += elapsed;
    }

    total_time
}

fn benchmark_deinterlace(iterations: u32, width: u32, height: u32) -> Duration {
    let source = ConvertedFrame::new(width, height).expect("Failed to allocate source");
    let mut output = ConvertedFrame::new(width, height).expect("Failed to allocate output");

    let start = Instant::now();
    for _ in 0..iterations {
        deinterlace(&source.view(), FieldParity::Even, &mut output).expect("Deinterlace failed");
    }
    start.elapsed()
}

fn benchmark_stereo(iterations: u32, width: u32, height: u32) -> Duration {
    let left = ConvertedFrame::new(width, height).expect("Failed to allocate left");
    let right = ConvertedFrame::new(width, height).expect("Failed to allocate right");
    let (w, h) = packed_dimensions(left.dimensions(), right.dimensions());
    let mut packed = ConvertedFrame::new(w, h).expect("Failed to allocate canvas");

    let start = Instant::now();
    for _ in 0..iterations {
        pack_side_by_side(
            &left.view(),
            &right.view(),
            true,
            FieldParity::Even,
            &mut packed,
        )
        .expect("Packing failed");
    }
    start.elapsed()
}

fn report(name: &str, total: Duration, iterations: u32) {
    let avg_per_frame = total / iterations;
    let max_fps = 1.0 / avg_per_frame.as_secs_f64();
    println!("  {name}: {avg_per_frame:?}/frame, {max_fps:.1} fps");
    println!(
        "  Can sustain 50fps: {}",
        if max_fps >= 50.0 { "YES" } else { "NO" }
    );
}

fn main() {
    println!("=== Capture Frame Conversion Benchmark ===\n");

    let warmup_iterations = 10;
    let test_iterations = 100;

    for (width, height) in [(720, 576), (1920, 1080), (3840, 2160)] {
        println!("--- UYVY -> BGRA {width}x{height} ---");

        println!("Warmup ({warmup_iterations} frames)...");
        let _ = benchmark_convert(warmup_iterations, width, height, true);

        println!("Benchmark ({test_iterations} frames)...");
        report(
            "flip",
            benchmark_convert(test_iterations, width, height, true),
            test_iterations,
        );
        report(
            "no flip",
            benchmark_convert(test_iterations, width, height, false),
            test_iterations,
        );
        println!();
    }

    println!("--- Bob deinterlace 1920x1080 ---");
    report(
        "deinterlace",
        benchmark_deinterlace(test_iterations, 1920, 1080),
        test_iterations,
    );
    println!();

    println!("--- Stereo pack 2x 1920x1080 (deinterlaced) ---");
    report(
        "pack",
        benchmark_stereo(test_iterations, 1920, 1080),
        test_iterations,
    );

    println!("\n=== Benchmark Complete ===");
}
