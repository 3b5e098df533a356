use std::sync::Arc;

use image::{DynamicImage, Rgba, RgbaImage};
use tempfile::tempdir;
use watermark_compositor::{
    batch::EventLog,
    video::{FrameRate, FrameReader},
    BatchEvent, BatchPipeline, Compositor, ImageCompositor, Logo, Position, VideoCompositor, WatermarkConfig,
};

fn compositor() -> Option<VideoCompositor> {
    if !VideoCompositor::check_ffmpeg_available() {
        eprintln!("ffmpeg not available, skipping");
        return None;
    }
    let compositor = VideoCompositor::default();
    if !compositor.tools_available() || !compositor.encoder_available("libx264") {
        eprintln!("ffprobe or libx264 not available, skipping");
        return None;
    }
    Some(compositor)
}

fn red_logo() -> Logo {
    Logo::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        400,
        200,
        Rgba([255, 0, 0, 255]),
    )))
}

#[test]
fn test_full_hd_clip_keeps_every_frame() {
    let Some(compositor) = compositor() else { return };
    let dir = tempdir().unwrap();
    let input = dir.path().join("source.mp4");
    let output = dir.path().join("watermarked.mp4");

    let fps = FrameRate { num: 30, den: 1 };
    compositor.create_test_video(&input, 1920, 1080, fps, 90).unwrap();

    let config = WatermarkConfig {
        scale: 0.2,
        opacity: 1.0,
        position: Position::BottomRight,
        offset_x: 10,
        offset_y: 10,
    };
    let encoded = compositor.watermark_video(&input, &output, &red_logo(), &config).unwrap();
    assert_eq!(encoded.frame_count, 90);

    let metadata = compositor.probe(&output).unwrap();
    assert_eq!((metadata.width, metadata.height), (1920, 1080));
    assert_eq!(metadata.fps, fps);

    // 400x200 logo on 1920x1080 at scale 0.2: factor min(0.96, 1.08) = 0.96 -> 384x192
    let (logo_w, logo_h) = (384u32, 192u32);
    let (x, y) = (1920 - logo_w - 10, 1080 - logo_h - 10);

    let reader = FrameReader::open(&compositor.config().ffmpeg, &output, &metadata).unwrap();
    let mut count = 0;
    for frame in reader {
        let frame = frame.unwrap();
        count += 1;

        let [r, g, b] = frame.get_pixel(x + logo_w / 2, y + logo_h / 2);
        assert!(r > 200 && g < 60 && b < 60, "logo centre is {:?}", [r, g, b]);

        let [r, g, b] = frame.get_pixel(20, 20);
        assert!(!(r > 200 && g < 60 && b < 60), "background turned red at frame {}", count);
    }
    assert_eq!(count, 90);
}

#[test]
fn test_webm_output_uses_vp9() {
    let Some(compositor) = compositor() else { return };
    if !compositor.encoder_available("libvpx-vp9") {
        eprintln!("libvpx-vp9 not available, skipping");
        return;
    }
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    let output = dir.path().join("clip_out.webm");

    compositor
        .create_test_video(&input, 160, 120, FrameRate { num: 24, den: 1 }, 6)
        .unwrap();
    compositor
        .composite(&input, &output, &red_logo(), &WatermarkConfig::default())
        .unwrap();

    let metadata = compositor.probe(&output).unwrap();
    assert_eq!(metadata.codec, "vp9");
}

#[test]
fn test_batch_mixes_images_and_videos() {
    let Some(_) = compositor() else { return };
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir_all(&input).unwrap();

    VideoCompositor::default()
        .create_test_video(&input.join("b.mp4"), 320, 180, FrameRate { num: 25, den: 1 }, 10)
        .unwrap();
    RgbaImage::from_pixel(300, 300, Rgba([0, 0, 255, 255]))
        .save(input.join("a.png"))
        .unwrap();
    std::fs::write(input.join("c.mp4"), b"broken").unwrap();

    let output = dir.path().join("out");
    let pipeline = BatchPipeline::new(
        WatermarkConfig::default(),
        Arc::new(red_logo()),
        &output,
        Box::new(ImageCompositor::default()),
        Box::new(VideoCompositor::default()),
    )
    .unwrap();

    let log = EventLog::new();
    let report = pipeline.run(&[input], &log);
    let events = log.into_events();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded.len(), 2);
    assert!(output.join("a.png").exists());
    assert!(output.join("b.mp4").exists());
    assert!(!output.join("c.mp4").exists());
    assert!(events
        .iter()
        .any(|e| matches!(e, BatchEvent::ItemFailed { file_name, .. } if file_name == "c.mp4")));
    assert_eq!(events.last(), Some(&BatchEvent::Completed { total: 3 }));
}
