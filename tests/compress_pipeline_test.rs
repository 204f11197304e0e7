// End-to-end tests for the public compress pipeline
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_compress::compressor::{
    CompressConfig, CompressError, Compressor, FileHandle, LoaderStrategy, RenderMode, blob_to_data_url,
    compute_target_dimensions, data_url_to_blob,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format).expect("failed to encode fixture");
    cursor.into_inner()
}

/// 带细节纹理的 JPEG，接近真实照片的压缩特性。
fn photo_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x % 256) as u8,
            (y % 256) as u8,
            ((x * 7 + y * 13) % 256) as u8,
        ])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

#[tokio::test]
async fn large_jpeg_is_downscaled_and_smaller() {
    init_logger();
    let source = FileHandle::new("holiday.jpg", "image/jpeg", photo_jpeg(2000, 1000));

    let result = image_compress::compress(source.clone())
        .await
        .expect("compress should succeed");

    let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (800, 400));
    assert!(result.compress_file.size() < source.size());
    assert_eq!(image::guess_format(result.compress_file.data()).expect("format"), ImageFormat::Jpeg);
}

#[tokio::test]
async fn result_bundle_references_original_file_and_raster() {
    init_logger();
    let source = FileHandle::new("holiday.jpg", "image/jpeg", photo_jpeg(1200, 900));

    let result = image_compress::compress(source.clone())
        .await
        .expect("compress should succeed");

    assert_eq!(result.file, source);
    assert_eq!(result.file.data().as_ptr(), source.data().as_ptr());
    assert_eq!((result.image.width(), result.image.height()), (1200, 900));
    assert_eq!(result.compress_blob.data(), result.compress_file.data());
    assert_eq!(result.compress_blob.media_type(), "image/jpeg");
}

#[tokio::test]
async fn compressed_file_keeps_name_and_declared_type() {
    init_logger();
    let cases = [
        ("a.jpg", "image/jpeg", photo_jpeg(900, 300)),
        ("b.JPG", "image/jpg", photo_jpeg(300, 900)),
        ("c.png", "image/png", gradient_png(1000, 1000)),
        ("d.png", "IMAGE/PNG", gradient_png(64, 64)),
    ];

    for (name, media_type, bytes) in cases {
        let result = image_compress::compress(FileHandle::new(name, media_type, bytes))
            .await
            .expect("compress should succeed");

        assert_eq!(result.compress_file.name(), name);
        assert_eq!(result.compress_file.media_type(), media_type);
    }
}

#[tokio::test]
async fn blob_round_trip_reproduces_target_dimensions() {
    init_logger();
    let compressor = Compressor::new(CompressConfig::default()).expect("compressor init failed");
    let cases = [(2000, 1000), (1000, 2000), (1000, 1000), (640, 480), (801, 3)];

    for (width, height) in cases {
        let result = compressor
            .compress(FileHandle::new("p.png", "image/png", gradient_png(width, height)))
            .await
            .expect("compress should succeed");

        let target = compute_target_dimensions((width, height), (800, 800));
        let reparsed = data_url_to_blob(&blob_to_data_url(&result.compress_blob)).expect("round trip parse");
        let decoded = image::load_from_memory(reparsed.data()).expect("round trip decode");

        assert_eq!((decoded.width(), decoded.height()), (target.width, target.height));
    }
}

#[tokio::test]
async fn small_images_are_not_upscaled() {
    init_logger();
    let result = image_compress::compress(FileHandle::new("s.png", "image/png", gradient_png(120, 80)))
        .await
        .expect("compress should succeed");

    let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (120, 80));
}

#[tokio::test]
async fn custom_bounds_are_honoured() {
    init_logger();
    let config = CompressConfig::from_json_str(r#"{ "max_width": 300, "max_height": 200, "quality": 0.5 }"#)
        .expect("config should parse");
    let compressor = Compressor::new(config).expect("compressor init failed");

    let result = compressor
        .compress(FileHandle::new("w.jpg", "image/jpeg", photo_jpeg(1200, 600)))
        .await
        .expect("compress should succeed");

    let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (300, 150));
}

#[tokio::test]
async fn legacy_render_mode_keeps_output_dimensions() {
    init_logger();
    let config = CompressConfig {
        render_mode: RenderMode::LegacySquare,
        ..CompressConfig::default()
    };
    let compressor = Compressor::new(config).expect("compressor init failed");

    let result = compressor
        .compress(FileHandle::new("w.jpg", "image/jpeg", photo_jpeg(1600, 800)))
        .await
        .expect("compress should succeed");

    let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (800, 400));
}

#[tokio::test]
async fn data_url_fallback_matches_object_url_output() {
    init_logger();
    let fallback = Compressor::with_strategy(CompressConfig::default(), LoaderStrategy::probe(None))
        .expect("compressor init failed");
    let bytes = photo_jpeg(1500, 1000);

    let via_data_url = fallback
        .compress(FileHandle::new("x.jpg", "image/jpeg", bytes.clone()))
        .await
        .expect("compress should succeed");
    let via_object_url = image_compress::compress(FileHandle::new("x.jpg", "image/jpeg", bytes))
        .await
        .expect("compress should succeed");

    assert_eq!(via_data_url.compress_blob, via_object_url.compress_blob);
}

#[tokio::test]
async fn concurrent_calls_are_independent() {
    init_logger();
    let compressor = std::sync::Arc::new(Compressor::new(CompressConfig::default()).expect("compressor init failed"));

    let mut handles = Vec::new();
    for (width, height) in [(1600, 800), (800, 1600), (500, 500), (3000, 1000)] {
        let compressor = std::sync::Arc::clone(&compressor);
        handles.push(tokio::spawn(async move {
            let result = compressor
                .compress(FileHandle::new("c.png", "image/png", gradient_png(width, height)))
                .await
                .expect("compress should succeed");
            let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
            ((width, height), (decoded.width(), decoded.height()))
        }));
    }

    for handle in handles {
        let (natural, output) = handle.await.expect("task panicked");
        let target = compute_target_dimensions(natural, (800, 800));
        assert_eq!(output, (target.width, target.height));
    }
    assert_eq!(compressor.active_object_urls(), 0);
}

#[tokio::test]
async fn failures_map_to_distinct_kinds() {
    init_logger();

    let unsupported = image_compress::compress(FileHandle::new("n.txt", "text/plain", b"hello".to_vec())).await;
    assert!(matches!(unsupported, Err(CompressError::UnsupportedMediaType(_))));

    let undecodable = image_compress::compress(FileHandle::new("n.png", "image/png", b"hello world".to_vec())).await;
    assert!(matches!(undecodable, Err(CompressError::DecodeFailure(_))));

    let malformed = data_url_to_blob("image/png,AAAA");
    assert!(matches!(malformed, Err(CompressError::MalformedDataUrl(_))));
}

#[tokio::test]
async fn reads_source_from_disk() {
    init_logger();
    let dir = tempfile::TempDir::new().expect("tempdir failed");
    let path = dir.path().join("from_disk.jpg");
    std::fs::write(&path, photo_jpeg(1000, 1600)).expect("write fixture failed");

    let source = FileHandle::from_path(&path).await.expect("read failed");
    let result = image_compress::compress(source).await.expect("compress should succeed");

    assert_eq!(result.compress_file.name(), "from_disk.jpg");
    assert_eq!(result.compress_file.media_type(), "image/jpeg");
    let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (500, 800));
}

/// 在 SOI 之后插入 EXIF APP1 段，只带 Orientation 标签。
fn tag_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\x00\x00");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[tokio::test]
async fn portrait_phone_photo_keeps_upright_orientation() {
    init_logger();
    let bytes = tag_orientation(&photo_jpeg(1600, 800), 6);

    let result = image_compress::compress(FileHandle::new("portrait.jpg", "image/jpeg", bytes))
        .await
        .expect("compress should succeed");

    assert_eq!((result.image.width(), result.image.height()), (800, 1600));
    let decoded = image::load_from_memory(result.compress_file.data()).expect("output should decode");
    assert_eq!((decoded.width(), decoded.height()), (400, 800));
}
