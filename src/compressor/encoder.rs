//! # 重编码模块
//!
//! ## 设计思路
//!
//! 模拟画布导出 `toDataURL(type, quality)` 的行为：
//! - JPEG 按质量因子有损编码，透明像素与黑色合成
//! - PNG 无损编码，质量因子不生效
//! - 其他类型回退为 PNG
//! - 质量因子越界时使用默认值 0.92

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, RgbaImage};

use super::CompressError;
use super::codec;
use super::media_type::SupportedMediaType;

const FALLBACK_QUALITY: f32 = 0.92;

/// 将画布编码为 data URL 文本。
pub(crate) fn encode_surface(
    surface: &RgbaImage,
    media_type: &str,
    quality: f32,
) -> Result<String, CompressError> {
    let (width, height) = surface.dimensions();
    if width == 0 || height == 0 {
        return Err(CompressError::EncodeFailure(format!(
            "画布面积为 0（{}x{}），无法导出",
            width, height
        )));
    }

    let format = SupportedMediaType::parse(media_type).unwrap_or_else(|| {
        log::debug!("声明类型 {:?} 不可导出，回退为 PNG", media_type);
        SupportedMediaType::Png
    });

    let bytes = match format {
        SupportedMediaType::Jpeg => encode_jpeg(surface, jpeg_quality(quality))?,
        SupportedMediaType::Png => encode_png(surface)?,
    };

    Ok(codec::encode_data_url(format.mime(), &bytes))
}

/// `[0, 1]` 质量因子 → JPEG 1~100 质量值。
fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() && (0.0..=1.0).contains(&quality) {
        quality
    } else {
        log::warn!("⚠️ 质量因子 {} 超出范围，使用默认值 {}", quality, FALLBACK_QUALITY);
        FALLBACK_QUALITY
    };

    ((quality * 100.0).round() as u8).clamp(1, 100)
}

fn encode_jpeg(surface: &RgbaImage, quality: u8) -> Result<Vec<u8>, CompressError> {
    let (width, height) = surface.dimensions();
    let rgb = RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = surface.get_pixel(x, y).0;
        let blend = |channel: u8| ((channel as u16 * a as u16 + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| CompressError::EncodeFailure(format!("JPEG 编码失败：{}", e)))?;

    Ok(buf)
}

fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>, CompressError> {
    let (width, height) = surface.dimensions();

    let mut buf = Vec::new();
    PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilterType::Adaptive)
        .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| CompressError::EncodeFailure(format!("PNG 编码失败：{}", e)))?;

    Ok(buf)
}
