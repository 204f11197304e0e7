//! # 解码与绘制流水线模块
//!
//! ## 设计思路
//!
//! 将“引用 → 像素 → 目标画布”的过程集中管理，并在关键节点增加资源上限控制。
//! 解码建模为显式状态机 `Loading → Decoded | Failed`，失败是一等状态，
//! 不会出现“等不到完成回调”的悬挂。
//!
//! ## 实现思路
//!
//! 1. 从引用取出负载，连同 base64 解码一起交给阻塞线程
//! 2. 校验内容签名，读取 header 尺寸，按像素上限快速拒绝
//! 3. 完整解码并按 EXIF 方向摆正（可选超时），结束后释放引用
//! 4. 分配目标尺寸的透明画布，按绘制模式缩放并绘入
//!
//! 超时或取消后不再等待阻塞任务，只置位中止标记：任务在下一个检查点退出，
//! 已进入编解码器的调用会跑完，结果被丢弃。

use fast_image_resize as fr;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::config::{RenderMode, ResizeFilter};
use super::loader::LoadableReference;
use super::media_type::sniff_media_type;
use super::source::{DecodedRaster, TargetDimensions};
use super::{CompressConfig, CompressError};

/// 解码状态。
#[derive(Debug)]
pub(crate) enum DecodeState {
    Loading(LoadableReference),
    Decoded(DecodedRaster),
    Failed(CompressError),
}

impl DecodeState {
    pub(crate) fn new(reference: LoadableReference) -> Self {
        Self::Loading(reference)
    }

    /// 推进一步：`Loading` 等待解码完成后转为 `Decoded` 或 `Failed`，终态保持不变。
    ///
    /// 返回的 future 被提前丢弃时，引用随之释放，阻塞任务收到中止标记。
    pub(crate) async fn advance(self, config: &CompressConfig) -> Self {
        match self {
            Self::Loading(reference) => match decode_reference(reference, config).await {
                Ok(raster) => Self::Decoded(raster),
                Err(err) => Self::Failed(err),
            },
            settled => settled,
        }
    }

    pub(crate) fn into_result(self) -> Result<DecodedRaster, CompressError> {
        match self {
            Self::Decoded(raster) => Ok(raster),
            Self::Failed(err) => Err(err),
            Self::Loading(_) => Err(CompressError::DecodeFailure("解码尚未完成".to_string())),
        }
    }
}

/// 阻塞解码任务的中止标记，释放时置位。
struct AbortOnDrop(Arc<AtomicBool>);

impl AbortOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

async fn decode_reference(
    mut reference: LoadableReference,
    config: &CompressConfig,
) -> Result<DecodedRaster, CompressError> {
    let payload = reference.take_payload()?;
    let max_bytes = config.max_file_size;
    let max_pixels = config.max_decoded_pixels;

    let abort = AbortOnDrop::new();
    let aborted = abort.flag();
    let task = tokio::task::spawn_blocking(move || {
        let bytes = payload.into_bytes(max_bytes)?;
        decode_bytes(&bytes, max_pixels, &aborted)
    });

    let joined = match config.decode_timeout_ms {
        Some(timeout_ms) => match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(joined) => joined,
            Err(_) => {
                log::warn!("⏱️ 解码超时（{}毫秒），释放{}引用", timeout_ms, reference.kind());
                return Err(CompressError::Timeout(format!("解码超时（{}毫秒）", timeout_ms)));
            }
        },
        None => task.await,
    };

    log::debug!("解码结束，释放{}引用", reference.kind());
    drop(reference);
    drop(abort);

    joined.map_err(|e| CompressError::DecodeFailure(format!("解码任务异常：{}", e)))?
}

/// 字节 → 摆正后的解码图像。`aborted` 置位后在下一个检查点返回 `Cancelled`。
pub(crate) fn decode_bytes(
    bytes: &[u8],
    max_pixels: u64,
    aborted: &AtomicBool,
) -> Result<DecodedRaster, CompressError> {
    if bytes.is_empty() {
        return Err(CompressError::DecodeFailure("图片内容为空".to_string()));
    }
    if sniff_media_type(bytes).is_none() {
        return Err(CompressError::DecodeFailure("文件签名不是图片类型".to_string()));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| CompressError::DecodeFailure(format!("无法识别图片格式：{}", e)))?;

    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .map_err(|e| CompressError::DecodeFailure(format!("无法读取图片头部：{}", e)))?;

    // header 中的存储尺寸，旋转不改变像素数
    let (stored_width, stored_height) = decoder.dimensions();
    let pixels = u64::from(stored_width) * u64::from(stored_height);
    if pixels > max_pixels {
        return Err(CompressError::ResourceLimit(format!(
            "{}x{} 共 {} 像素，超过解码上限 {} 像素",
            stored_width, stored_height, pixels, max_pixels
        )));
    }

    let orientation = decoder.orientation().unwrap_or_else(|e| {
        log::debug!("EXIF 方向读取失败，按原样解码：{}", e);
        Orientation::NoTransforms
    });

    if aborted.load(Ordering::Relaxed) {
        return Err(CompressError::Cancelled("解码任务已中止".to_string()));
    }

    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| CompressError::DecodeFailure(format!("图片解码失败：{}", e)))?;
    if orientation != Orientation::NoTransforms {
        log::debug!("按 EXIF 方向 {:?} 摆正图像", orientation);
        image.apply_orientation(orientation);
    }

    Ok(DecodedRaster {
        width: image.width(),
        height: image.height(),
        format,
        image,
    })
}

/// 分配目标尺寸的透明画布并绘入解码图像。
pub(crate) fn render(raster: &DecodedRaster, target: TargetDimensions, config: &CompressConfig) -> RgbaImage {
    let mut surface = RgbaImage::new(target.width, target.height);
    if target.is_empty() {
        return surface;
    }

    let (dest_width, dest_height) = match config.render_mode {
        RenderMode::Proportional => (target.width, target.height),
        RenderMode::LegacySquare => (target.width, target.width),
    };

    let drawn = resize_rgba(&raster.image, dest_width, dest_height, config.resize_filter);
    image::imageops::replace(&mut surface, &drawn, 0, 0);

    surface
}

fn resize_rgba(image: &DynamicImage, width: u32, height: u32, filter: ResizeFilter) -> RgbaImage {
    let source = image.to_rgba8();
    if source.dimensions() == (width, height) {
        return source;
    }

    fast_resize(&source, width, height, filter).unwrap_or_else(|err| {
        log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops::resize：{}", err);
        image::imageops::resize(&source, width, height, filter.to_image_filter())
    })
}

/// 借用源像素做 SIMD 缩放，不复制源缓冲。
fn fast_resize(
    source: &RgbaImage,
    width: u32,
    height: u32,
    filter: ResizeFilter,
) -> Result<RgbaImage, CompressError> {
    let (src_width, src_height) = source.dimensions();
    let src_view = fr::images::ImageRef::new(src_width, src_height, source.as_raw(), fr::PixelType::U8x4)
        .map_err(|e| CompressError::EncodeFailure(format!("源像素缓冲不合法：{}", e)))?;

    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x4);
    let options = fr::ResizeOptions::new().resize_alg(filter.to_resize_alg());
    fr::Resizer::new()
        .resize(&src_view, &mut dst, &options)
        .map_err(|e| {
            CompressError::EncodeFailure(format!(
                "{}x{} -> {}x{} 缩放失败：{}",
                src_width, src_height, width, height, e
            ))
        })?;

    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| CompressError::EncodeFailure("缩放输出缓冲长度与目标尺寸不符".to_string()))
}
