//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线产物”解耦：
//! - `FileHandle` 表示带名称与声明类型的文件（原文件与压缩后文件共用）
//! - `Blob` 表示仅带媒体类型的二进制块
//! - `DecodedRaster` 表示解码后的像素网格
//! - `CompressResult` 表示交付给调用方的完整结果
//!
//! 字节统一使用 `bytes::Bytes`，克隆只增加引用计数，流水线全程不复制原文件内容。

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use std::path::Path;

use super::CompressError;

/// 类文件对象：字节内容 + 声明的媒体类型 + 文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
    media_type: String,
    data: Bytes,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// 从本地路径读取文件。
    ///
    /// 声明类型按扩展名推断（与浏览器选择文件时填充 `File.type` 的方式一致），
    /// 无法识别时为空字符串。
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CompressError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| CompressError::FileSystem(format!("无法读取图片文件 {}：{}", path.display(), e)))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_default();

        Ok(Self::new(name, media_type, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// 字节数。
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// 带媒体类型标记的二进制块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    media_type: String,
    data: Bytes,
}

impl Blob {
    pub fn new(media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// 解码阶段输出：原始尺寸与像素数据。
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: ImageFormat,
    pub(crate) image: DynamicImage,
}

impl DecodedRaster {
    /// 原始宽度（像素）。
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 原始高度（像素）。
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 按内容签名识别出的容器格式。
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// 缩放策略计算出的目标尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
}

impl TargetDimensions {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 压缩结果：原始解码图、原文件、压缩后的 blob 与文件。
///
/// 调用方拿到后即拥有全部引用，无需额外生命周期管理。
#[derive(Debug, Clone)]
pub struct CompressResult {
    pub image: DecodedRaster,
    pub file: FileHandle,
    pub compress_blob: Blob,
    pub compress_file: FileHandle,
}
