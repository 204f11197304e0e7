//! # 媒体类型识别模块
//!
//! ## 设计思路
//!
//! 只接受 JPEG 与 PNG 两种位图格式：声明类型决定重编码格式，
//! 内容签名决定能否解码，两者分开判断。
//!
//! ## 实现思路
//!
//! - 声明类型通过预编译正则匹配，大小写不敏感，容忍首尾空白与 `;` 参数。
//! - 通过 `once_cell::sync::Lazy` 在首次调用时编译正则，后续零成本复用。
//! - 内容签名通过 `infer` 嗅探 magic bytes。

use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;

static SUPPORTED_MEDIA_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*image/(jpeg|jpg|png)\s*(;.*)?$").expect("media type pattern is valid")
});

/// 支持压缩的位图格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedMediaType {
    Jpeg,
    Png,
}

impl SupportedMediaType {
    /// 从声明类型解析，不支持时返回 `None`。
    pub fn parse(media_type: &str) -> Option<Self> {
        let captures = SUPPORTED_MEDIA_TYPE.captures(media_type)?;
        match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            _ => Some(Self::Jpeg),
        }
    }

    /// 规范化的 MIME 字符串。
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// 判断声明类型是否为支持的位图格式。
///
/// # 示例
/// ```rust
/// use image_compress::compressor::is_supported_image;
///
/// assert!(is_supported_image("IMAGE/JPG"));
/// assert!(!is_supported_image("image/svg+xml"));
/// ```
pub fn is_supported_image(media_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPE.is_match(media_type)
}

/// 按内容签名嗅探 MIME，仅当识别为图片类时返回。
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    (kind.matcher_type() == infer::MatcherType::Image).then(|| kind.mime_type())
}
