//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `CompressConfig`，默认值与历史常量保持一致
//! （最大 800×800、质量 0.2），同时允许调用方按场景覆盖。
//!
//! ## 实现思路
//!
//! - `Default` 提供与历史行为一致的配置。
//! - `validate` 集中做范围校验，`Compressor` 构造与热更新都会经过它。
//! - `from_json_str` 支持从设置文件加载，缺省字段沿用默认值。

use fast_image_resize as fr;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::CompressError;

const DEFAULT_MAX_WIDTH: u32 = 800;
const DEFAULT_MAX_HEIGHT: u32 = 800;
const DEFAULT_QUALITY: f32 = 0.2;
const MAX_DECODE_TIMEOUT_MS: u64 = 600_000;

/// 压缩配置。
///
/// 字段覆盖入口校验、解码、缩放与重编码四个阶段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressConfig {
    /// 输出宽度上限（像素）。
    pub max_width: u32,
    /// 输出高度上限（像素）。
    pub max_height: u32,
    /// 重编码质量因子，取值 `[0, 1]`，仅对有损格式（JPEG）生效。
    pub quality: f32,
    /// 缩放滤镜。
    pub resize_filter: ResizeFilter,
    /// 绘制映射方式。
    pub render_mode: RenderMode,
    /// 是否在入口拒绝非 JPEG/PNG 的声明类型。
    pub reject_unsupported_media_type: bool,
    /// 源文件允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码超时（毫秒），`None` 表示不限时。
    pub decode_timeout_ms: Option<u64>,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
            resize_filter: ResizeFilter::Lanczos3,
            render_mode: RenderMode::Proportional,
            reject_unsupported_media_type: true,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            decode_timeout_ms: Some(30_000),
        }
    }
}

/// 缩放滤镜（可序列化的 `image::imageops::FilterType` 镜像）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }

    /// `fast_image_resize` 中对应的算法，最近邻不走卷积。
    pub(crate) fn to_resize_alg(self) -> fr::ResizeAlg {
        match self {
            Self::Nearest => fr::ResizeAlg::Nearest,
            Self::Triangle => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            Self::CatmullRom => fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom),
            Self::Gaussian => fr::ResizeAlg::Convolution(fr::FilterType::Gaussian),
            Self::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
        }
    }
}

/// 解码图像映射到画布的方式。
///
/// - `Proportional`：映射到完整的 `目标宽 × 目标高` 矩形
/// - `LegacySquare`：映射到 `目标宽 × 目标宽`，超出画布部分被裁掉，
///   与旧版本输出逐像素一致（非正方形图片会被纵向拉伸）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Proportional,
    LegacySquare,
}

impl CompressConfig {
    /// 从 JSON 文本加载配置，并执行范围校验。
    ///
    /// # 示例
    /// ```rust
    /// use image_compress::compressor::CompressConfig;
    ///
    /// let config = CompressConfig::from_json_str(r#"{ "max_width": 1280 }"#)?;
    /// assert_eq!(config.max_width, 1280);
    /// assert_eq!(config.max_height, 800);
    /// # Ok::<(), image_compress::compressor::CompressError>(())
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, CompressError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CompressError::InvalidConfig(format!("解析配置失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), CompressError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(CompressError::InvalidConfig(format!(
                "最大尺寸必须大于 0（当前：{}x{}）",
                self.max_width, self.max_height
            )));
        }
        if !self.quality.is_finite() || !(0.0..=1.0).contains(&self.quality) {
            return Err(CompressError::InvalidConfig(format!(
                "quality 必须在 0~1 之间（当前：{}）",
                self.quality
            )));
        }
        if self.max_file_size == 0 {
            return Err(CompressError::InvalidConfig("max_file_size 必须大于 0".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(CompressError::InvalidConfig(
                "max_decoded_pixels 必须大于 0".to_string(),
            ));
        }
        if let Some(timeout) = self.decode_timeout_ms {
            if !(1..=MAX_DECODE_TIMEOUT_MS).contains(&timeout) {
                return Err(CompressError::InvalidConfig(format!(
                    "decode_timeout_ms 必须在 1~{} 毫秒之间",
                    MAX_DECODE_TIMEOUT_MS
                )));
            }
        }

        Ok(())
    }
}
