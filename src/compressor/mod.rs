//! # 图片压缩模块（compressor）
//!
//! ## 设计思路
//!
//! 该模块将“入口校验 → 获取引用 → 解码 → 缩放绘制 → 重编码 → 二进制还原”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `handler`：编排整条处理流水线（`Compressor`）
//! - `loader`：对象 URL / data URL 两种可加载引用
//! - `pipeline`：解码状态机、像素限制、EXIF 方向、画布绘制
//! - `scaling`：目标尺寸计算（纯函数）
//! - `encoder`：画布重编码为 data URL
//! - `codec`：data URL ⇄ blob → 文件
//! - `media_type`：声明类型与内容签名识别
//! - `config/error/source`：配置、错误、数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! compress(file)
//!    ↓
//! handler.rs（配置快照 + 入口校验 + 阶段耗时日志）
//!    ├─ loader.rs（对象 URL / data URL）
//!    ├─ pipeline.rs（Loading → Decoded | Failed，绘制画布）
//!    ├─ scaling.rs（最大边界缩放策略）
//!    ├─ encoder.rs（JPEG/PNG 重编码）
//!    └─ codec.rs（data URL → Blob → FileHandle）
//!    ↓
//! CompressResult / CompressError
//! ```
//!
//! ## 分层职责建议
//!
//! - 默认尺寸/质量等策略变更优先改 `config.rs`
//! - 流程顺序变更优先改 `handler.rs`
//! - 单阶段行为优化分别改 `loader/pipeline/encoder/codec`

mod codec;
mod config;
mod encoder;
mod error;
mod handler;
mod loader;
mod media_type;
mod pipeline;
mod scaling;
mod source;

pub use codec::{blob_to_data_url, blob_to_file, data_url_to_blob, data_url_to_blob_with_limit};
pub use config::{CompressConfig, RenderMode, ResizeFilter};
pub use error::CompressError;
pub use handler::{Compressor, compress};
pub use loader::{
    DataUrlReader, LoadableReference, LoaderStrategy, ObjectUrlGuard, ObjectUrlProvider, ObjectUrlRegistry,
    ReferenceProvider,
};
pub use media_type::{SupportedMediaType, is_supported_image, sniff_media_type};
pub use scaling::compute_target_dimensions;
pub use source::{Blob, CompressResult, DecodedRaster, FileHandle, TargetDimensions};
