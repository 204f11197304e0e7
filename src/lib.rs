//! # 上传前图片压缩 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  调用方（上传前处理）                                     │
//! │       │ FileHandle（字节 + 声明类型 + 文件名）            │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↓ compress(file) -> Result<CompressResult, CompressError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↓            compressor                            │
//! │                                                          │
//! │  ┌─ media_type ── JPEG/PNG 类型守卫                      │
//! │  ├─ loader ────── 对象 URL（RAII 释放）/ data URL 兜底   │
//! │  ├─ pipeline ──── 解码状态机 + 画布绘制                  │
//! │  ├─ scaling ───── 最大 800×800 等比缩小                  │
//! │  ├─ encoder ───── 质量 0.2 重编码为 data URL             │
//! │  └─ codec ─────── data URL → Blob → FileHandle           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`compressor`] | 缩放并重新压缩 JPEG/PNG，使文件满足上传体积限制 |
//!
//! 不保证输出达到某个目标字节数：只应用固定的最大尺寸与质量因子。
//! 失败时调用方应回退为上传原始文件。

pub mod compressor;

pub use compressor::{CompressError, CompressResult, Compressor, FileHandle, compress};
