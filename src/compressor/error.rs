//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载压缩链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配，
//! 在失败时回退为上传原始文件。

/// 图片压缩统一错误类型。
///
/// 任一阶段失败都会终止本次调用，不返回部分结果。
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("不支持的媒体类型：{0}")]
    UnsupportedMediaType(String),

    #[error("解码错误：{0}")]
    DecodeFailure(String),

    #[error("Data URL 格式错误：{0}")]
    MalformedDataUrl(String),

    #[error("编码错误：{0}")]
    EncodeFailure(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("已取消：{0}")]
    Cancelled(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),
}

impl CompressError {
    /// 稳定的错误码，供日志聚合与调用方分支使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::DecodeFailure(_) => "decode_failure",
            Self::MalformedDataUrl(_) => "malformed_data_url",
            Self::EncodeFailure(_) => "encode_failure",
            Self::ResourceLimit(_) => "resource_limit",
            Self::FileSystem(_) => "file_system",
            Self::Timeout(_) => "timeout",
            Self::Cancelled(_) => "cancelled",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl From<CompressError> for String {
    /// 兼容部分仍使用字符串错误的调用点。
    fn from(error: CompressError) -> Self {
        error.to_string()
    }
}
