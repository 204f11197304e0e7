//! # 二进制编解码模块
//!
//! ## 设计思路
//!
//! 负责三种二进制表示之间的转换：
//! `data:<mime>;base64,<payload>` 文本 ⇄ `Blob` → `FileHandle`。
//! 结构不合法时统一返回 `MalformedDataUrl`，不让底层索引/解码错误直接外泄。
//!
//! ## 实现思路
//!
//! - 头部取 `data:` 与第一个 `;` 之间的部分作为 MIME，必须非空。
//! - 头部必须带 `;base64` 标记，负载按标准 base64 解码。
//! - 带上限的版本先按 base64 长度估算解码体积，超限直接拒绝，避免无谓解码。

use base64::{Engine as _, engine::general_purpose};

use super::CompressError;
use super::source::{Blob, FileHandle};

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64";
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// 拆分后的 data URL 各部分（借用原文本）。
#[derive(Debug, PartialEq, Eq)]
struct DataUrlParts<'a> {
    media_type: &'a str,
    payload: &'a str,
}

fn split_data_url(text: &str) -> Result<DataUrlParts<'_>, CompressError> {
    let normalized = text.trim();

    let rest = normalized
        .get(..DATA_URL_SCHEME.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(DATA_URL_SCHEME))
        .map(|_| &normalized[DATA_URL_SCHEME.len()..])
        .ok_or_else(|| CompressError::MalformedDataUrl("缺少 data: 前缀".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CompressError::MalformedDataUrl("缺少头部与负载之间的逗号".to_string()))?;

    let mut segments = header.split(';');
    let media_type = segments.next().unwrap_or_default().trim();
    if media_type.is_empty() {
        return Err(CompressError::MalformedDataUrl("缺少 MIME 类型".to_string()));
    }

    if !segments.any(|param| param.trim().eq_ignore_ascii_case(BASE64_MARKER)) {
        return Err(CompressError::MalformedDataUrl("缺少 base64 标记".to_string()));
    }

    Ok(DataUrlParts { media_type, payload })
}

/// 按 4 字符一组估算解码字节数，末尾 `=` 填充不计入。
fn estimate_base64_decoded_upper_bound_len(payload: &str) -> Result<u64, CompressError> {
    let payload = payload.trim();
    let padding = payload.bytes().rev().take(2).take_while(|&b| b == b'=').count() as u64;
    let groups = (payload.len() as u64)
        .checked_add(3)
        .ok_or_else(|| CompressError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    let upper = groups
        .checked_mul(3)
        .ok_or_else(|| CompressError::ResourceLimit("Base64 解码体积估算溢出".to_string()))?;
    Ok(upper.saturating_sub(padding))
}

/// data URL → `Blob`。
///
/// # 示例
/// ```rust
/// use image_compress::compressor::data_url_to_blob;
///
/// let blob = data_url_to_blob("data:image/png;base64,AAEC")?;
/// assert_eq!(blob.media_type(), "image/png");
/// assert_eq!(blob.data().as_ref(), &[0u8, 1, 2]);
/// # Ok::<(), image_compress::compressor::CompressError>(())
/// ```
pub fn data_url_to_blob(text: &str) -> Result<Blob, CompressError> {
    data_url_to_blob_with_limit(text, u64::MAX)
}

/// data URL → `Blob`，解码体积超过 `max_bytes` 时返回 `ResourceLimit`。
pub fn data_url_to_blob_with_limit(text: &str, max_bytes: u64) -> Result<Blob, CompressError> {
    let parts = split_data_url(text)?;

    let estimated_len = estimate_base64_decoded_upper_bound_len(parts.payload)?;
    if estimated_len > max_bytes {
        return Err(CompressError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(parts.payload.trim())
        .map_err(|e| CompressError::MalformedDataUrl(format!("Base64 解码失败：{}", e)))?;

    Ok(Blob::new(parts.media_type, bytes))
}

/// 原始字节 → data URL 文本。空 MIME 写为 `application/octet-stream`。
pub(crate) fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    let media_type = if media_type.trim().is_empty() {
        FALLBACK_MEDIA_TYPE
    } else {
        media_type.trim()
    };

    format!(
        "{}{};{},{}",
        DATA_URL_SCHEME,
        media_type,
        BASE64_MARKER,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// `Blob` → data URL 文本（`data_url_to_blob` 的逆操作）。
pub fn blob_to_data_url(blob: &Blob) -> String {
    encode_data_url(blob.media_type(), blob.data())
}

/// `Blob` → 带名称与声明类型的 `FileHandle`。
///
/// 文件类型取调用方传入的 `media_type`，而不是 blob 自身的类型。
pub fn blob_to_file(blob: Blob, name: &str, media_type: &str) -> FileHandle {
    FileHandle::new(name, media_type, blob.data().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mime_and_payload() {
        let blob = data_url_to_blob("data:image/jpeg;base64,SGVsbG8=").expect("parse failed");

        assert_eq!(blob.media_type(), "image/jpeg");
        assert_eq!(blob.data().as_ref(), b"Hello");
    }

    #[test]
    fn tolerates_extra_parameters_and_whitespace() {
        let blob = data_url_to_blob("  data:image/png;name=a.png;base64,SGk=\n").expect("parse failed");

        assert_eq!(blob.media_type(), "image/png");
        assert_eq!(blob.data().as_ref(), b"Hi");
    }

    #[test]
    fn empty_payload_gives_empty_blob() {
        let blob = data_url_to_blob("data:image/png;base64,").expect("parse failed");
        assert_eq!(blob.size(), 0);
    }

    #[test]
    fn rejects_missing_scheme() {
        let result = data_url_to_blob("image/png;base64,SGk=");
        assert!(matches!(result, Err(CompressError::MalformedDataUrl(_))));
    }

    #[test]
    fn rejects_missing_comma() {
        let result = data_url_to_blob("data:image/png;base64");
        assert!(matches!(result, Err(CompressError::MalformedDataUrl(_))));
    }

    #[test]
    fn rejects_missing_base64_marker() {
        let result = data_url_to_blob("data:image/png,SGk=");
        assert!(matches!(result, Err(CompressError::MalformedDataUrl(_))));
    }

    #[test]
    fn rejects_empty_mime() {
        let result = data_url_to_blob("data:;base64,SGk=");
        assert!(matches!(result, Err(CompressError::MalformedDataUrl(_))));
    }

    #[test]
    fn rejects_invalid_base64_payload() {
        let result = data_url_to_blob("data:image/png;base64,@@@not-base64@@@");
        assert!(matches!(result, Err(CompressError::MalformedDataUrl(_))));
    }

    #[test]
    fn rejects_empty_and_multibyte_input_without_panicking() {
        assert!(matches!(data_url_to_blob(""), Err(CompressError::MalformedDataUrl(_))));
        assert!(matches!(data_url_to_blob("数据"), Err(CompressError::MalformedDataUrl(_))));
    }

    #[test]
    fn limit_rejects_large_payload_before_decode() {
        let huge = format!("data:image/png;base64,{}", "A".repeat(4096));
        let result = data_url_to_blob_with_limit(&huge, 32);
        assert!(matches!(result, Err(CompressError::ResourceLimit(_))));
    }

    #[test]
    fn padded_payload_estimate_matches_decoded_len() {
        for len in 0..=12usize {
            let payload = general_purpose::STANDARD.encode(vec![7u8; len]);
            assert_eq!(
                estimate_base64_decoded_upper_bound_len(&payload).expect("estimate"),
                len as u64
            );
        }
    }

    #[test]
    fn payload_exactly_at_limit_is_accepted() {
        for len in [724usize, 725, 726] {
            let text = blob_to_data_url(&Blob::new("image/jpeg", vec![1u8; len]));

            let blob = data_url_to_blob_with_limit(&text, len as u64).expect("at limit should pass");
            assert_eq!(blob.size(), len);
            assert!(matches!(
                data_url_to_blob_with_limit(&text, len as u64 - 1),
                Err(CompressError::ResourceLimit(_))
            ));
        }
    }

    #[test]
    fn blob_survives_data_url_round_trip() {
        let blob = Blob::new("image/png", vec![0u8, 255, 17, 42]);
        let text = blob_to_data_url(&blob);

        assert!(text.starts_with("data:image/png;base64,"));
        assert_eq!(data_url_to_blob(&text).expect("parse failed"), blob);
    }

    #[test]
    fn empty_mime_encodes_as_octet_stream() {
        assert_eq!(encode_data_url("", b"Hi"), "data:application/octet-stream;base64,SGk=");
    }

    #[test]
    fn blob_to_file_uses_given_name_and_type() {
        let blob = Blob::new("image/png", vec![1u8, 2, 3]);
        let file = blob_to_file(blob.clone(), "avatar.gif", "image/gif");

        assert_eq!(file.name(), "avatar.gif");
        assert_eq!(file.media_type(), "image/gif");
        assert_eq!(file.data(), blob.data());
    }
}
