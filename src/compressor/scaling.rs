//! 目标尺寸计算。
//!
//! 纯函数，不涉及 I/O 与像素，便于单元测试与性质测试。

use super::source::TargetDimensions;

/// 按最大边界计算目标尺寸（只缩小、保持宽高比）。
///
/// - 两边都不超过边界：保持原尺寸
/// - 原图宽高比大于边界宽高比：宽度取边界，高度按比例
/// - 否则（含宽高比相等）：高度取边界，宽度按比例
///
/// # 示例
/// ```rust
/// use image_compress::compressor::compute_target_dimensions;
///
/// let target = compute_target_dimensions((1600, 800), (800, 800));
/// assert_eq!((target.width, target.height), (800, 400));
/// ```
pub fn compute_target_dimensions(natural: (u32, u32), bounds: (u32, u32)) -> TargetDimensions {
    let (width, height) = natural;
    let (max_width, max_height) = bounds;

    if width <= max_width && height <= max_height {
        return TargetDimensions { width, height };
    }

    let natural_aspect = width as f64 / height as f64;
    let bound_aspect = max_width as f64 / max_height as f64;

    if natural_aspect > bound_aspect {
        TargetDimensions {
            width: max_width,
            height: round_half_up(max_width as f64 * (height as f64 / width as f64)),
        }
    } else {
        TargetDimensions {
            width: round_half_up(max_height as f64 * (width as f64 / height as f64)),
            height: max_height,
        }
    }
}

fn round_half_up(value: f64) -> u32 {
    (value + 0.5).floor() as u32
}
