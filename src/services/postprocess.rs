//! 截图后处理
//!
//! 浏览器返回的 PNG 重新编码一次（无损，默认压缩级别 + 自适应过滤），
//! 统一输出格式。解码失败时原样写出，只记录警告。

use std::io::Cursor;
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::ImageFormat;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// 重新编码 PNG；无法解码时返回 `None`
pub fn reencode_png(bytes: &[u8]) -> Option<Vec<u8>> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png).ok()?;

    let mut out = Cursor::new(Vec::with_capacity(bytes.len()));
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Default, FilterType::Adaptive);
    image.write_with_encoder(encoder).ok()?;
    Some(out.into_inner())
}

/// 后处理并写入目标文件
pub async fn write_slide_image(bytes: Vec<u8>, target: &Path) -> AppResult<()> {
    let target_owned = target.to_path_buf();
    let processed = tokio::task::spawn_blocking(move || match reencode_png(&bytes) {
        Some(encoded) => encoded,
        None => {
            warn!(
                "⚠️ 截图无法解码，按原始字节写出: {}",
                target_owned.display()
            );
            bytes
        }
    })
    .await
    .map_err(|e| AppError::Other(format!("图片处理线程异常退出: {}", e)))?;

    tokio::fs::write(target, processed)
        .await
        .map_err(|e| AppError::io(target, e))
}
