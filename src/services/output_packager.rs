//! 结果打包服务
//!
//! 把输出目录中的图片按文件名排序写入一个 zip。先写 `*.partial`，
//! 成功后再重命名，下载接口永远看不到半成品。

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult, PackageError};
use crate::utils::natural_cmp;

pub const ARCHIVE_NAME: &str = "slides.zip";

/// 结果打包器
#[derive(Debug, Clone, Default)]
pub struct OutputPackager;

impl OutputPackager {
    pub fn new() -> Self {
        Self
    }

    /// 打包 `source_dir` 中的全部文件，压缩包写到 `dest_dir/slides.zip`
    pub async fn package(&self, source_dir: &Path, dest_dir: &Path) -> AppResult<PathBuf> {
        let source = source_dir.to_path_buf();
        let dest = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || package_blocking(&source, &dest))
            .await
            .map_err(|e| AppError::Other(format!("打包线程异常退出: {}", e)))?
    }
}

pub fn package_blocking(source_dir: &Path, dest_dir: &Path) -> AppResult<PathBuf> {
    let final_path = dest_dir.join(ARCHIVE_NAME);
    let partial_path = dest_dir.join(format!("{}.partial", ARCHIVE_NAME));
    let failed = |reason: String| -> AppError {
        PackageError::PackagingError {
            path: final_path.display().to_string(),
            reason,
        }
        .into()
    };

    let mut entries: Vec<(String, PathBuf)> = std::fs::read_dir(source_dir)
        .map_err(|e| failed(e.to_string()))?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    entries.sort_by(|a, b| natural_cmp(&a.0, &b.0));

    if entries.is_empty() {
        return Err(failed("没有可打包的图片".to_string()));
    }

    let result = write_archive(&partial_path, &entries)
        .and_then(|()| std::fs::rename(&partial_path, &final_path).map_err(zip::result::ZipError::Io));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial_path);
        return Err(failed(e.to_string()));
    }

    info!("✓ 已打包 {} 张图片: {}", entries.len(), final_path.display());
    Ok(final_path)
}

fn write_archive(path: &Path, entries: &[(String, PathBuf)]) -> zip::result::ZipResult<()> {
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, source) in entries {
        writer.start_file(name.as_str(), options)?;
        let mut input = File::open(source)?;
        io::copy(&mut input, &mut writer)?;
    }

    let mut inner = writer.finish()?;
    io::Write::flush(&mut inner)?;
    Ok(())
}
