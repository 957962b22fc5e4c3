//! 压缩包解压服务 - 业务能力层
//!
//! 只负责"把上传的字节安全地落到任务目录"：
//! 1. 先校验全部条目路径，任何一个条目逃逸出目标目录就整体拒绝，此时不写入任何文件
//! 2. 跳过系统垃圾文件（`__MACOSX`、`.DS_Store` 等）
//! 3. 所有文件位于同一个顶层目录时，把该目录作为内容根目录

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AppError, AppResult, ArchiveError};

const JUNK_NAMES: [&str; 3] = ["__MACOSX", ".DS_Store", "Thumbs.db"];
const ZIP_MAGIC: [&[u8]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

/// 解压结果
#[derive(Debug, Clone)]
pub struct ExtractedArchive {
    /// 实际的内容根目录
    pub root_dir: PathBuf,
    /// 写入的文件（相对解压目录）
    pub files: Vec<PathBuf>,
}

/// 压缩包解压服务
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    max_entries: usize,
    max_total_bytes: u64,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_total_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义条目数与解压总大小上限
    pub fn with_limits(max_entries: usize, max_total_bytes: u64) -> Self {
        Self {
            max_entries,
            max_total_bytes,
        }
    }

    /// 在阻塞线程池中解压
    pub async fn extract(&self, bytes: Vec<u8>, dest_dir: &Path) -> AppResult<ExtractedArchive> {
        let this = self.clone();
        let dest = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || this.extract_blocking(&bytes, &dest))
            .await
            .map_err(|e| AppError::Other(format!("解压线程异常退出: {}", e)))?
    }

    /// 同步解压实现
    pub fn extract_blocking(&self, bytes: &[u8], dest_dir: &Path) -> AppResult<ExtractedArchive> {
        fs::create_dir_all(dest_dir).map_err(|e| AppError::io(dest_dir, e))?;

        if !is_zip(bytes) {
            return self.extract_single_html(bytes, dest_dir);
        }

        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::from)?;

        if archive.len() > self.max_entries {
            return Err(ArchiveError::InvalidArchive {
                reason: format!("条目数 {} 超过上限 {}", archive.len(), self.max_entries),
            }
            .into());
        }

        // 第一遍：只读取元数据，完成全部校验
        let mut plan = Vec::new();
        let mut declared_total: u64 = 0;
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(ArchiveError::from)?;
            let name = entry.name().to_string();

            let Some(relative) = sanitize_entry_path(&name)? else {
                continue;
            };

            declared_total = declared_total.saturating_add(entry.size());
            if declared_total > self.max_total_bytes {
                return Err(ArchiveError::InvalidArchive {
                    reason: format!("解压后大小超过上限 {} 字节", self.max_total_bytes),
                }
                .into());
            }

            if is_junk(&relative) {
                debug!("跳过垃圾文件: {}", name);
                continue;
            }
            plan.push((index, relative, entry.is_dir()));
        }

        // 第二遍：写入
        let mut files = Vec::new();
        let mut written_total: u64 = 0;
        for (index, relative, is_dir) in plan {
            let target = dest_dir.join(&relative);
            if is_dir {
                fs::create_dir_all(&target).map_err(|e| AppError::io(&target, e))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
            }

            let mut entry = archive.by_index(index).map_err(ArchiveError::from)?;
            let mut out = File::create(&target).map_err(|e| AppError::io(&target, e))?;
            let budget = self.max_total_bytes - written_total;
            let written = io::copy(&mut (&mut entry).take(budget + 1), &mut out)
                .map_err(|e| AppError::io(&target, e))?;
            if written > budget {
                return Err(ArchiveError::InvalidArchive {
                    reason: format!("解压后大小超过上限 {} 字节", self.max_total_bytes),
                }
                .into());
            }
            written_total += written;
            files.push(relative);
        }

        let html_count = files.iter().filter(|f| is_html(f)).count();
        if html_count == 0 {
            return Err(ArchiveError::NoContent.into());
        }

        let root_dir = detect_root_dir(&files, dest_dir);
        info!(
            "✓ 解压完成: {} 个文件, {} 个 HTML, 内容根目录 {}",
            files.len(),
            html_count,
            root_dir.display()
        );

        Ok(ExtractedArchive { root_dir, files })
    }

    /// 上传内容不是 zip 而是单个 HTML 文档时，按 index.html 落盘
    fn extract_single_html(&self, bytes: &[u8], dest_dir: &Path) -> AppResult<ExtractedArchive> {
        if !looks_like_html(bytes) {
            return Err(ArchiveError::InvalidArchive {
                reason: "既不是 zip 压缩包也不是 HTML 文档".to_string(),
            }
            .into());
        }

        let target = dest_dir.join("index.html");
        fs::write(&target, bytes).map_err(|e| AppError::io(&target, e))?;
        info!("✓ 收到单个 HTML 文档，已保存为 index.html");

        Ok(ExtractedArchive {
            root_dir: dest_dir.to_path_buf(),
            files: vec![PathBuf::from("index.html")],
        })
    }
}

/// 把条目名规范化为相对路径
///
/// - 返回 `Ok(None)`：条目名为空（如 `./`），直接忽略
/// - 返回 `Err(PathTraversal)`：绝对路径，或 `..` 越过了解压目录
pub fn sanitize_entry_path(name: &str) -> Result<Option<PathBuf>, ArchiveError> {
    let normalized = name.replace('\\', "/");
    let traversal = || ArchiveError::PathTraversal {
        entry: name.to_string(),
    };

    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(traversal());
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(traversal)?),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(parts.iter().collect()))
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn is_junk(relative: &Path) -> bool {
    relative.components().any(|c| {
        let part = c.as_os_str().to_string_lossy();
        JUNK_NAMES.contains(&part.as_ref()) || part.starts_with('.')
    })
}

fn is_zip(bytes: &[u8]) -> bool {
    ZIP_MAGIC.iter().any(|magic| bytes.starts_with(magic))
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).to_ascii_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

pub(crate) fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

/// 所有文件都在同一个顶层目录下时返回该目录，否则返回解压目录本身
fn detect_root_dir(files: &[PathBuf], dest_dir: &Path) -> PathBuf {
    let mut top: Option<&std::ffi::OsStr> = None;
    for file in files {
        let mut components = file.components();
        let (Some(first), Some(_)) = (components.next(), components.next()) else {
            return dest_dir.to_path_buf();
        };
        match top {
            None => top = Some(first.as_os_str()),
            Some(existing) if existing == first.as_os_str() => {}
            Some(_) => return dest_dir.to_path_buf(),
        }
    }
    top.map(|dir| dest_dir.join(dir))
        .unwrap_or_else(|| dest_dir.to_path_buf())
}
