//! 受保护的目录操作
//!
//! 所有删除操作都必须先确认目标严格位于临时根目录之内

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};

/// 创建目录（包括父目录）
pub async fn ensure_dir(path: &Path) -> AppResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| AppError::io(path, e))
}

/// 删除 `root` 之内的目录树
///
/// 返回是否真正执行了删除。目标不在 `root` 之内（或等于 `root` 本身）时拒绝删除。
pub async fn remove_within(root: &Path, target: &Path) -> bool {
    let Some(resolved) = resolve_inside(root, target).await else {
        error!("拒绝删除临时根目录之外的路径: {}", target.display());
        return false;
    };

    match tokio::fs::remove_dir_all(&resolved).await {
        Ok(()) => {
            debug!("已清理目录: {}", resolved.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("清理目录失败 {}: {}", resolved.display(), e);
            false
        }
    }
}

/// 解析真实路径并确认 `target` 严格位于 `root` 之下
async fn resolve_inside(root: &Path, target: &Path) -> Option<PathBuf> {
    let root = tokio::fs::canonicalize(root).await.ok()?;
    let target = tokio::fs::canonicalize(target).await.ok()?;
    (target != root && target.starts_with(&root)).then_some(target)
}
