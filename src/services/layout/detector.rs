//! 布局检测入口
//!
//! 静态阶段的决策顺序：
//! 1. 找不到任何 HTML 文档 → `NoDocuments`
//! 2. 存在 `index.html` 且其中至少有两个幻灯片标记 → 模式 A
//! 3. 否则每个文档一张幻灯片 → 模式 B（自然顺序）
//!
//! 模式 B 只有一个文档时，张数先记为 1，实际切分由截图阶段测量后通过
//! [`super::segment`] 决定。

use std::path::Path;

use tracing::info;

use super::documents::{find_html_documents, find_index, scan_document};
use super::stylesheet::{declared_page_size, static_slide_size};
use super::{LayoutMode, SlideLayout};
use crate::error::{AppError, AppResult, LayoutError};

/// 布局检测器
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutDetector;

impl LayoutDetector {
    pub fn new() -> Self {
        Self
    }

    /// 在阻塞线程池中检测
    pub async fn detect(&self, root: &Path) -> AppResult<SlideLayout> {
        let root = root.to_path_buf();
        let this = *self;
        tokio::task::spawn_blocking(move || this.detect_blocking(&root))
            .await
            .map_err(|e| AppError::Other(format!("检测线程异常退出: {}", e)))?
    }

    pub fn detect_blocking(&self, root: &Path) -> AppResult<SlideLayout> {
        let documents = find_html_documents(root)?;
        if documents.is_empty() {
            return Err(LayoutError::NoDocuments.into());
        }

        if let Some(index) = find_index(&documents) {
            let scan = scan_document(root, index)?;
            if scan.slide_markers >= 2 {
                let (slide, size_source) = static_slide_size(&scan.css);
                info!(
                    "检测到模式 A: {} 中有 {} 张幻灯片, 尺寸 {}x{} ({:?})",
                    index.display(),
                    scan.slide_markers,
                    slide.width,
                    slide.height,
                    size_source
                );
                return Ok(SlideLayout {
                    mode: LayoutMode::A,
                    documents: vec![index.clone()],
                    slide,
                    slide_count: scan.slide_markers,
                    size_source,
                    declared_page: declared_page_size(&scan.css),
                });
            }
        }

        let first = scan_document(root, &documents[0])?;
        let (slide, size_source) = static_slide_size(&first.css);
        info!(
            "检测到模式 B: {} 个文档, 尺寸 {}x{} ({:?})",
            documents.len(),
            slide.width,
            slide.height,
            size_source
        );

        Ok(SlideLayout {
            mode: LayoutMode::B,
            slide_count: documents.len(),
            documents,
            slide,
            size_source,
            declared_page: declared_page_size(&first.css),
        })
    }
}
