//! 截图流程 - 流程层
//!
//! 核心职责：把一个 [`SlideLayout`] 变成输出目录中按顺序编号的图片
//!
//! 流程：
//! 1. 模式 A：视口设为幻灯片尺寸，逐张隔离后截取视口
//! 2. 模式 B（多个文档）：逐个文档导航，截取整帧
//! 3. 模式 B（单个长文档）：测量页面 → 切分策略 → 按元素或按偏移截取
//!
//! 每张幻灯片之前检查取消信号，每张截完后发布进度。
//! 无论成功与否，渲染面都会被释放。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::capture_ctx::CaptureCtx;
use super::readiness::Readiness;
use super::scripts;
use crate::browser::{ClipRect, SurfaceProvider};
use crate::config::CaptureTimings;
use crate::error::{AppResult, LayoutError, RenderError};
use crate::infrastructure::static_server::document_url;
use crate::infrastructure::JsExecutor;
use crate::services::layout::stylesheet::parse_page_size;
use crate::services::layout::{
    segment, Boundaries, Dimensions, ElementBox, LayoutMode, PageMetrics, Segmentation,
    SlideLayout, StrategyKind,
};
use crate::services::postprocess::write_slide_image;
use crate::utils::ensure_dir;

/// 截图结果
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    /// 按顺序写出的图片
    pub files: Vec<PathBuf>,
    /// 单个长文档使用的切分策略
    pub strategy: Option<StrategyKind>,
}

impl CaptureSummary {
    pub fn slide_count(&self) -> usize {
        self.files.len()
    }
}

/// 页面测量脚本的原始返回值
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    content_width: f64,
    content_height: f64,
    #[serde(default)]
    page_size: Option<String>,
    #[serde(default)]
    children: Vec<ElementBox>,
}

impl RawMetrics {
    fn into_metrics(self, fallback_page: Option<Dimensions>) -> PageMetrics {
        PageMetrics {
            content_width: self.content_width,
            content_height: self.content_height,
            declared_page: self
                .page_size
                .as_deref()
                .and_then(parse_page_size)
                .or(fallback_page),
            children: self.children,
        }
    }
}

/// 截图编排器
///
/// - 不持有浏览器，只从 [`SurfaceProvider`] 借用渲染面
/// - 不关心任务状态，只通过 [`CaptureCtx`] 报告进度
pub struct CaptureOrchestrator {
    provider: Arc<dyn SurfaceProvider>,
    timings: CaptureTimings,
}

impl CaptureOrchestrator {
    pub fn new(provider: Arc<dyn SurfaceProvider>, timings: CaptureTimings) -> Self {
        Self { provider, timings }
    }

    /// 截取全部幻灯片到 `output_dir`
    pub async fn capture(
        &self,
        layout: &SlideLayout,
        base_url: &str,
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<CaptureSummary> {
        ensure_dir(output_dir).await?;
        ctx.check_cancelled()?;

        let surface = self.provider.acquire().await?;
        let executor = JsExecutor::new(surface, self.timings.call_timeout());

        let result = self
            .capture_with(&executor, layout, base_url, output_dir, ctx)
            .await;

        executor.close().await;
        result
    }

    async fn capture_with(
        &self,
        executor: &JsExecutor,
        layout: &SlideLayout,
        base_url: &str,
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<CaptureSummary> {
        let scale = ctx.resolution.device_scale();
        executor.set_viewport(layout.slide, scale).await?;

        match layout.mode {
            LayoutMode::A => self.capture_marked(executor, layout, base_url, output_dir, ctx).await,
            LayoutMode::B if layout.is_single_long_document() => {
                self.capture_long_document(executor, layout, base_url, output_dir, ctx)
                    .await
            }
            LayoutMode::B => {
                self.capture_documents(executor, layout, base_url, output_dir, ctx)
                    .await
            }
        }
    }

    /// 模式 A：一个文档内多张标记的幻灯片
    async fn capture_marked(
        &self,
        executor: &JsExecutor,
        layout: &SlideLayout,
        base_url: &str,
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<CaptureSummary> {
        let readiness = Readiness::new(&self.timings);
        let url = document_url(base_url, layout.entry_file())?;
        info!("{} 模式 A: 打开入口文档 {}", ctx, url);

        executor.navigate(&url).await?;
        readiness.wait(executor, ctx).await?;

        let total: usize = executor.eval_as(scripts::count_slides()).await?;
        if total == 0 {
            return Err(LayoutError::LayoutMismatch {
                detail: "页面中没有找到幻灯片元素".to_string(),
            }
            .into());
        }
        if total != layout.slide_count {
            debug!(
                "{} 页面中有 {} 张幻灯片（静态分析为 {} 张），以页面为准",
                ctx, total, layout.slide_count
            );
        }
        ctx.report(0, total);

        let mut files = Vec::with_capacity(total);
        for index in 0..total {
            ctx.check_cancelled()?;

            let isolated: bool = executor
                .eval_as(scripts::isolate_slide(index, layout.slide))
                .await?;
            if !isolated {
                return Err(LayoutError::LayoutMismatch {
                    detail: format!("第 {} 张幻灯片在截图过程中消失", index + 1),
                }
                .into());
            }
            readiness.wait(executor, ctx).await?;

            let bytes = executor.capture_clip(ClipRect::frame(layout.slide)).await?;
            files.push(write_slide(bytes, output_dir, index + 1, total).await?);

            debug!("{} 已截取 {}/{}", ctx, index + 1, total);
            ctx.report(index + 1, total);
        }

        Ok(CaptureSummary {
            files,
            strategy: None,
        })
    }

    /// 模式 B：每个文档一张
    async fn capture_documents(
        &self,
        executor: &JsExecutor,
        layout: &SlideLayout,
        base_url: &str,
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<CaptureSummary> {
        let readiness = Readiness::new(&self.timings);
        let total = layout.documents.len();
        info!("{} 模式 B: 依次截取 {} 个文档", ctx, total);
        ctx.report(0, total);

        let mut files = Vec::with_capacity(total);
        for (index, document) in layout.documents.iter().enumerate() {
            ctx.check_cancelled()?;

            let url = document_url(base_url, document)?;
            debug!("{} 打开 {}", ctx, url);
            executor.navigate(&url).await?;
            readiness.wait(executor, ctx).await?;

            let bytes = executor.capture_clip(ClipRect::frame(layout.slide)).await?;
            files.push(write_slide(bytes, output_dir, index + 1, total).await?);
            ctx.report(index + 1, total);
        }

        Ok(CaptureSummary {
            files,
            strategy: None,
        })
    }

    /// 模式 B：单个长文档，测量后切分
    async fn capture_long_document(
        &self,
        executor: &JsExecutor,
        layout: &SlideLayout,
        base_url: &str,
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<CaptureSummary> {
        let readiness = Readiness::new(&self.timings);
        let url = document_url(base_url, layout.entry_file())?;
        info!("{} 模式 B: 测量长文档 {}", ctx, url);

        executor.navigate(&url).await?;
        readiness.wait(executor, ctx).await?;

        let raw: RawMetrics = executor.eval_as(scripts::measure_page()).await?;
        let metrics = raw.into_metrics(layout.declared_page);
        let segmentation = segment(&metrics);
        info!(
            "{} 切分策略 {:?}: {} 张, 尺寸 {}x{}",
            ctx,
            segmentation.strategy,
            segmentation.slide_count(),
            segmentation.slide.width,
            segmentation.slide.height
        );

        let files = match &segmentation.boundaries {
            Boundaries::Elements(indices) => {
                if self.tag_boundaries(executor, indices, ctx).await? {
                    self.capture_elements(executor, indices, output_dir, ctx)
                        .await?
                } else {
                    let offsets = element_offsets(&metrics, indices);
                    warn!("{} 边界元素标记失败，改为按偏移截取: {:?}", ctx, offsets);
                    self.capture_offsets(executor, &segmentation, &offsets, output_dir, ctx)
                        .await?
                }
            }
            Boundaries::Offsets(offsets) => {
                self.capture_offsets(executor, &segmentation, offsets, output_dir, ctx)
                    .await?
            }
        };

        Ok(CaptureSummary {
            files,
            strategy: Some(segmentation.strategy),
        })
    }

    /// 给全部边界元素打标记；任何一个找不到就返回 false
    async fn tag_boundaries(
        &self,
        executor: &JsExecutor,
        indices: &[usize],
        ctx: &CaptureCtx,
    ) -> AppResult<bool> {
        for &index in indices {
            ctx.check_cancelled()?;
            let tagged: bool = executor.eval_as(scripts::tag_candidate(index)).await?;
            if !tagged {
                debug!("{} 找不到第 {} 个候选元素", ctx, index);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn capture_elements(
        &self,
        executor: &JsExecutor,
        indices: &[usize],
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<Vec<PathBuf>> {
        let readiness = Readiness::new(&self.timings);
        let total = indices.len();
        ctx.report(0, total);

        let mut files = Vec::with_capacity(total);
        for (position, &index) in indices.iter().enumerate() {
            ctx.check_cancelled()?;
            readiness.settle(ctx).await?;

            let bytes = executor
                .capture_element(&scripts::tagged_selector(index))
                .await?;
            files.push(write_slide(bytes, output_dir, position + 1, total).await?);
            ctx.report(position + 1, total);
        }
        Ok(files)
    }

    async fn capture_offsets(
        &self,
        executor: &JsExecutor,
        segmentation: &Segmentation,
        offsets: &[u32],
        output_dir: &Path,
        ctx: &CaptureCtx,
    ) -> AppResult<Vec<PathBuf>> {
        let readiness = Readiness::new(&self.timings);
        let total = offsets.len();
        ctx.report(0, total);

        let mut files = Vec::with_capacity(total);
        for (position, &offset) in offsets.iter().enumerate() {
            ctx.check_cancelled()?;

            executor.eval(scripts::scroll_to(offset)).await?;
            readiness.settle(ctx).await?;

            let clip = ClipRect {
                x: 0.0,
                y: offset as f64,
                width: segmentation.slide.width as f64,
                height: segmentation.slide.height as f64,
            };
            let bytes = executor.capture_clip(clip).await?;
            files.push(write_slide(bytes, output_dir, position + 1, total).await?);
            ctx.report(position + 1, total);
        }
        Ok(files)
    }
}

/// 边界元素在文档中的纵向偏移，用于标记失败后的滚动截取
fn element_offsets(metrics: &PageMetrics, indices: &[usize]) -> Vec<u32> {
    let offsets: Vec<u32> = indices
        .iter()
        .filter_map(|index| metrics.children.iter().find(|b| b.index == *index))
        .map(|b| b.top.max(0.0).round() as u32)
        .collect();
    if offsets.is_empty() {
        vec![0]
    } else {
        offsets
    }
}

/// 输出文件名：`slide-001.png`，位数至少 3 位，随总数增长
pub fn slide_file_name(number: usize, total: usize) -> String {
    let width = total.max(1).to_string().len().max(3);
    format!("slide-{:0width$}.png", number, width = width)
}

async fn write_slide(
    bytes: Vec<u8>,
    output_dir: &Path,
    number: usize,
    total: usize,
) -> AppResult<PathBuf> {
    if bytes.is_empty() {
        warn!("第 {} 张截图为空", number);
        return Err(RenderError::engine("截图", "浏览器返回了空图片").into());
    }
    let target = output_dir.join(slide_file_name(number, total));
    write_slide_image(bytes, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_file_names_are_zero_padded() {
        assert_eq!(slide_file_name(1, 12), "slide-001.png");
        assert_eq!(slide_file_name(42, 999), "slide-042.png");
        assert_eq!(slide_file_name(7, 1500), "slide-0007.png");
    }

    #[test]
    fn test_raw_metrics_fall_back_to_static_page_size() {
        let raw: RawMetrics = serde_json::from_value(serde_json::json!({
            "contentWidth": 1280.0,
            "contentHeight": 1440.0,
            "pageSize": null,
            "children": [{ "index": 0, "width": 1280.0, "height": 720.0, "top": 0.0 }]
        }))
        .unwrap();

        let metrics = raw.into_metrics(Some(Dimensions::new(1280, 720)));
        assert_eq!(metrics.declared_page, Some(Dimensions::new(1280, 720)));
        assert!(!metrics.children[0].page_break);
    }
}
