//! 单个任务的流水线 - 编排层
//!
//! 解压 → 布局检测 → 截图 → 打包，依次执行。
//! 阶段切换通过回调写回任务记录，进度通过 [`CaptureCtx`] 发布。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::browser::SurfaceProvider;
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::StaticServer;
use crate::models::JobPhase;
use crate::services::{ArchiveExtractor, LayoutDetector, OutputPackager};
use crate::utils::remove_within;
use crate::workflow::{CaptureCtx, CaptureOrchestrator};

const CONTENT_DIR: &str = "content";
const IMAGES_DIR: &str = "images";

/// 任务流水线
pub struct JobRunner {
    extractor: ArchiveExtractor,
    detector: LayoutDetector,
    capture: CaptureOrchestrator,
    packager: OutputPackager,
}

impl JobRunner {
    pub fn new(config: &Config, provider: Arc<dyn SurfaceProvider>) -> Self {
        Self {
            extractor: ArchiveExtractor::new(),
            detector: LayoutDetector::new(),
            capture: CaptureOrchestrator::new(provider, config.capture.clone()),
            packager: OutputPackager::new(),
        }
    }

    /// 执行完整流水线，返回压缩包路径
    ///
    /// `job_dir` 是该任务独占的目录；成功后只保留压缩包。
    pub async fn execute(
        &self,
        ctx: &CaptureCtx,
        archive: Vec<u8>,
        job_dir: &Path,
        on_phase: impl Fn(JobPhase),
    ) -> AppResult<PathBuf> {
        let content_dir = job_dir.join(CONTENT_DIR);
        let images_dir = job_dir.join(IMAGES_DIR);

        // ========== 阶段 1: 解压 ==========
        on_phase(JobPhase::Extracting);
        info!("{} 📦 解压上传内容 ({} 字节)", ctx, archive.len());
        let extracted = self.extractor.extract(archive, &content_dir).await?;
        ctx.check_cancelled()?;

        // ========== 阶段 2: 布局检测 ==========
        on_phase(JobPhase::Detecting);
        let layout = self.detector.detect(&extracted.root_dir).await?;
        info!(
            "{} 🔍 布局: 模式 {:?}, {} 个文档, 预计 {} 张",
            ctx,
            layout.mode,
            layout.documents.len(),
            layout.slide_count
        );
        ctx.report(0, layout.slide_count);
        ctx.check_cancelled()?;

        // ========== 阶段 3: 截图 ==========
        on_phase(JobPhase::Rendering);
        let server = StaticServer::start(&extracted.root_dir).await?;
        let captured = self
            .capture
            .capture(&layout, server.base_url(), &images_dir, ctx)
            .await;
        server.close().await;
        let summary = captured?;
        info!("{} 📸 截图完成: {} 张", ctx, summary.slide_count());
        ctx.check_cancelled()?;

        // ========== 阶段 4: 打包 ==========
        on_phase(JobPhase::Packaging);
        let archive_path = self.packager.package(&images_dir, job_dir).await?;

        for dir in [&content_dir, &images_dir] {
            if remove_within(job_dir, dir).await {
                debug!("{} 已清理中间目录 {}", ctx, dir.display());
            }
        }

        Ok(archive_path)
    }
}
