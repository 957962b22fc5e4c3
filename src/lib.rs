//! # SlideForge
//!
//! 把上传的 HTML 幻灯片渲染成高分辨率图片并打包下载的服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 共享的 Chromium 实例，按任务分配隔离的渲染面
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `JsExecutor` - 唯一的渲染面 owner，提供 eval() / 截图能力
//! - `StaticServer` - 任务内容目录的临时 HTTP 服务
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ArchiveExtractor` - 安全解压
//! - `LayoutDetector` - 模式 A / B 判断与切分策略
//! - `OutputPackager` - 结果打包
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的截图流程
//! - `CaptureCtx` - 上下文封装（任务 ID + 取消信号 + 进度通道）
//! - `CaptureOrchestrator` - 流程编排（导航 → 就绪 → 隔离 → 截图）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_manager` - 准入、任务表、超时与过期清理
//! - `orchestrator/job_runner` - 单个任务的流水线
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use browser::{BrowserPool, RenderSurface, SurfaceProvider};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{Job, JobId, JobStatus, JobView};
pub use orchestrator::JobManager;
pub use workflow::{CaptureCtx, CaptureOrchestrator};
