//! 流程层（Workflow）
//!
//! 定义"一次截图"的完整流程：
//! - `CaptureCtx` - 任务上下文（任务 ID + 取消信号 + 进度通道）
//! - `Readiness` - 截图前的就绪等待
//! - `scripts` - 注入页面的脚本
//! - `CaptureOrchestrator` - 流程编排（导航 → 就绪 → 隔离 / 切分 → 截图）

pub mod capture_ctx;
pub mod capture_flow;
pub mod readiness;
pub mod scripts;

pub use capture_ctx::CaptureCtx;
pub use capture_flow::{slide_file_name, CaptureOrchestrator, CaptureSummary};
pub use readiness::Readiness;
