//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! job_manager (准入 / 任务表 / 超时 / 过期清理)
//!     ↓
//! job_runner (解压 → 检测 → 截图 → 打包)
//!     ↓
//! workflow::CaptureOrchestrator (单个任务的截图流程)
//!     ↓
//! services (能力层：extract / detect / package)
//!     ↓
//! infrastructure (基础设施：JsExecutor / StaticServer)
//! ```
//!
//! 只有编排层会修改任务记录。

pub mod job_manager;
pub mod job_runner;

pub use job_manager::{AdmissionPermit, JobManager};
pub use job_runner::JobRunner;
