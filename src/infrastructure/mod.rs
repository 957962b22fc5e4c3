//! 基础设施层（Infrastructure）
//!
//! 持有稀缺资源，只暴露能力：
//! - `JsExecutor` - 唯一的渲染面 owner
//! - `StaticServer` - 任务内容目录的临时 HTTP 服务

pub mod js_executor;
pub mod static_server;

pub use js_executor::JsExecutor;
pub use static_server::StaticServer;
