//! HTTP 接口
//!
//! - `POST /api/render` - 上传并创建任务
//! - `GET /api/jobs/{job_id}` - 查询任务状态
//! - `GET /api/jobs/{job_id}/download` - 下载结果
//! - `GET /api/health` - 健康检查

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
