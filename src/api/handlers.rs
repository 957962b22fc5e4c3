//! HTTP 处理函数
//!
//! 只做请求解析与响应组装，业务全部委托给 [`JobManager`]。

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::error::{AppError, JobError};
use crate::models::{JobId, JobStatus, Resolution};
use crate::orchestrator::JobManager;

/// 服务忙时建议客户端等待的秒数
pub const RETRY_AFTER_SECONDS: u64 = 30;
/// 表单上传时压缩包所在的字段
pub const ARCHIVE_FIELD: &str = "zipFile";
/// 表单上传时分辨率所在的字段
pub const RESOLUTION_FIELD: &str = "resolution";

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(manager: Arc<JobManager>) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(rename = "retryAfterSeconds", skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// 运行时间（秒）
    pub uptime: u64,
}

#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    pub resolution: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            retry_after_seconds: None,
        }),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Job(JobError::AdmissionRejected { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECONDS.to_string())],
                Json(ErrorResponse {
                    error: self.to_string(),
                    retry_after_seconds: Some(RETRY_AFTER_SECONDS),
                }),
            )
                .into_response(),
            AppError::Job(JobError::NotFound(_)) => {
                error_response(StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Job(JobError::NotReady(_)) => {
                error_response(StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Job(JobError::Expired(_)) => {
                error_response(StatusCode::GONE, self.to_string())
            }
            AppError::Archive(_) => error_response(StatusCode::BAD_REQUEST, self.to_string()),
            _ => {
                error!("请求处理失败: {}", self);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        }
    }
}

/// 一次上传解析出的内容
#[derive(Debug, Default)]
struct Upload {
    archive: Option<Bytes>,
    resolution: Option<String>,
}

/// `POST /api/render`
///
/// 两种请求体：
/// - `multipart/form-data`：`zipFile` 文件字段，可选 `resolution` 字段
/// - 其他类型：请求体即压缩包，分辨率取自 `?resolution=`
pub async fn submit_handler(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
    request: Request,
) -> Response {
    let upload = if is_multipart(&request) {
        let multipart = match Multipart::from_request(request, &state).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        match read_multipart(multipart).await {
            Ok(upload) => upload,
            Err(response) => return response,
        }
    } else {
        match Bytes::from_request(request, &state).await {
            Ok(body) => Upload {
                archive: Some(body),
                resolution: None,
            },
            Err(rejection) => return rejection.into_response(),
        }
    };

    let archive = match upload.archive {
        Some(archive) if !archive.is_empty() => archive,
        _ => return error_response(StatusCode::BAD_REQUEST, "请上传 zip 压缩包或 HTML 文件"),
    };

    let resolution = match upload.resolution.or(query.resolution).as_deref() {
        None | Some("") => Resolution::default(),
        Some(value) => match Resolution::parse(value) {
            Some(resolution) => resolution,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("不支持的分辨率: {}（可选 hd / 4k）", value),
                )
            }
        },
    };

    match state.manager.submit(archive.to_vec(), resolution) {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                job_id: id.to_string(),
                status: JobStatus::Pending,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("⚠️ 拒绝新任务: {}", e);
            AppError::from(e).into_response()
        }
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// 读取表单字段；未知字段直接丢弃
async fn read_multipart(mut multipart: Multipart) -> Result<Upload, Response> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            ARCHIVE_FIELD => {
                let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                upload.archive = Some(bytes);
            }
            RESOLUTION_FIELD => {
                let text = field.text().await.map_err(IntoResponse::into_response)?;
                upload.resolution = Some(text.trim().to_string());
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// `GET /api/jobs/{job_id}`
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    match state.manager.view(&JobId::from(job_id.as_str())) {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => AppError::from(JobError::NotFound(job_id)).into_response(),
    }
}

/// `GET /api/jobs/{job_id}/download`
pub async fn download_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let id = JobId::from(job_id.as_str());
    let (path, job) = match state.manager.download_path(&id).await {
        Ok(found) => found,
        Err(e) => return AppError::from(e).into_response(),
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return AppError::from(JobError::Expired(job_id)).into_response()
        }
        Err(e) => return AppError::io(&path, e).into_response(),
    };

    let timestamp = job
        .completed_at
        .unwrap_or(job.created_at)
        .format("%Y%m%d-%H%M%S");
    let disposition = format!("attachment; filename=\"slideforge-{}.zip\"", timestamp);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

/// `GET /api/health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime: state.started_at.elapsed().as_secs(),
    })
}
