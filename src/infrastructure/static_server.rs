//! 临时静态文件服务
//!
//! 每个任务在 `127.0.0.1` 的随机端口上托管自己的内容目录，
//! 浏览器通过它加载页面，相对路径的样式、图片、字体才能正常解析。

use std::path::Path;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, warn};
use url::Url;

use crate::error::RenderError;

const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub struct StaticServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StaticServer {
    /// 在随机端口上开始托管 `root`
    pub async fn start(root: &Path) -> Result<Self, RenderError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| RenderError::StaticServer(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RenderError::StaticServer(e.to_string()))?;

        let app = Router::new().fallback_service(ServeDir::new(root));
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                warn!("静态文件服务异常退出: {}", e);
            }
        });

        let base_url = format!("http://{}", addr);
        debug!("静态文件服务已启动: {} -> {}", base_url, root.display());
        Ok(Self {
            base_url,
            shutdown: Some(tx),
            task,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 相对路径对应的 URL
    pub fn url_for(&self, relative: &Path) -> Result<String, RenderError> {
        document_url(&self.base_url, relative)
    }

    /// 停止服务；浏览器保持的长连接最多等待 [`CLOSE_GRACE`]
    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if tokio::time::timeout(CLOSE_GRACE, &mut self.task).await.is_err() {
            self.task.abort();
        }
        debug!("静态文件服务已关闭: {}", self.base_url);
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
            self.task.abort();
        }
    }
}

/// 在 `base_url` 后逐段追加相对路径，每段单独做百分号编码
pub fn document_url(base_url: &str, relative: &Path) -> Result<String, RenderError> {
    let invalid =
        |reason: String| RenderError::StaticServer(format!("无效的地址 {}: {}", base_url, reason));
    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("不能追加路径".to_string()))?
        .pop_if_empty()
        .extend(relative.components().map(|c| c.as_os_str().to_string_lossy()));
    Ok(url.into())
}
