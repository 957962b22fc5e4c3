use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::browser::BrowserPool;
use crate::config::Config;
use crate::orchestrator::JobManager;
use crate::utils::logging::{log_shutdown, log_startup};
use crate::utils::{ensure_dir, remove_within};

/// 应用主结构
pub struct App {
    config: Arc<Config>,
    pool: Arc<BrowserPool>,
    manager: Arc<JobManager>,
}

impl App {
    /// 初始化应用
    ///
    /// 浏览器在第一个任务到来时才启动。
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        ensure_dir(&config.work_root)
            .await
            .context("无法创建临时目录")?;
        clear_stale_jobs(&config).await;

        let config = Arc::new(config);
        let pool = Arc::new(BrowserPool::new(config.chrome_executable.clone()));
        let manager = Arc::new(JobManager::new(config.clone(), pool.clone()));

        Ok(Self {
            config,
            pool,
            manager,
        })
    }

    pub fn manager(&self) -> &Arc<JobManager> {
        &self.manager
    }

    /// 运行 HTTP 服务，直到 `shutdown` 完成
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let sweeper_stop = CancellationToken::new();
        let sweeper = self.manager.spawn_sweeper(sweeper_stop.clone());

        let state = AppState::new(self.manager.clone());
        let router = create_router(
            state,
            self.config.max_body_bytes(),
            &self.config.allowed_origins,
        );

        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .with_context(|| format!("无法监听端口 {}", self.config.port))?;
        info!("✓ HTTP 服务已启动: http://{}", listener.local_addr()?);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        log_shutdown("收到退出信号");
        sweeper_stop.cancel();
        if let Err(e) = sweeper.await {
            warn!("清理任务退出异常: {}", e);
        }
        self.pool.shutdown().await;

        served.context("HTTP 服务异常退出")
    }
}

/// 删除上次运行遗留的任务目录
async fn clear_stale_jobs(config: &Config) {
    let Ok(mut entries) = tokio::fs::read_dir(&config.work_root).await else {
        return;
    };
    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && remove_within(&config.work_root, &entry.path()).await {
            removed += 1;
        }
    }
    if removed > 0 {
        info!("🧹 已清理 {} 个遗留的任务目录", removed);
    }
}
