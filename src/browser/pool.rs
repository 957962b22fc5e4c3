//! 共享浏览器池
//!
//! 整个进程只有一个 Chromium 实例：
//! - 第一次 `acquire()` 时才启动
//! - 连接断开（事件循环退出）后，下一次 `acquire()` 透明地重新启动
//! - 每个任务获得一个独立的 BrowserContext，关闭渲染面只销毁该上下文
//! - `shutdown()` 在程序退出时关闭浏览器

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::surface::{ClipRect, RenderSurface, SurfaceProvider};
use crate::error::RenderError;
use crate::services::layout::Dimensions;

const LAUNCH_ARGS: [&str; 4] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// 运行中的浏览器
struct Engine {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl Engine {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.handler.is_finished()
    }
}

/// 浏览器池
pub struct BrowserPool {
    chrome_executable: Option<PathBuf>,
    engine: Mutex<Option<Engine>>,
}

impl BrowserPool {
    pub fn new(chrome_executable: Option<PathBuf>) -> Self {
        Self {
            chrome_executable,
            engine: Mutex::new(None),
        }
    }

    /// 启动无头浏览器，并在后台处理浏览器事件
    async fn launch(&self) -> Result<Engine, RenderError> {
        info!("🚀 启动无头浏览器...");

        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .args(LAUNCH_ARGS.to_vec());
        if let Some(path) = &self.chrome_executable {
            debug!("使用指定的浏览器: {}", path.display());
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|reason| {
            error!("配置无头浏览器失败: {}", reason);
            RenderError::LaunchFailed { reason }
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            RenderError::LaunchFailed {
                reason: e.to_string(),
            }
        })?;

        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
            flag.store(false, Ordering::SeqCst);
            warn!("⚠️ 浏览器连接已断开");
        });

        info!("✅ 无头浏览器已就绪");
        Ok(Engine {
            browser: Arc::new(browser),
            handler,
            alive,
        })
    }

    /// 返回可用的浏览器，必要时启动
    async fn engine(&self) -> Result<(Arc<Browser>, Arc<AtomicBool>), RenderError> {
        let mut guard = self.engine.lock().await;
        if let Some(engine) = guard.as_ref() {
            if engine.is_alive() {
                return Ok((engine.browser.clone(), engine.alive.clone()));
            }
            warn!("浏览器已断开，重新启动");
            if let Some(stale) = guard.take() {
                stale.handler.abort();
            }
        }

        let engine = self.launch().await?;
        let handles = (engine.browser.clone(), engine.alive.clone());
        *guard = Some(engine);
        Ok(handles)
    }

    /// 关闭浏览器进程
    pub async fn shutdown(&self) {
        let Some(engine) = self.engine.lock().await.take() else {
            return;
        };
        if engine.is_alive() {
            if let Err(e) = engine.browser.execute(CloseParams::default()).await {
                warn!("关闭浏览器时出错: {}", e);
            }
        }
        engine.handler.abort();
        info!("✓ 浏览器已关闭");
    }
}

#[async_trait]
impl SurfaceProvider for BrowserPool {
    async fn acquire(&self) -> Result<Box<dyn RenderSurface>, RenderError> {
        let (browser, alive) = self.engine().await?;
        let failed = |step: &str, e: CdpError| classify(&alive, step, e);

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| failed("创建浏览器上下文", e))?
            .result
            .browser_context_id;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|reason| RenderError::engine("创建页面", reason))?;

        let page = match browser.new_page(params).await {
            Ok(page) => page,
            Err(e) => {
                let err = failed("创建页面", e);
                let _ = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                return Err(err);
            }
        };

        debug!("已创建隔离上下文 {:?}", context_id);
        Ok(Box::new(ChromeSurface {
            page,
            browser,
            context_id: Some(context_id),
            alive,
        }))
    }
}

/// 浏览器连接已断开时统一报告为 `EngineDisconnected`
fn classify(alive: &AtomicBool, step: &str, err: CdpError) -> RenderError {
    if !alive.load(Ordering::SeqCst) {
        return RenderError::EngineDisconnected;
    }
    match err {
        CdpError::Timeout => RenderError::RenderTimeout {
            step: step.to_string(),
            timeout_ms: 0,
        },
        CdpError::ChannelSendError(_) | CdpError::NoResponse => RenderError::EngineDisconnected,
        other => RenderError::engine(step, other),
    }
}

/// Chromium 中一个任务独占的页面
///
/// 未经 `close()` 就被丢弃时（例如超时后流水线被放弃），在后台销毁上下文。
struct ChromeSurface {
    page: Page,
    browser: Arc<Browser>,
    context_id: Option<BrowserContextId>,
    alive: Arc<AtomicBool>,
}

impl ChromeSurface {
    fn failed(&self, step: &str, e: CdpError) -> RenderError {
        classify(&self.alive, step, e)
    }
}

async fn dispose_context(browser: &Browser, page: Page, context_id: BrowserContextId) {
    if let Err(e) = page.close().await {
        debug!("关闭页面失败: {}", e);
    }
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!("销毁浏览器上下文失败: {}", e);
    }
}

impl Drop for ChromeSurface {
    fn drop(&mut self) {
        let Some(context_id) = self.context_id.take() else {
            return;
        };
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let browser = self.browser.clone();
            let page = self.page.clone();
            runtime.spawn(async move { dispose_context(&browser, page, context_id).await });
        }
    }
}

#[async_trait]
impl RenderSurface for ChromeSurface {
    async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| self.failed("页面导航", e))?;
        Ok(())
    }

    async fn set_viewport(&self, size: Dimensions, device_scale: f64) -> Result<(), RenderError> {
        let params = SetDeviceMetricsOverrideParams::new(
            size.width as i64,
            size.height as i64,
            device_scale,
            false,
        );
        self.page
            .execute(params)
            .await
            .map_err(|e| self.failed("设置视口", e))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, RenderError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|reason| RenderError::engine("执行脚本", reason))?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| self.failed("执行脚本", e))?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn capture_clip(&self, clip: ClipRect) -> Result<Vec<u8>, RenderError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| self.failed("截图", e))
    }

    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, RenderError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| self.failed("查找元素", e))?;
        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| self.failed("元素截图", e))
    }

    async fn close(mut self: Box<Self>) {
        let Some(context_id) = self.context_id.take() else {
            return;
        };
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        dispose_context(&self.browser, self.page.clone(), context_id).await;
    }
}
