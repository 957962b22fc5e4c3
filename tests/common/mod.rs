//! 集成测试共用的内存实现与工具函数
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use slideforge::browser::{ClipRect, RenderSurface, SurfaceProvider};
use slideforge::config::{CaptureTimings, Config};
use slideforge::error::RenderError;
use slideforge::models::{JobId, JobStatus, JobView};
use slideforge::services::layout::Dimensions;
use slideforge::JobManager;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;

/// 渲染面记录到的调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    Viewport(Dimensions, f64),
    Clip(ClipRect),
    Element(String),
}

/// 就绪等待脚本的应答方式
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum WaitAnswer {
    /// 立即达成
    #[default]
    Reached,
    /// 等到上限仍未达成
    NotReached,
    /// 脚本自身报错
    ScriptError,
    /// 永远不返回
    Hang,
}

/// 假浏览器的行为与记录
#[derive(Default)]
pub struct FakeBrowser {
    /// 页面中的幻灯片标记数量
    pub slide_count: usize,
    /// 长文档测量脚本的返回值
    pub metrics: Option<JsonValue>,
    /// 导航永远不返回
    pub hang_on_navigate: bool,
    /// 截取这么多张之后触发取消
    pub cancel_after: Option<(usize, CancellationToken)>,
    /// 网络空闲 / 字体 / 就绪标记脚本的应答
    pub wait_answer: WaitAnswer,
    /// 给边界元素打标记总是失败
    pub tag_fails: bool,
    /// 截图时浏览器断开
    pub disconnect_on_capture: bool,
    /// 执行过的等待脚本数量
    pub waits: AtomicUsize,
    pub calls: Mutex<Vec<Call>>,
    pub captures: AtomicUsize,
    pub acquired: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeBrowser {
    pub fn with_slides(slide_count: usize) -> Arc<Self> {
        Arc::new(Self {
            slide_count,
            ..Default::default()
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            hang_on_navigate: true,
            ..Default::default()
        })
    }

    pub fn with_metrics(metrics: JsonValue) -> Arc<Self> {
        Arc::new(Self {
            metrics: Some(metrics),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_image(&self) -> Vec<u8> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if n >= *limit {
                token.cancel();
            }
        }
        png(n as u8)
    }
}

pub struct FakeProvider(pub Arc<FakeBrowser>);

#[async_trait]
impl SurfaceProvider for FakeProvider {
    async fn acquire(&self) -> Result<Box<dyn RenderSurface>, RenderError> {
        self.0.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSurface {
            browser: self.0.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSurface {
    browser: Arc<FakeBrowser>,
    closed: AtomicBool,
}

#[async_trait]
impl RenderSurface for FakeSurface {
    async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.browser.record(Call::Navigate(url.to_string()));
        if self.browser.hang_on_navigate {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn set_viewport(&self, size: Dimensions, device_scale: f64) -> Result<(), RenderError> {
        self.browser.record(Call::Viewport(size, device_scale));
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, RenderError> {
        if is_wait_script(script) {
            self.browser.waits.fetch_add(1, Ordering::SeqCst);
            return match self.browser.wait_answer {
                WaitAnswer::Reached => Ok(json!(true)),
                WaitAnswer::NotReached => Ok(json!(false)),
                WaitAnswer::ScriptError => {
                    Err(RenderError::engine("执行脚本", "ReferenceError: fonts is not defined"))
                }
                WaitAnswer::Hang => futures::future::pending().await,
            };
        }
        if script.starts_with("document.querySelectorAll") {
            return Ok(json!(self.browser.slide_count));
        }
        if script.contains("slides.forEach") {
            return Ok(json!(true));
        }
        if script.contains("contentWidth") {
            return Ok(self.browser.metrics.clone().unwrap_or(JsonValue::Null));
        }
        if script.contains("setAttribute") {
            return Ok(json!(!self.browser.tag_fails));
        }
        if script.contains("return window.scrollY") {
            return Ok(json!(0));
        }
        Ok(json!(true))
    }

    async fn capture_clip(&self, clip: ClipRect) -> Result<Vec<u8>, RenderError> {
        self.browser.record(Call::Clip(clip));
        if self.browser.disconnect_on_capture {
            return Err(RenderError::EngineDisconnected);
        }
        Ok(self.browser.next_image())
    }

    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, RenderError> {
        self.browser.record(Call::Element(selector.to_string()));
        Ok(self.browser.next_image())
    }

    async fn close(self: Box<Self>) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.browser.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn is_wait_script(script: &str) -> bool {
    script.contains("getEntriesByType") || script.contains("document.fonts") || script.contains("[data-ready]")
}

/// 单色小图
pub fn png(seed: u8) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([seed, 255 - seed, 90, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// 用给定条目构造 zip
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// 含 `count` 张标记幻灯片的入口文档
pub fn deck_html(count: usize) -> String {
    let slides: String = (1..=count)
        .map(|i| format!("<section class=\"slide\"><h1>{}</h1></section>\n", i))
        .collect();
    format!(
        "<!DOCTYPE html><html><head><style>.slide {{ width: 1280px; height: 720px; }}</style></head><body>{}</body></html>",
        slides
    )
}

/// 测试用配置：所有等待为零，临时目录在 `work_root`
pub fn test_config(work_root: &Path) -> Config {
    Config {
        work_root: work_root.to_path_buf(),
        capture: CaptureTimings::immediate(),
        timeout_grace_ms: 200,
        ..Config::default()
    }
}

pub fn manager_with(config: Config, browser: Arc<FakeBrowser>) -> Arc<JobManager> {
    Arc::new(JobManager::new(
        Arc::new(config),
        Arc::new(FakeProvider(browser)),
    ))
}

/// 轮询直到任务进入终态
pub async fn wait_terminal(manager: &JobManager, id: &JobId) -> JobView {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let view = manager.view(id).expect("任务应该存在");
        if view.status == JobStatus::Completed || view.status == JobStatus::Failed {
            return view;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "任务未能在期限内结束: {:?}",
            view
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
