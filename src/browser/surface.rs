//! 渲染面抽象
//!
//! 截图流程只通过这两个 trait 访问浏览器，单元测试里可以换成内存实现。

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::RenderError;
use crate::services::layout::Dimensions;

/// 页面坐标系中的截图区域（CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    /// 从左上角开始、大小为整张幻灯片的区域
    pub fn frame(size: Dimensions) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width as f64,
            height: size.height as f64,
        }
    }
}

/// 一个任务独占的页面
///
/// 同一个渲染面上的调用总是串行发生，实现无需处理并发调用。
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// 导航并等待 load 事件
    async fn navigate(&self, url: &str) -> Result<(), RenderError>;

    /// 设置视口大小与设备像素比
    async fn set_viewport(&self, size: Dimensions, device_scale: f64) -> Result<(), RenderError>;

    /// 执行表达式（Promise 会被等待），返回 JSON 值
    async fn evaluate(&self, script: &str) -> Result<JsonValue, RenderError>;

    /// 截取指定区域，返回 PNG 字节
    async fn capture_clip(&self, clip: ClipRect) -> Result<Vec<u8>, RenderError>;

    /// 截取第一个匹配 `selector` 的元素，返回 PNG 字节
    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, RenderError>;

    /// 释放该任务的隔离上下文；共享的浏览器进程不受影响
    async fn close(self: Box<Self>);
}

/// 渲染面来源
#[async_trait]
pub trait SurfaceProvider: Send + Sync {
    /// 获取一个新的隔离渲染面，必要时启动（或重新启动）浏览器
    async fn acquire(&self) -> Result<Box<dyn RenderSurface>, RenderError>;
}
