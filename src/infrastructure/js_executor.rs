//! JS 执行器 - 基础设施层
//!
//! 持有唯一的渲染面资源，只暴露"执行 JS / 截图"的能力。
//! 每一次浏览器调用都带有独立的超时上限。

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::browser::{ClipRect, RenderSurface};
use crate::error::RenderError;
use crate::services::layout::Dimensions;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 RenderSurface
/// - 暴露 eval() 与截图能力
/// - 不认识 Job / SlideLayout
/// - 不处理业务流程
pub struct JsExecutor {
    surface: Box<dyn RenderSurface>,
    call_timeout: Duration,
}

impl JsExecutor {
    pub fn new(surface: Box<dyn RenderSurface>, call_timeout: Duration) -> Self {
        Self {
            surface,
            call_timeout,
        }
    }

    /// 导航到指定 URL
    pub async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.bounded("页面导航", self.surface.navigate(url)).await
    }

    /// 设置视口
    pub async fn set_viewport(&self, size: Dimensions, scale: f64) -> Result<(), RenderError> {
        self.bounded("设置视口", self.surface.set_viewport(size, scale))
            .await
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl AsRef<str>) -> Result<JsonValue, RenderError> {
        self.bounded("执行脚本", self.surface.evaluate(js_code.as_ref()))
            .await
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl AsRef<str>,
    ) -> Result<T, RenderError> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 截取区域
    pub async fn capture_clip(&self, clip: ClipRect) -> Result<Vec<u8>, RenderError> {
        self.bounded("截图", self.surface.capture_clip(clip)).await
    }

    /// 截取元素
    pub async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, RenderError> {
        self.bounded("元素截图", self.surface.capture_element(selector))
            .await
    }

    /// 释放渲染面
    pub async fn close(self) {
        if tokio::time::timeout(self.call_timeout, self.surface.close())
            .await
            .is_err()
        {
            tracing::warn!("释放渲染面超时");
        }
    }

    async fn bounded<T>(
        &self,
        step: &str,
        call: impl Future<Output = Result<T, RenderError>>,
    ) -> Result<T, RenderError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::timeout(step, self.call_timeout)),
        }
    }
}
