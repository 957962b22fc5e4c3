//! 截图前的就绪等待
//!
//! 顺序：load（导航本身已等待）→ 网络空闲 → 字体 → `[data-ready]` → 固定延迟。
//! 每一步都有自己的上限；某一步没有达成只记录日志并继续，
//! 只有浏览器调用本身超时、断开或任务被取消才会中断截图。

use tracing::debug;

use super::capture_ctx::CaptureCtx;
use super::scripts;
use crate::config::CaptureTimings;
use crate::error::RenderError;
use crate::infrastructure::JsExecutor;

pub struct Readiness<'a> {
    timings: &'a CaptureTimings,
}

impl<'a> Readiness<'a> {
    pub fn new(timings: &'a CaptureTimings) -> Self {
        Self { timings }
    }

    /// 完整的就绪等待
    pub async fn wait(&self, executor: &JsExecutor, ctx: &CaptureCtx) -> Result<(), RenderError> {
        ctx.check_cancelled()?;

        let network_idle = self.timings.network_idle();
        if !network_idle.is_zero() {
            let script =
                scripts::wait_network_idle(network_idle, self.timings.network_quiet_window());
            if !self.soft_step(executor, "网络空闲", &script).await? {
                debug!("{} 网络空闲等待超时，继续截图", ctx);
            }
        }

        ctx.check_cancelled()?;
        let fonts = self.timings.fonts();
        if !fonts.is_zero() {
            let script = scripts::wait_fonts(fonts);
            if !self.soft_step(executor, "字体加载", &script).await? {
                debug!("{} 字体加载等待超时，继续截图", ctx);
            }
        }

        ctx.check_cancelled()?;
        let ready_marker = self.timings.ready_marker();
        if !ready_marker.is_zero() {
            let script = scripts::wait_ready_marker(ready_marker);
            self.soft_step(executor, "就绪标记", &script).await?;
        }

        self.settle(ctx).await
    }

    /// 只等待固定延迟（同一页面内切换幻灯片时使用）
    pub async fn settle(&self, ctx: &CaptureCtx) -> Result<(), RenderError> {
        ctx.sleep(self.timings.settle()).await
    }

    /// 执行一个等待脚本，返回是否达成；脚本本身出错视为未达成
    async fn soft_step(
        &self,
        executor: &JsExecutor,
        step: &str,
        script: &str,
    ) -> Result<bool, RenderError> {
        match executor.eval(script).await {
            Ok(value) => Ok(value.as_bool().unwrap_or(true)),
            Err(e @ RenderError::RenderTimeout { .. })
            | Err(e @ RenderError::EngineDisconnected)
            | Err(e @ RenderError::Cancelled) => Err(e),
            Err(e) => {
                debug!("{} 失败: {}", step, e);
                Ok(false)
            }
        }
    }
}
