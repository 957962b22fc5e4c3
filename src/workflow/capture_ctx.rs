//! 截图上下文
//!
//! 封装"我正在处理哪个任务"这一信息，以及取消信号和进度通道

use std::fmt::Display;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::RenderError;
use crate::models::{JobId, Progress, Resolution};

/// 截图上下文
#[derive(Debug, Clone)]
pub struct CaptureCtx {
    pub job_id: JobId,
    pub resolution: Resolution,
    cancel: CancellationToken,
    progress: watch::Sender<Progress>,
}

impl CaptureCtx {
    pub fn new(
        job_id: JobId,
        resolution: Resolution,
        cancel: CancellationToken,
        progress: watch::Sender<Progress>,
    ) -> Self {
        Self {
            job_id,
            resolution,
            cancel,
            progress,
        }
    }

    /// 已收到取消信号时返回 `Cancelled`
    pub fn check_cancelled(&self) -> Result<(), RenderError> {
        if self.cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        Ok(())
    }

    /// 可被取消打断的等待
    pub async fn sleep(&self, duration: Duration) -> Result<(), RenderError> {
        if duration.is_zero() {
            return self.check_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RenderError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// 发布进度
    pub fn report(&self, current: usize, total: usize) {
        let _ = self.progress.send(Progress::new(current, total));
    }
}

impl Display for CaptureCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 {}]", self.job_id)
    }
}
