//! 任务模型
//!
//! 描述一次渲染任务从提交到过期的完整生命周期。
//! 所有状态变更都通过这里的方法完成，方法本身保证：
//! - 终态（completed / failed）之后不再有任何状态变化
//! - 阶段只能前进，不能后退
//! - 进度的 `current` 单调不减
//! - `error` 和 `completed_at` 只写一次

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务 ID（不透明字符串）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// 生成新的随机 ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// 处理阶段，按声明顺序前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Extracting,
    Detecting,
    Rendering,
    Packaging,
}

/// 已完成 / 总共的幻灯片数量，`total` 为 0 表示尚未知道
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }
}

/// 输出分辨率档位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// 按检测到的尺寸 1:1 输出
    #[default]
    #[serde(rename = "hd")]
    Hd,
    /// 两倍像素密度输出
    #[serde(rename = "4k")]
    Uhd4k,
}

impl Resolution {
    /// 对应的设备像素比
    pub fn device_scale(self) -> f64 {
        match self {
            Resolution::Hd => 1.0,
            Resolution::Uhd4k => 2.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hd" | "1080p" => Some(Resolution::Hd),
            "4k" | "uhd" => Some(Resolution::Uhd4k),
            _ => None,
        }
    }
}

/// 一次渲染任务
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub phase: Option<JobPhase>,
    pub progress: Progress,
    pub resolution: Resolution,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 打包结果，仅在完成后设置
    pub output_location: Option<PathBuf>,
    /// 任务私有的临时目录
    pub working_storage: Option<PathBuf>,
}

impl Job {
    /// 创建处于 pending 状态的新任务
    pub fn new(id: JobId, resolution: Resolution) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            phase: None,
            progress: Progress::default(),
            resolution,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            output_location: None,
            working_storage: None,
        }
    }

    /// pending → processing
    pub fn start(&mut self, working_storage: PathBuf) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Processing;
        self.working_storage = Some(working_storage);
        true
    }

    /// 前进到新阶段；相同或更早的阶段会被忽略
    pub fn advance_phase(&mut self, phase: JobPhase) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        match self.phase {
            Some(current) if current >= phase => false,
            _ => {
                self.phase = Some(phase);
                true
            }
        }
    }

    /// 记录进度；`current` 不会倒退，`total` 为 0 时保留原值
    pub fn record_progress(&mut self, progress: Progress) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        let next = Progress {
            current: self.progress.current.max(progress.current),
            total: if progress.total > 0 {
                progress.total
            } else {
                self.progress.total
            },
        };
        let changed = next != self.progress;
        self.progress = next;
        changed
    }

    /// processing → completed
    pub fn complete(&mut self, output: PathBuf) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Completed;
        self.output_location = Some(output);
        self.completed_at = Some(Utc::now());
        true
    }

    /// 任意非终态 → failed；已是终态时保持不变（先到的失败原因优先）
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.completed_at = Some(Utc::now());
        true
    }

    /// 终态且完成时间早于保留窗口
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.completed_at {
            Some(done) if self.status.is_terminal() => now
                .signed_duration_since(done)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// 状态查询接口返回的视图
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub phase: Option<JobPhase>,
    pub progress: Progress,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            phase: job.phase,
            progress: job.progress,
            error: job.error.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}
