//! 任务管理器 - 编排层
//!
//! ## 职责
//!
//! 1. **准入控制**：`try_admit()` 原子地占用一个并发名额，名额随许可一起释放
//! 2. **任务表**：唯一持有所有 [`Job`] 记录，读者只拿到克隆
//! 3. **流水线调度**：为每个任务启动 [`JobRunner`]，并施加整体超时
//! 4. **进度回写**：进度通道上的最新值写回任务记录
//! 5. **过期清理**：定期删除超过保留时间的任务及其临时目录

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job_runner::JobRunner;
use crate::browser::SurfaceProvider;
use crate::config::Config;
use crate::error::{AppError, JobError};
use crate::models::{Job, JobId, JobStatus, JobView, Progress, Resolution};
use crate::utils::{ensure_dir, remove_within};
use crate::workflow::CaptureCtx;

/// 并发名额；丢弃即释放
#[derive(Debug)]
pub struct AdmissionPermit(OwnedSemaphorePermit);

/// 任务管理器
pub struct JobManager {
    config: Arc<Config>,
    jobs: RwLock<HashMap<JobId, Job>>,
    admission: Arc<Semaphore>,
    runner: JobRunner,
}

impl JobManager {
    pub fn new(config: Arc<Config>, provider: Arc<dyn SurfaceProvider>) -> Self {
        let limit = config.max_concurrent_jobs.max(1);
        Self {
            runner: JobRunner::new(&config, provider),
            admission: Arc::new(Semaphore::new(limit)),
            jobs: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn limit(&self) -> usize {
        self.config.max_concurrent_jobs.max(1)
    }

    /// 正在处理的任务数
    pub fn active_count(&self) -> usize {
        self.limit() - self.admission.available_permits()
    }

    /// 原子地占用一个并发名额
    pub fn try_admit(&self) -> Result<AdmissionPermit, JobError> {
        self.admission
            .clone()
            .try_acquire_owned()
            .map(AdmissionPermit)
            .map_err(|_| JobError::AdmissionRejected {
                active: self.active_count(),
                limit: self.limit(),
            })
    }

    /// 创建 pending 状态的任务
    pub fn create(&self, resolution: Resolution) -> JobId {
        let id = JobId::generate();
        let job = Job::new(id.clone(), resolution);
        self.write_jobs().insert(id.clone(), job);
        id
    }

    /// 准入 + 创建 + 后台运行
    pub fn submit(
        self: &Arc<Self>,
        archive: Vec<u8>,
        resolution: Resolution,
    ) -> Result<JobId, JobError> {
        let permit = self.try_admit()?;
        let id = self.create(resolution);
        info!("[任务 {}] 📥 已受理 ({} 字节, {:?})", id, archive.len(), resolution);

        let manager = Arc::clone(self);
        let job_id = id.clone();
        tokio::spawn(async move { manager.run(job_id, archive, permit).await });
        Ok(id)
    }

    /// 执行一个任务的流水线；许可在返回时释放
    pub async fn run(self: Arc<Self>, id: JobId, archive: Vec<u8>, permit: AdmissionPermit) {
        let _permit = permit;
        let job_dir = self.config.work_root.join(id.as_str());

        let Some(resolution) = self.get(&id).map(|job| job.resolution) else {
            warn!("[任务 {}] 任务不存在，跳过", id);
            return;
        };
        if !self.update(&id, |job| job.start(job_dir.clone())) {
            warn!("[任务 {}] 任务不是 pending 状态，跳过", id);
            return;
        }
        if let Err(e) = ensure_dir(&job_dir).await {
            self.fail(&id, &e);
            return;
        }

        let cancel = CancellationToken::new();
        let (progress_tx, progress_rx) = watch::channel(Progress::default());
        let forwarder = self.spawn_progress_forwarder(id.clone(), progress_rx);
        let ctx = CaptureCtx::new(id.clone(), resolution, cancel.clone(), progress_tx);

        let timeout = self.config.job_timeout();
        let mut pipeline = Box::pin(self.runner.execute(&ctx, archive, &job_dir, |phase| {
            self.update(&id, |job| job.advance_phase(phase));
        }));

        let finished = tokio::select! {
            result = &mut pipeline => Some(result),
            _ = tokio::time::sleep(timeout) => None,
        };

        match finished {
            Some(result) => {
                drop(pipeline);
                drop(ctx);
                let _ = forwarder.await;
                match result {
                    Ok(archive_path) => {
                        if self.update(&id, |job| job.complete(archive_path.clone())) {
                            info!("[任务 {}] ✅ 处理完成: {}", id, archive_path.display());
                        } else {
                            remove_within(&self.config.work_root, &job_dir).await;
                        }
                    }
                    Err(e) => {
                        remove_within(&self.config.work_root, &job_dir).await;
                        self.fail(&id, &e);
                    }
                }
            }
            None => {
                cancel.cancel();
                let err: AppError = JobError::TimedOut {
                    timeout_secs: timeout.as_secs(),
                }
                .into();
                self.fail(&id, &err);

                match tokio::time::timeout(self.config.timeout_grace(), &mut pipeline).await {
                    Ok(_) => debug!("[任务 {}] 超时后流水线已退出", id),
                    Err(_) => warn!("[任务 {}] 超时后流水线未能及时退出，已放弃", id),
                }
                drop(pipeline);
                drop(ctx);
                let _ = forwarder.await;
                remove_within(&self.config.work_root, &job_dir).await;
            }
        }
    }

    /// 把进度通道的最新值写回任务记录，发送端全部关闭后结束
    fn spawn_progress_forwarder(
        self: &Arc<Self>,
        id: JobId,
        mut rx: watch::Receiver<Progress>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let progress = *rx.borrow_and_update();
                manager.update(&id, |job| job.record_progress(progress));
            }
        })
    }

    fn fail(&self, id: &JobId, err: &AppError) {
        if self.update(id, |job| job.fail(err.to_string())) {
            error!("[任务 {}] ❌ 处理失败: {}", id, err);
        } else {
            debug!("[任务 {}] 已是终态，忽略后续错误: {}", id, err);
        }
    }

    /// 修改任务记录，返回修改函数的结果；任务不存在时返回 false
    pub fn update(&self, id: &JobId, f: impl FnOnce(&mut Job) -> bool) -> bool {
        self.write_jobs().get_mut(id).map(f).unwrap_or(false)
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.read_jobs().get(id).cloned()
    }

    pub fn view(&self, id: &JobId) -> Option<JobView> {
        self.read_jobs().get(id).map(JobView::from)
    }

    /// 下载前的检查：任务存在、已完成、压缩包仍在
    pub async fn download_path(&self, id: &JobId) -> Result<(PathBuf, Job), JobError> {
        let job = self
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status != JobStatus::Completed {
            return Err(JobError::NotReady(id.to_string()));
        }
        let path = job
            .output_location
            .clone()
            .ok_or_else(|| JobError::Expired(id.to_string()))?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok((path, job)),
            _ => Err(JobError::Expired(id.to_string())),
        }
    }

    /// 删除过期任务及其临时目录，返回删除的数量
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let ttl = self.config.job_ttl();
        let expired: Vec<Job> = {
            let mut jobs = self.write_jobs();
            let ids: Vec<JobId> = jobs
                .values()
                .filter(|job| job.is_expired(now, ttl))
                .map(|job| job.id.clone())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &expired {
            if let Some(dir) = &job.working_storage {
                remove_within(&self.config.work_root, dir).await;
            }
            debug!("[任务 {}] 🧹 已过期清理", job.id);
        }
        if !expired.is_empty() {
            info!("🧹 清理了 {} 个过期任务", expired.len());
        }
        expired.len()
    }

    /// 后台定期清理，直到收到取消信号
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.cleanup_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        manager.sweep_expired().await;
                    }
                }
            }
            debug!("过期清理任务已停止");
        })
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
