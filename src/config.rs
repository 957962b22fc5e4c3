use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听端口
    pub port: u16,
    /// 上传文件大小上限（MB）
    pub max_file_size_mb: usize,
    /// 同时处理的任务数量上限
    pub max_concurrent_jobs: usize,
    /// 单个任务的超时时间（秒）
    pub job_timeout_secs: u64,
    /// 任务完成后保留的时间（秒）
    pub job_ttl_secs: u64,
    /// 过期清理的扫描间隔（秒）
    pub cleanup_interval_secs: u64,
    /// 超时触发后等待流水线收尾的时间（毫秒）
    pub timeout_grace_ms: u64,
    /// 日志级别（RUST_LOG 未设置时生效）
    pub log_level: String,
    /// 任务临时目录的根目录
    pub work_root: PathBuf,
    /// 指定 Chromium 可执行文件，为空时自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 允许的跨域来源，为空表示全部放行
    pub allowed_origins: Vec<String>,
    // --- 截图时序 ---
    pub capture: CaptureTimings,
}

/// 截图流程中每一步等待的上限
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CaptureTimings {
    /// 导航、截图等单次浏览器调用的上限
    pub call_timeout_ms: u64,
    /// 等待网络空闲的上限
    pub network_idle_ms: u64,
    /// 判定网络空闲所需的静默窗口
    pub network_quiet_window_ms: u64,
    /// 等待字体加载的上限
    pub fonts_ms: u64,
    /// 等待 `[data-ready]` 标记的上限
    pub ready_marker_ms: u64,
    /// 截图前的固定稳定延迟
    pub settle_ms: u64,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            network_idle_ms: 10_000,
            network_quiet_window_ms: 500,
            fonts_ms: 5_000,
            ready_marker_ms: 1_000,
            settle_ms: 200,
        }
    }
}

impl CaptureTimings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn network_quiet_window(&self) -> Duration {
        Duration::from_millis(self.network_quiet_window_ms)
    }

    pub fn fonts(&self) -> Duration {
        Duration::from_millis(self.fonts_ms)
    }

    pub fn ready_marker(&self) -> Duration {
        Duration::from_millis(self.ready_marker_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// 所有时序均为零，测试中使用
    pub fn immediate() -> Self {
        Self {
            call_timeout_ms: 5_000,
            network_idle_ms: 0,
            network_quiet_window_ms: 0,
            fonts_ms: 0,
            ready_marker_ms: 0,
            settle_ms: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            max_file_size_mb: 50,
            max_concurrent_jobs: 3,
            job_timeout_secs: 5 * 60,
            job_ttl_secs: 30 * 60,
            cleanup_interval_secs: 60,
            timeout_grace_ms: 10_000,
            log_level: "info".to_string(),
            work_root: std::env::temp_dir().join("slideforge"),
            chrome_executable: None,
            allowed_origins: Vec::new(),
            capture: CaptureTimings::default(),
        }
    }
}

impl Config {
    /// 先读取 `SLIDEFORGE_CONFIG` 指向的 TOML 文件（如果有），再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("SLIDEFORGE_CONFIG") {
            Ok(path) => Self::from_toml_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_toml_str(&content).map_err(|e| {
            ConfigError::FileReadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> Self {
        let minutes = |var: &str, fallback: u64| {
            std::env::var(var)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|m| m.saturating_mul(60))
                .unwrap_or(fallback)
        };
        Self {
            port: env_or("PORT", self.port),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", self.max_file_size_mb),
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", self.max_concurrent_jobs),
            job_timeout_secs: minutes("JOB_TIMEOUT_MINUTES", self.job_timeout_secs),
            job_ttl_secs: minutes("JOB_TTL_MINUTES", self.job_ttl_secs),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECONDS", self.cleanup_interval_secs),
            timeout_grace_ms: self.timeout_grace_ms,
            log_level: std::env::var("LOG_LEVEL").unwrap_or(self.log_level),
            work_root: std::env::var("WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or(self.work_root),
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .map(PathBuf::from)
                .or(self.chrome_executable),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(self.allowed_origins),
            capture: self.capture,
        }
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn timeout_grace(&self) -> Duration {
        Duration::from_millis(self.timeout_grace_ms)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// 读取环境变量并解析，缺失或无法解析时回退到默认值
fn env_or<T: FromStr>(var: &str, fallback: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_jobs, 3);
        assert_eq!(config.job_timeout(), Duration::from_secs(300));
        assert_eq!(config.job_ttl(), Duration::from_secs(1800));
        assert_eq!(config.capture.settle(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            max_concurrent_jobs = 8

            [capture]
            fonts_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent_jobs, 8);
        assert_eq!(config.capture.fonts_ms, 100);
        assert_eq!(config.capture.network_idle_ms, 10_000);
        assert_eq!(config.port, 3001);
    }
}
