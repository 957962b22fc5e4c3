/// 日志工具模块
///
/// 负责初始化 tracing 订阅器，并提供启动 / 关闭时的日志辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，未设置时回退到配置中的日志级别。
/// 重复调用是安全的（测试中会多次调用）。
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 SlideForge 启动 - 端口 {}", config.port);
    info!("📊 最大并发任务数: {}", config.max_concurrent_jobs);
    info!(
        "⏱️ 任务超时: {} 秒 | 结果保留: {} 秒",
        config.job_timeout_secs, config.job_ttl_secs
    );
    info!("📁 临时目录: {}", config.work_root.display());
    info!("{}", "=".repeat(60));
}

/// 记录程序关闭信息
pub fn log_shutdown(reason: &str) {
    info!("\n{}", "─".repeat(60));
    info!("🛑 正在关闭 ({})", reason);
    info!("{}", "─".repeat(60));
}
