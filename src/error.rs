use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 压缩包解压错误
    #[error("压缩包错误: {0}")]
    Archive(#[from] ArchiveError),
    /// 幻灯片布局检测错误
    #[error("布局错误: {0}")]
    Layout(#[from] LayoutError),
    /// 渲染 / 截图错误
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),
    /// 打包错误
    #[error("打包错误: {0}")]
    Package(#[from] PackageError),
    /// 任务管理错误
    #[error("任务错误: {0}")]
    Job(#[from] JobError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 压缩包相关错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 不支持或已损坏的压缩包
    #[error("无效的压缩包: {reason}")]
    InvalidArchive { reason: String },
    /// 条目路径逃逸出解压目录
    #[error("检测到路径穿越: {entry}")]
    PathTraversal { entry: String },
    /// 没有可渲染的 HTML 文档
    #[error("压缩包中没有找到 HTML 文件")]
    NoContent,
}

/// 布局检测错误
#[derive(Debug, Error)]
pub enum LayoutError {
    /// 内容目录中没有 HTML 文档
    #[error("项目中没有找到 HTML 文档")]
    NoDocuments,
    /// 页面结构与检测结果不一致
    #[error("页面结构不符合预期: {detail}")]
    LayoutMismatch { detail: String },
}

/// 渲染相关错误
#[derive(Debug, Error)]
pub enum RenderError {
    /// 单步操作超时
    #[error("{step} 超时 ({timeout_ms}ms)")]
    RenderTimeout { step: String, timeout_ms: u64 },
    /// 任务被取消
    #[error("渲染已取消")]
    Cancelled,
    /// 浏览器连接已断开
    #[error("浏览器连接已断开")]
    EngineDisconnected,
    /// 启动浏览器失败
    #[error("启动浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 浏览器协议调用失败
    #[error("浏览器调用失败 ({step}): {reason}")]
    Engine { step: String, reason: String },
    /// 脚本返回值无法解析
    #[error("脚本返回值解析失败: {0}")]
    Script(#[from] serde_json::Error),
    /// 静态文件服务启动失败
    #[error("静态文件服务启动失败: {0}")]
    StaticServer(String),
}

/// 打包错误
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("写入压缩包失败 ({path}): {reason}")]
    PackagingError { path: String, reason: String },
}

/// 任务查询 / 准入错误
#[derive(Debug, Error)]
pub enum JobError {
    /// 并发已满
    #[error("服务器繁忙 (活跃任务 {active}/{limit})，请稍后重试")]
    AdmissionRejected { active: usize, limit: usize },
    /// 任务不存在
    #[error("任务不存在: {0}")]
    NotFound(String),
    /// 任务尚未完成
    #[error("任务尚未完成: {0}")]
    NotReady(String),
    /// 输出文件已被清理
    #[error("输出文件已不存在: {0}")]
    Expired(String),
    /// 任务超时
    #[error("任务超时 (超过 {timeout_secs} 秒)")]
    TimedOut { timeout_secs: u64 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {reason}")]
    FileReadFailed { path: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for RenderError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        RenderError::Engine {
            step: "cdp".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Render(err.into())
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        ArchiveError::InvalidArchive {
            reason: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::Archive(err.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Render(RenderError::Script(err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::FileReadFailed {
            path: String::new(),
            reason: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io {
            path: String::new(),
            source: err,
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建带路径的文件错误
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// 是否为取消类错误（超时触发后的连带失败）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Render(RenderError::Cancelled))
    }
}

impl RenderError {
    /// 创建单步超时错误
    pub fn timeout(step: impl Into<String>, timeout: std::time::Duration) -> Self {
        RenderError::RenderTimeout {
            step: step.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// 创建浏览器调用错误
    pub fn engine(step: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RenderError::Engine {
            step: step.into(),
            reason: reason.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
