//! 错误处理模块
//!
//! 定义应用程序的统一错误类型。检测周期内的错误只在 `Reporter` 边界
//! 被转换为 `CycleResult`，其余层级均以类型化错误向上传播。

use thiserror::Error;

/// Runner Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum RunnerVitalsError {
    /// 配置相关错误
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// 外部接口拉取错误
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// 日志投递错误
    #[error("{0}")]
    Delivery(#[from] DeliveryError),

    /// 调用方参数校验错误
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// 密钥读取错误
    #[error("{0}")]
    Secret(#[from] SecretError),

    /// 凭据获取错误
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 缺少必需的配置项，按声明顺序列出键名
    #[error("Missing environment variables: {}", .keys.join(", "))]
    MissingSettings { keys: Vec<String> },

    /// 配置文件解析错误
    #[error("config parse error: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("config validation failed: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("environment variable substitution failed: {var}")]
    EnvVarError { var: String },
}

/// 外部接口拉取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 非成功状态码
    #[error("{api} error: {status}")]
    Status { api: &'static str, status: u16 },

    /// 传输层错误（连接、超时、TLS等）
    #[error("{api} error: {source}")]
    Transport {
        api: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// 响应结构无法识别
    #[error("{api} error: {detail}")]
    InvalidResponse { api: &'static str, detail: String },
}

impl FetchError {
    /// 返回出错的接口名称
    pub fn api(&self) -> &'static str {
        match self {
            FetchError::Status { api, .. }
            | FetchError::Transport { api, .. }
            | FetchError::InvalidResponse { api, .. } => api,
        }
    }
}

/// 日志投递错误类型
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// 摄取端点不可达
    #[error("ingestion endpoint unreachable: {0}")]
    Unreachable(String),

    /// 摄取端点拒绝请求
    #[error("ingestion endpoint rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 无法获取访问令牌
    #[error("could not authorize log upload: {0}")]
    Unauthorized(#[from] CredentialError),

    /// 记录序列化失败
    #[error("could not serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 调用方参数校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// 阈值不是有限的非负数
    #[error("Invalid threshold parameter: {0}")]
    InvalidThreshold(String),
}

/// 密钥读取错误
#[derive(Error, Debug)]
pub enum SecretError {
    /// Key Vault 返回非成功状态码
    #[error("secret {name} could not be read: status {status}")]
    Status { name: String, status: u16 },

    /// 传输层错误
    #[error("secret {name} could not be read: {source}")]
    Transport {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// 密钥不存在或为空
    #[error("secret {name} has no value")]
    Missing { name: String },

    /// Key Vault 地址无法解析
    #[error("invalid key vault url: {url}")]
    InvalidVaultUrl { url: String },

    /// 凭据获取失败
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// 凭据获取错误
#[derive(Error, Debug, Clone)]
pub enum CredentialError {
    /// 未配置访问令牌
    #[error("no access token configured for {scope}")]
    NotConfigured { scope: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, RunnerVitalsError>;
