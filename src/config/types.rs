//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// 主配置结构，包含全局配置和各检测项配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Runner 状态检测配置
    #[serde(default)]
    pub runners: RunnerCheckConfig,
    /// 虚拟网络用量检测配置
    #[serde(default)]
    pub vnet: VnetCheckConfig,
    /// 日志摄取配置
    #[serde(default)]
    pub sink: SinkConfig,
    /// 访问令牌配置
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// HTTP 触发端点配置
    #[serde(default)]
    pub web: WebConfig,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 检测间隔（秒）
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// 启动时是否立即执行一次检测
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 默认用量阈值（百分比）
    #[serde(default = "default_threshold")]
    pub threshold_percentage: f64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            run_on_startup: true,
            log_level: default_log_level(),
            request_timeout_seconds: default_timeout(),
            threshold_percentage: default_threshold(),
        }
    }
}

/// Runner 状态检测配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerCheckConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Key Vault 地址
    pub keyvault_uri: Option<String>,
    /// 存储连接串（仅做存在性校验）
    pub storage_connection_string: Option<String>,
    /// GitHub 组织名
    pub github_org: Option<String>,
    /// 保存 GitHub 令牌的密钥名
    pub github_token_secret_name: Option<String>,
    /// GitHub API 根地址
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    /// 写入记录的计算机名
    #[serde(default)]
    pub computer_name: String,
}

impl Default for RunnerCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keyvault_uri: None,
            storage_connection_string: None,
            github_org: None,
            github_token_secret_name: None,
            github_api_url: default_github_api_url(),
            computer_name: String::new(),
        }
    }
}

impl RunnerCheckConfig {
    /// 返回缺失的必需配置键名
    pub fn missing_settings(&self) -> Vec<&'static str> {
        missing(&[
            ("KEYVAULT_URI", &self.keyvault_uri),
            (
                "AZURE_STORAGE_CONNECTION_STRING",
                &self.storage_connection_string,
            ),
            ("GITHUB_ORG", &self.github_org),
            ("GITHUB_TOKEN_SECRET_NAME", &self.github_token_secret_name),
        ])
    }
}

/// 虚拟网络用量检测配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VnetCheckConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 订阅 ID
    pub subscription_id: Option<String>,
    /// 资源组名
    pub resource_group_name: Option<String>,
    /// 虚拟网络名
    pub virtual_network_name: Option<String>,
    /// ARM API 版本
    #[serde(default = "default_arm_api_version")]
    pub api_version: String,
    /// ARM 根地址
    #[serde(default = "default_management_url")]
    pub management_url: String,
}

impl Default for VnetCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subscription_id: None,
            resource_group_name: None,
            virtual_network_name: None,
            api_version: default_arm_api_version(),
            management_url: default_management_url(),
        }
    }
}

impl VnetCheckConfig {
    /// 返回缺失的必需配置键名
    pub fn missing_settings(&self) -> Vec<&'static str> {
        missing(&[
            ("SUBSCRIPTION_ID", &self.subscription_id),
            ("RESOURCE_GROUP_NAME", &self.resource_group_name),
            ("VIRTUAL_NETWORK_NAME", &self.virtual_network_name),
        ])
    }
}

/// 日志摄取配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkConfig {
    /// 数据收集端点
    pub data_collection_endpoint: Option<String>,
    /// 数据收集规则不可变 ID
    pub rule_id: Option<String>,
    /// Runner 记录流名
    #[serde(default = "default_runner_stream")]
    pub runner_stream: String,
    /// 用量记录流名
    #[serde(default = "default_vnet_stream")]
    pub vnet_stream: String,
    /// 摄取 API 版本
    #[serde(default = "default_ingestion_api_version")]
    pub api_version: String,
    /// 单次上传的最大字节数
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            data_collection_endpoint: None,
            rule_id: None,
            runner_stream: default_runner_stream(),
            vnet_stream: default_vnet_stream(),
            api_version: default_ingestion_api_version(),
            max_batch_bytes: default_max_batch_bytes(),
        }
    }
}

impl SinkConfig {
    /// 端点和规则 ID 都存在时才视为已配置
    pub fn is_configured(&self) -> bool {
        is_present(&self.data_collection_endpoint) && is_present(&self.rule_id)
    }
}

/// 访问令牌配置
///
/// Azure 令牌只对签发时的受众有效，每个服务使用各自的令牌。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CredentialsConfig {
    /// Azure Resource Manager 令牌，用于读取虚拟网络用量
    pub management_token: Option<String>,
    /// Key Vault 令牌，用于读取 GitHub 令牌
    pub keyvault_token: Option<String>,
    /// Azure Monitor 令牌，用于日志摄取
    pub monitor_token: Option<String>,
}

/// HTTP 触发端点配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 端口
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl WebConfig {
    /// 获取监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn missing(required: &[(&'static str, &Option<String>)]) -> Vec<&'static str> {
    required
        .iter()
        .filter(|(_, value)| !is_present(value))
        .map(|(key, _)| *key)
        .collect()
}

// 默认值函数
fn default_check_interval() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_threshold() -> f64 {
    80.0
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_arm_api_version() -> String {
    "2024-05-01".to_string()
}
fn default_management_url() -> String {
    "https://management.azure.com".to_string()
}
fn default_runner_stream() -> String {
    "Custom-GHRunnerStatus_CL".to_string()
}
fn default_vnet_stream() -> String {
    "Custom-VNetUsage_CL".to_string()
}
fn default_ingestion_api_version() -> String {
    "2023-01-01".to_string()
}
fn default_max_batch_bytes() -> usize {
    1024 * 1024
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.global.check_interval_seconds == 0 {
        return Err("检测间隔不能为0".to_string());
    }

    if config.global.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    let threshold = config.global.threshold_percentage;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(format!("无效的用量阈值: {threshold}"));
    }

    if config.sink.max_batch_bytes == 0 {
        return Err("单次上传字节数不能为0".to_string());
    }

    for (name, url) in [
        ("github_api_url", &config.runners.github_api_url),
        ("management_url", &config.vnet.management_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("{name} 的URL格式无效: {url}"));
        }
    }

    if config.web.enabled {
        if config.web.port == 0 {
            return Err("HTTP端口不能为0".to_string());
        }
        config.web.socket_addr()?;
    }

    Ok(())
}
