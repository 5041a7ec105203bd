//! 环境变量覆盖
//!
//! 通过 `EnvironmentProvider` 读取环境变量并覆盖配置文件中的值，
//! 测试时可替换为 `MockEnvironment`。

use crate::config::types::Config;
use std::collections::HashMap;

/// 环境变量读取接口
pub trait EnvironmentProvider: Send + Sync {
    /// 读取变量，不存在或为空时返回 `None`
    fn var(&self, key: &str) -> Option<String>;
}

/// 进程环境变量
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// 基于内存映射的环境变量，用于测试
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置变量
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

impl Config {
    /// 用环境变量覆盖配置
    ///
    /// 变量名与托管环境中使用的名称一致，存在时优先于配置文件。
    pub fn apply_env(&mut self, env: &dyn EnvironmentProvider) {
        let set = |target: &mut Option<String>, key: &str| {
            if let Some(value) = env.var(key) {
                *target = Some(value);
            }
        };

        set(&mut self.runners.keyvault_uri, "KEYVAULT_URI");
        set(&mut self.runners.github_org, "GITHUB_ORG");
        set(
            &mut self.runners.github_token_secret_name,
            "GITHUB_TOKEN_SECRET_NAME",
        );
        // 专用连接串优先，其次回退到宿主的存储连接串
        if let Some(value) = env
            .var("AZURE_STORAGE_CONNECTION_STRING")
            .or_else(|| env.var("AzureWebJobsStorage"))
        {
            self.runners.storage_connection_string = Some(value);
        }
        if let Some(value) = env.var("COMPUTERNAME") {
            self.runners.computer_name = value;
        }

        set(&mut self.vnet.subscription_id, "SUBSCRIPTION_ID");
        set(&mut self.vnet.resource_group_name, "RESOURCE_GROUP_NAME");
        set(&mut self.vnet.virtual_network_name, "VIRTUAL_NETWORK_NAME");
        if let Some(value) = env.var("API_VERSION") {
            self.vnet.api_version = value;
        }

        set(
            &mut self.sink.data_collection_endpoint,
            "DATA_COLLECTION_ENDPOINT",
        );
        set(&mut self.sink.rule_id, "LOGS_DCR_RULE_ID");
        if let Some(value) = env.var("LOGS_DCR_STREAM_NAME_RUNNER") {
            self.sink.runner_stream = value;
        }
        if let Some(value) = env.var("LOGS_DCR_STREAM_NAME_VNET") {
            self.sink.vnet_stream = value;
        }

        set(
            &mut self.credentials.management_token,
            "AZURE_MANAGEMENT_TOKEN",
        );
        set(&mut self.credentials.keyvault_token, "AZURE_KEYVAULT_TOKEN");
        set(&mut self.credentials.monitor_token, "AZURE_MONITOR_TOKEN");
    }

    /// 描述存储连接串的来源，用于启动日志
    pub fn storage_source(env: &dyn EnvironmentProvider) -> &'static str {
        if env.var("AZURE_STORAGE_CONNECTION_STRING").is_some() {
            "AZURE_STORAGE_CONNECTION_STRING"
        } else {
            "AzureWebJobsStorage"
        }
    }
}
