//! 组件装配
//!
//! 根据配置创建检测项、密钥存储和日志投递器

use crate::config::Config;
use crate::health::{build_http_client, HealthCheck, RunnerCheck, Threshold, VnetUsageCheck};
use crate::secrets::{KeyVaultSecretStore, StaticTokenProvider, TokenProvider};
use crate::sink::{LogSink, LogsIngestionSink, NoOpSink};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 运行所需的全部组件
#[derive(Clone)]
pub struct Components {
    /// Runner 状态检测
    pub runners: Arc<dyn HealthCheck>,
    /// 虚拟网络用量检测
    pub vnet: Arc<dyn HealthCheck>,
    /// 日志投递器
    pub sink: Arc<dyn LogSink>,
    /// 默认用量阈值
    pub threshold: Threshold,
}

impl Components {
    /// 从配置创建组件
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.global.request_timeout_seconds))
            .context("创建HTTP客户端失败")?;
        let credential = StaticTokenProvider::from_config(&config.credentials);
        let shared_credential: Arc<dyn TokenProvider> = Arc::new(credential.clone());

        let secrets = Arc::new(KeyVaultSecretStore::new(
            client.clone(),
            config.runners.keyvault_uri.as_deref().unwrap_or_default(),
            credential,
        ));

        let runners: Arc<dyn HealthCheck> = Arc::new(RunnerCheck::new(
            config.runners.clone(),
            config.sink.runner_stream.clone(),
            client.clone(),
            secrets,
        ));
        let vnet: Arc<dyn HealthCheck> = Arc::new(VnetUsageCheck::new(
            config.vnet.clone(),
            config.sink.vnet_stream.clone(),
            client.clone(),
            Arc::clone(&shared_credential),
        ));

        let sink: Arc<dyn LogSink> =
            match LogsIngestionSink::from_config(&config.sink, client, shared_credential) {
                Some(sink) => {
                    info!("日志摄取端点已配置");
                    Arc::new(sink)
                }
                None => {
                    warn!("日志摄取端点未配置，检测记录只输出到日志");
                    Arc::new(NoOpSink)
                }
            };

        let threshold = Threshold::new(config.global.threshold_percentage)
            .context("无效的默认用量阈值")?;

        Ok(Self {
            runners,
            vnet,
            sink,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockEnvironment;
    use crate::health::{PolicyEvaluator, Reporter, SourceType};

    #[test]
    fn test_components_follow_config() {
        let mut config = Config::default();
        config.global.threshold_percentage = 65.0;
        config.sink.runner_stream = "Custom-Runners_CL".to_string();

        let components = Components::from_config(&config).unwrap();
        assert_eq!(components.threshold.value(), 65.0);
        assert_eq!(components.runners.source_type(), SourceType::Runner);
        assert_eq!(components.runners.stream_name(), "Custom-Runners_CL");
        assert_eq!(components.vnet.stream_name(), "Custom-VNetUsage_CL");
    }

    #[tokio::test]
    async fn test_unconfigured_environment_reports_missing_keys() {
        let mut config = Config::default();
        config.apply_env(&MockEnvironment::new().with("GITHUB_ORG", "acme"));
        let components = Components::from_config(&config).unwrap();

        let result = Reporter::run_cycle(
            components.runners.as_ref(),
            &PolicyEvaluator::new(components.threshold),
            components.sink.as_ref(),
        )
        .await;
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Missing environment variables: KEYVAULT_URI, AZURE_STORAGE_CONNECTION_STRING, GITHUB_TOKEN_SECRET_NAME"
        );

        let result = Reporter::run_cycle(
            components.vnet.as_ref(),
            &PolicyEvaluator::new(components.threshold),
            components.sink.as_ref(),
        )
        .await;
        assert_eq!(
            result.message,
            "Missing environment variables: SUBSCRIPTION_ID, RESOURCE_GROUP_NAME, VIRTUAL_NETWORK_NAME"
        );
    }
}
