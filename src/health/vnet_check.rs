//! 虚拟网络地址用量检测
//!
//! 调用 `virtualNetworks/{name}/usages` 接口，跟随 `nextLink` 读取全部分页。

use crate::config::VnetCheckConfig;
use crate::error::{FetchError, RunnerVitalsError};
use crate::health::checker::{object_items, read_json, send_checked, HealthCheck};
use crate::health::normalizer::RecordScope;
use crate::health::record::{RawItem, SourceType};
use crate::secrets::{TokenProvider, MANAGEMENT_SCOPE};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

const API_NAME: &str = "VNet Usage API";
/// 防止异常的 `nextLink` 造成死循环
const MAX_PAGES: usize = 50;

/// 虚拟网络用量检测
pub struct VnetUsageCheck {
    config: VnetCheckConfig,
    stream: String,
    client: Client,
    credential: Arc<dyn TokenProvider>,
}

impl VnetUsageCheck {
    pub fn new(
        config: VnetCheckConfig,
        stream: String,
        client: Client,
        credential: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            config,
            stream,
            client,
            credential,
        }
    }

    fn usages_url(&self) -> String {
        format!(
            "{}{}/usages?api-version={}",
            self.config.management_url.trim_end_matches('/'),
            self.scope().id,
            self.config.api_version
        )
    }
}

#[async_trait]
impl HealthCheck for VnetUsageCheck {
    fn source_type(&self) -> SourceType {
        SourceType::VNetUsage
    }

    fn api_name(&self) -> &'static str {
        API_NAME
    }

    fn stream_name(&self) -> &str {
        &self.stream
    }

    fn scope(&self) -> RecordScope {
        RecordScope::virtual_network(
            self.config.subscription_id.as_deref().unwrap_or_default(),
            self.config.resource_group_name.as_deref().unwrap_or_default(),
            self.config.virtual_network_name.as_deref().unwrap_or_default(),
        )
    }

    fn missing_settings(&self) -> Vec<&'static str> {
        self.config.missing_settings()
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, RunnerVitalsError> {
        let token = self.credential.token(MANAGEMENT_SCOPE).await?;

        let mut usages = Vec::new();
        let mut next_url = Some(self.usages_url());
        let mut pages = 0usize;

        while let Some(url) = next_url.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(FetchError::InvalidResponse {
                    api: API_NAME,
                    detail: format!("more than {MAX_PAGES} result pages"),
                }
                .into());
            }

            let request = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .header("Content-Type", "application/json");
            let body = read_json(API_NAME, send_checked(API_NAME, request).await?).await?;

            let items = body
                .get("value")
                .and_then(serde_json::Value::as_array)
                .ok_or_else(|| FetchError::InvalidResponse {
                    api: API_NAME,
                    detail: "Invalid usage data received.".to_string(),
                })?;
            usages.extend(object_items(API_NAME, items)?);

            next_url = body
                .get("nextLink")
                .and_then(serde_json::Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
        }

        debug!("VNet 用量条目: {} 条，{} 页", usages.len(), pages);
        Ok(usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticTokenProvider;
    use mockito::Matcher;
    use serde_json::json;

    const USAGES_PATH: &str = "/subscriptions/sub-1/resourceGroups/rg-net/providers/Microsoft.Network/virtualNetworks/vnet-ci/usages";

    fn check_for(server_url: &str) -> VnetUsageCheck {
        let config = VnetCheckConfig {
            subscription_id: Some("sub-1".to_string()),
            resource_group_name: Some("rg-net".to_string()),
            virtual_network_name: Some("vnet-ci".to_string()),
            management_url: server_url.to_string(),
            ..Default::default()
        };
        VnetUsageCheck::new(
            config,
            "Custom-VNetUsage_CL".to_string(),
            Client::new(),
            Arc::new(StaticTokenProvider::new().with(MANAGEMENT_SCOPE, "arm-token")),
        )
    }

    #[tokio::test]
    async fn test_fetch_usages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", USAGES_PATH)
            .match_query(Matcher::UrlEncoded("api-version".into(), "2024-05-01".into()))
            .match_header("authorization", "Bearer arm-token")
            .with_body(
                json!({"value": [
                    {"name": {"value": "SubnetSpace"}, "currentValue": 85, "limit": 100, "unit": "Count"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let usages = check_for(&server.url()).fetch().await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0]["currentValue"], 85);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_follows_next_link() {
        let mut server = mockito::Server::new_async().await;
        let next = format!("{}/next-page", server.url());
        let _first = server
            .mock("GET", USAGES_PATH)
            .match_query(Matcher::Any)
            .with_body(json!({"value": [{"name": {"value": "a"}}], "nextLink": next}).to_string())
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/next-page")
            .with_body(json!({"value": [{"name": {"value": "b"}}]}).to_string())
            .create_async()
            .await;

        let usages = check_for(&server.url()).fetch().await.unwrap();
        let names: Vec<_> = usages.iter().map(|u| u["name"]["value"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_fetch_missing_value_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", USAGES_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"error": "nope"}"#)
            .create_async()
            .await;

        let err = check_for(&server.url()).fetch().await.unwrap_err();
        assert!(err.to_string().contains("Invalid usage data received."));
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", USAGES_PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let err = check_for(&server.url()).fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "VNet Usage API error: 403");
    }

    #[test]
    fn test_usages_url() {
        let check = check_for("https://management.azure.com/");
        assert_eq!(
            check.usages_url(),
            format!("https://management.azure.com{USAGES_PATH}?api-version=2024-05-01")
        );
    }
}
