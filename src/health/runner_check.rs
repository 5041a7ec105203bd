//! GitHub 组织 Runner 状态检测

use crate::config::RunnerCheckConfig;
use crate::error::{FetchError, RunnerVitalsError};
use crate::health::checker::{object_items, read_json, send_checked, HealthCheck};
use crate::health::normalizer::RecordScope;
use crate::health::record::{RawItem, SourceType};
use crate::secrets::SecretStore;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

const API_NAME: &str = "GitHub API";
const GITHUB_API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
/// 服务端持续返回满页且没有 `total_count` 时的分页上限
const MAX_PAGES: usize = 50;

/// Runner 状态检测
pub struct RunnerCheck {
    config: RunnerCheckConfig,
    stream: String,
    client: Client,
    secrets: Arc<dyn SecretStore>,
}

impl RunnerCheck {
    /// 创建 Runner 检测
    ///
    /// # 参数
    /// * `config` - Runner 检测配置
    /// * `stream` - 记录投递的目标流
    /// * `client` - HTTP客户端
    /// * `secrets` - 读取 GitHub 令牌的密钥存储
    pub fn new(
        config: RunnerCheckConfig,
        stream: String,
        client: Client,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            config,
            stream,
            client,
            secrets,
        }
    }

    fn org(&self) -> &str {
        self.config.github_org.as_deref().unwrap_or_default()
    }

    fn runners_url(&self) -> String {
        format!(
            "{}/orgs/{}/actions/runners",
            self.config.github_api_url.trim_end_matches('/'),
            self.org()
        )
    }
}

#[async_trait]
impl HealthCheck for RunnerCheck {
    fn source_type(&self) -> SourceType {
        SourceType::Runner
    }

    fn api_name(&self) -> &'static str {
        API_NAME
    }

    fn stream_name(&self) -> &str {
        &self.stream
    }

    fn scope(&self) -> RecordScope {
        RecordScope::organization(self.org(), &self.config.computer_name)
    }

    fn missing_settings(&self) -> Vec<&'static str> {
        self.config.missing_settings()
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, RunnerVitalsError> {
        let secret_name = self
            .config
            .github_token_secret_name
            .as_deref()
            .unwrap_or_default();
        let token = self.secrets.get_secret(secret_name).await?;
        let url = self.runners_url();

        let mut runners = Vec::new();
        let mut page = 1usize;
        loop {
            if page > MAX_PAGES {
                return Err(FetchError::InvalidResponse {
                    api: API_NAME,
                    detail: format!("more than {MAX_PAGES} result pages"),
                }
                .into());
            }

            let request = self
                .client
                .get(&url)
                .query(&[("per_page", PAGE_SIZE), ("page", page)])
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
                .bearer_auth(&token);

            let body = read_json(API_NAME, send_checked(API_NAME, request).await?).await?;
            let page_items = match body.get("runners") {
                Some(serde_json::Value::Array(items)) => object_items(API_NAME, items)?,
                None | Some(serde_json::Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(FetchError::InvalidResponse {
                        api: API_NAME,
                        detail: format!("`runners` is not an array: {other}"),
                    }
                    .into())
                }
            };
            let total_count = body
                .get("total_count")
                .and_then(serde_json::Value::as_u64)
                .map(|n| n as usize);

            let received = page_items.len();
            runners.extend(page_items);
            debug!("GitHub runners 第{}页: {} 条", page, received);

            let complete = total_count.is_some_and(|total| runners.len() >= total);
            if received < PAGE_SIZE || complete {
                break;
            }
            page += 1;
        }

        Ok(runners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use mockito::Matcher;
    use serde_json::json;

    fn check_for(server_url: &str) -> RunnerCheck {
        let config = RunnerCheckConfig {
            keyvault_uri: Some("https://vault.example".to_string()),
            storage_connection_string: Some("conn".to_string()),
            github_org: Some("acme".to_string()),
            github_token_secret_name: Some("gh-token".to_string()),
            github_api_url: server_url.to_string(),
            computer_name: "agent-host".to_string(),
            ..Default::default()
        };
        RunnerCheck::new(
            config,
            "Custom-GHRunnerStatus_CL".to_string(),
            Client::new(),
            Arc::new(StaticSecretStore::new().with("gh-token", "ghp_abc")),
        )
    }

    #[tokio::test]
    async fn test_fetch_sends_github_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .match_header("authorization", "Bearer ghp_abc")
            .match_header("accept", "application/vnd.github+json")
            .match_header("x-github-api-version", "2022-11-28")
            .with_status(200)
            .with_body(
                json!({
                    "total_count": 2,
                    "runners": [
                        {"id": 1, "name": "a", "status": "online"},
                        {"id": 2, "name": "b", "status": "offline"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let runners = check_for(&server.url()).fetch().await.unwrap();
        assert_eq!(runners.len(), 2);
        assert_eq!(runners[1]["name"], "b");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let first_page: Vec<_> = (0..100).map(|i| json!({"id": i, "name": format!("r{i}")})).collect();
        let _page1 = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_body(json!({"total_count": 101, "runners": first_page}).to_string())
            .create_async()
            .await;
        let _page2 = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_body(json!({"total_count": 101, "runners": [{"id": 100, "name": "last"}]}).to_string())
            .create_async()
            .await;

        let runners = check_for(&server.url()).fetch().await.unwrap();
        assert_eq!(runners.len(), 101);
        assert_eq!(runners[0]["name"], "r0");
        assert_eq!(runners[100]["name"], "last");
    }

    #[tokio::test]
    async fn test_fetch_stops_after_page_limit() {
        let mut server = mockito::Server::new_async().await;
        let full_page: Vec<_> = (0..100).map(|i| json!({"id": i, "name": format!("r{i}")})).collect();
        let mock = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::Any)
            .with_body(json!({"runners": full_page}).to_string())
            .expect(MAX_PAGES)
            .create_async()
            .await;

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            check_for(&server.url()).fetch(),
        )
        .await
        .expect("fetch should stop at the page limit");

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            RunnerVitalsError::Fetch(FetchError::InvalidResponse { .. })
        ));
        assert!(err.to_string().contains("more than 50 result pages"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_stops_on_empty_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::Any)
            .with_body(json!({"total_count": 500, "runners": []}).to_string())
            .expect(1)
            .create_async()
            .await;

        let runners = check_for(&server.url()).fetch().await.unwrap();
        assert!(runners.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_missing_runners_key_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::Any)
            .with_body("{}")
            .create_async()
            .await;

        let runners = check_for(&server.url()).fetch().await.unwrap();
        assert!(runners.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/orgs/acme/actions/runners")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = check_for(&server.url()).fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "GitHub API error: 401");
    }

    #[test]
    fn test_scope_and_stream() {
        let check = check_for("https://api.github.com/");
        assert_eq!(check.runners_url(), "https://api.github.com/orgs/acme/actions/runners");
        assert_eq!(check.stream_name(), "Custom-GHRunnerStatus_CL");
        assert_eq!(check.scope(), RecordScope::organization("acme", "agent-host"));
        assert!(check.missing_settings().is_empty());
    }
}
