//! 凭据与密钥
//!
//! `TokenProvider` 提供 Bearer 令牌，`SecretStore` 按名称读取密钥。
//! 令牌的获取方式不在本工具的职责范围内，内置实现只读取配置中按范围区分的静态令牌。

use crate::config::CredentialsConfig;
use crate::error::{CredentialError, SecretError};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Azure Resource Manager 令牌范围
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
/// Key Vault 令牌范围
pub const KEYVAULT_SCOPE: &str = "https://vault.azure.net/.default";
/// Azure Monitor 日志摄取令牌范围
pub const MONITOR_SCOPE: &str = "https://monitor.azure.com/.default";

const KEYVAULT_API_VERSION: &str = "7.4";

/// 访问令牌提供者
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// 获取指定范围的 Bearer 令牌
    async fn token(&self, scope: &str) -> Result<String, CredentialError>;
}

/// 静态令牌提供者，按令牌范围保存各自的令牌
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置指定范围的令牌，空令牌视为未配置
    pub fn with(mut self, scope: &str, token: &str) -> Self {
        if !token.is_empty() {
            self.tokens.insert(scope.to_string(), token.to_string());
        }
        self
    }

    /// 从凭据配置创建
    pub fn from_config(config: &CredentialsConfig) -> Self {
        [
            (MANAGEMENT_SCOPE, &config.management_token),
            (KEYVAULT_SCOPE, &config.keyvault_token),
            (MONITOR_SCOPE, &config.monitor_token),
        ]
        .into_iter()
        .fold(Self::new(), |provider, (scope, token)| match token {
            Some(token) => provider.with(scope, token),
            None => provider,
        })
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, scope: &str) -> Result<String, CredentialError> {
        self.tokens
            .get(scope)
            .cloned()
            .ok_or_else(|| CredentialError::NotConfigured {
                scope: scope.to_string(),
            })
    }
}

/// 密钥存储
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// 读取密钥值
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

/// 基于 Key Vault REST 接口的密钥存储
pub struct KeyVaultSecretStore<T: TokenProvider> {
    client: Client,
    vault_url: String,
    credential: T,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

impl<T: TokenProvider> KeyVaultSecretStore<T> {
    pub fn new(client: Client, vault_url: &str, credential: T) -> Self {
        Self {
            client,
            vault_url: vault_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    /// 密钥名作为单独的路径段编码
    fn secret_url(&self, name: &str) -> Result<Url, SecretError> {
        let invalid = || SecretError::InvalidVaultUrl {
            url: self.vault_url.clone(),
        };
        let mut url = Url::parse(&self.vault_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("secrets")
            .push(name);
        url.query_pairs_mut()
            .append_pair("api-version", KEYVAULT_API_VERSION);
        Ok(url)
    }
}

#[async_trait]
impl<T: TokenProvider> SecretStore for KeyVaultSecretStore<T> {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let url = self.secret_url(name)?;
        let token = self.credential.token(KEYVAULT_SCOPE).await?;
        debug!("读取密钥: {}", name);

        let transport = |source| SecretError::Transport {
            name: name.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(SecretError::Status {
                name: name.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bundle: SecretBundle = response.json().await.map_err(transport)?;
        bundle
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SecretError::Missing {
                name: name.to_string(),
            })
    }
}

/// 内存密钥存储，用于测试和本地运行
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::Missing {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_provider_is_scoped() {
        let provider = StaticTokenProvider::from_config(&CredentialsConfig {
            management_token: Some("arm".to_string()),
            keyvault_token: Some("vault".to_string()),
            monitor_token: None,
        });
        assert_eq!(provider.token(MANAGEMENT_SCOPE).await.unwrap(), "arm");
        assert_eq!(provider.token(KEYVAULT_SCOPE).await.unwrap(), "vault");

        let err = provider.token(MONITOR_SCOPE).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotConfigured { .. }));
        assert!(err.to_string().contains(MONITOR_SCOPE));
    }

    #[tokio::test]
    async fn test_empty_token_is_not_configured() {
        let provider = StaticTokenProvider::new().with(KEYVAULT_SCOPE, "");
        assert!(provider.token(KEYVAULT_SCOPE).await.is_err());
    }

    #[tokio::test]
    async fn test_key_vault_reads_secret_value() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/secrets/gh-token")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".into(),
                "7.4".into(),
            ))
            .match_header("authorization", "Bearer vault-token")
            .with_status(200)
            .with_body(r#"{"value": "ghp_secret", "id": "x"}"#)
            .create_async()
            .await;

        let store = KeyVaultSecretStore::new(
            Client::new(),
            &format!("{}/", server.url()),
            StaticTokenProvider::new().with(KEYVAULT_SCOPE, "vault-token"),
        );
        assert_eq!(store.get_secret("gh-token").await.unwrap(), "ghp_secret");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_key_vault_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/secrets/missing")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let store = KeyVaultSecretStore::new(
            Client::new(),
            &server.url(),
            StaticTokenProvider::new().with(KEYVAULT_SCOPE, "t"),
        );
        let err = store.get_secret("missing").await.unwrap_err();
        assert!(matches!(err, SecretError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_key_vault_requires_token() {
        let store = KeyVaultSecretStore::new(
            Client::new(),
            "http://127.0.0.1:9",
            StaticTokenProvider::new(),
        );
        let err = store.get_secret("gh-token").await.unwrap_err();
        assert!(matches!(err, SecretError::Credential(_)));
    }

    #[test]
    fn test_secret_name_is_encoded_as_path_segment() {
        let store = KeyVaultSecretStore::new(
            Client::new(),
            "https://vault.example/",
            StaticTokenProvider::new(),
        );
        let url = store.secret_url("team/gh token?x=1#frag").unwrap();
        assert_eq!(
            url.as_str(),
            "https://vault.example/secrets/team%2Fgh%20token%3Fx=1%23frag?api-version=7.4"
        );
        assert_eq!(
            store.secret_url("gh-token").unwrap().as_str(),
            "https://vault.example/secrets/gh-token?api-version=7.4"
        );
    }

    #[tokio::test]
    async fn test_invalid_vault_url() {
        let store = KeyVaultSecretStore::new(
            Client::new(),
            "not a url",
            StaticTokenProvider::new().with(KEYVAULT_SCOPE, "t"),
        );
        let err = store.get_secret("gh-token").await.unwrap_err();
        assert!(matches!(err, SecretError::InvalidVaultUrl { .. }));
    }

    #[tokio::test]
    async fn test_static_secret_store() {
        let store = StaticSecretStore::new().with("a", "1");
        assert_eq!(store.get_secret("a").await.unwrap(), "1");
        assert!(store.get_secret("b").await.is_err());
    }
}
