//! Azure Monitor 日志摄取投递器
//!
//! 通过数据收集规则（DCR）的流接口上传JSON数组。记录按序列化后的大小切分为
//! 多个批次，单个批次失败只影响该批次。

use crate::config::SinkConfig;
use crate::error::DeliveryError;
use crate::health::record::Row;
use crate::secrets::{TokenProvider, MONITOR_SCOPE};
use crate::sink::{DeliveryOutcome, LogSink, OnUploadError, UploadFailure};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

/// 日志摄取投递器
pub struct LogsIngestionSink {
    client: Client,
    endpoint: String,
    rule_id: String,
    api_version: String,
    max_batch_bytes: usize,
    credential: Arc<dyn TokenProvider>,
}

impl LogsIngestionSink {
    /// 创建投递器
    ///
    /// # 参数
    /// * `client` - HTTP客户端
    /// * `endpoint` - 数据收集端点
    /// * `rule_id` - 数据收集规则不可变 ID
    /// * `credential` - 令牌提供者
    pub fn new(
        client: Client,
        endpoint: &str,
        rule_id: &str,
        credential: Arc<dyn TokenProvider>,
    ) -> Self {
        let defaults = SinkConfig::default();
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            rule_id: rule_id.to_string(),
            api_version: defaults.api_version,
            max_batch_bytes: defaults.max_batch_bytes,
            credential,
        }
    }

    /// 从配置创建，端点或规则 ID 缺失时返回 `None`
    pub fn from_config(
        config: &SinkConfig,
        client: Client,
        credential: Arc<dyn TokenProvider>,
    ) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let endpoint = config.data_collection_endpoint.as_deref()?;
        let rule_id = config.rule_id.as_deref()?;
        Some(
            Self::new(client, endpoint, rule_id, credential)
                .with_api_version(&config.api_version)
                .with_max_batch_bytes(config.max_batch_bytes),
        )
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    pub fn with_max_batch_bytes(mut self, max_batch_bytes: usize) -> Self {
        self.max_batch_bytes = max_batch_bytes.max(1);
        self
    }

    fn stream_url(&self, stream: &str) -> String {
        format!(
            "{}/dataCollectionRules/{}/streams/{}?api-version={}",
            self.endpoint, self.rule_id, stream, self.api_version
        )
    }

    /// 按序列化大小切分批次，保持记录顺序
    ///
    /// 单条记录超过上限时独立成批，由端点决定是否接受。
    fn chunk_rows(&self, rows: &[Row]) -> Result<Vec<Vec<Row>>, DeliveryError> {
        let mut chunks = Vec::new();
        let mut current: Vec<Row> = Vec::new();
        // 数组括号
        let mut current_size = 2usize;

        for row in rows {
            let row_size = serde_json::to_vec(row)?.len() + 1;
            if !current.is_empty() && current_size + row_size > self.max_batch_bytes {
                chunks.push(std::mem::take(&mut current));
                current_size = 2;
            }
            current_size += row_size;
            current.push(row.clone());
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        Ok(chunks)
    }
}

#[async_trait]
impl LogSink for LogsIngestionSink {
    async fn upload(
        &self,
        stream: &str,
        rows: &[Row],
        on_error: &mut OnUploadError<'_>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let mut outcome = DeliveryOutcome {
            attempted: rows.len(),
            ..Default::default()
        };
        if rows.is_empty() {
            debug!("没有需要投递的记录: {}", stream);
            return Ok(outcome);
        }

        let token = self.credential.token(MONITOR_SCOPE).await?;
        let url = self.stream_url(stream);
        let chunks = self.chunk_rows(rows)?;
        let chunk_count = chunks.len();
        let mut unreachable = 0usize;

        for chunk in chunks {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&token)
                .json(&chunk)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("投递成功: {} ({} 条)", stream, chunk.len());
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let error = DeliveryError::Rejected { status, body };
                    outcome.record_failure(
                        UploadFailure {
                            failed_logs: chunk,
                            error: error.to_string(),
                        },
                        on_error,
                    );
                }
                Err(e) => {
                    if e.is_connect() {
                        unreachable += 1;
                    }
                    outcome.record_failure(
                        UploadFailure {
                            failed_logs: chunk,
                            error: format!("upload request failed: {e}"),
                        },
                        on_error,
                    );
                }
            }
        }

        if unreachable == chunk_count {
            return Err(DeliveryError::Unreachable(self.endpoint.clone()));
        }

        info!(
            "日志投递完成: {}，提交 {} 条，失败 {} 条",
            stream,
            outcome.attempted,
            outcome.failed_logs.len()
        );
        Ok(outcome)
    }
}
