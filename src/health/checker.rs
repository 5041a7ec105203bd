//! 检测项接口
//!
//! 每种检测（Runner 状态、虚拟网络用量）实现 `HealthCheck`，
//! `Reporter` 只依赖这个接口完成一次检测周期。

use crate::error::{FetchError, RunnerVitalsError};
use crate::health::normalizer::RecordScope;
use crate::health::record::{RawItem, SourceType};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// 检测项trait
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// 记录来源类型
    fn source_type(&self) -> SourceType;

    /// 外部接口名称，用于错误信息
    fn api_name(&self) -> &'static str;

    /// 记录投递的目标流
    fn stream_name(&self) -> &str;

    /// 记录所属范围
    fn scope(&self) -> RecordScope;

    /// 缺失的必需配置键名，非空时不会执行拉取
    fn missing_settings(&self) -> Vec<&'static str>;

    /// 拉取原始条目，保持接口返回的顺序
    async fn fetch(&self) -> Result<Vec<RawItem>, RunnerVitalsError>;
}

/// 创建检测共用的HTTP客户端
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
        .build()
}

/// 发送请求并把非成功状态转换为 `FetchError`
pub(crate) async fn send_checked(
    api: &'static str,
    request: RequestBuilder,
) -> Result<Response, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|source| FetchError::Transport { api, source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            api,
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// 读取JSON响应体
pub(crate) async fn read_json(
    api: &'static str,
    response: Response,
) -> Result<serde_json::Value, FetchError> {
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| FetchError::InvalidResponse {
            api,
            detail: format!("response body is not valid JSON: {e}"),
        })
}

/// 从响应中取出对象数组
///
/// 数组中的非对象元素视为响应结构错误。
pub(crate) fn object_items(
    api: &'static str,
    items: &[serde_json::Value],
) -> Result<Vec<RawItem>, FetchError> {
    items
        .iter()
        .map(|item| {
            item.as_object()
                .cloned()
                .ok_or_else(|| FetchError::InvalidResponse {
                    api,
                    detail: format!("expected an object item, got {item}"),
                })
        })
        .collect()
}
