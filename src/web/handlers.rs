//! Web 路由处理函数
//!
//! 每个检测端点执行一次完整的检测周期，成功返回200，失败返回500。

use super::WebAppState;
use crate::health::{CycleResult, PolicyEvaluator, Reporter, Threshold};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// 用量端点查询参数
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    /// 用量阈值（百分比）
    pub threshold: Option<String>,
}

/// 存活检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
}

/// Runner 状态端点
pub async fn runner_status(State(state): State<WebAppState>) -> Response {
    info!("收到 Runner 状态检测请求");
    let evaluator = PolicyEvaluator::new(state.default_threshold);
    let result =
        Reporter::run_cycle(state.runners.as_ref(), &evaluator, state.sink.as_ref()).await;
    cycle_response(result)
}

/// 虚拟网络用量端点
pub async fn vnet_usage(
    State(state): State<WebAppState>,
    Query(query): Query<UsageQuery>,
) -> Response {
    let threshold = match Threshold::parse_or(query.threshold.as_deref(), state.default_threshold)
    {
        Ok(threshold) => threshold,
        Err(e) => {
            warn!("拒绝用量检测请求: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid threshold parameter").into_response();
        }
    };

    info!("收到 VNet 用量检测请求，阈值 {}", threshold);
    let evaluator = PolicyEvaluator::new(threshold);
    let result = Reporter::run_cycle(state.vnet.as_ref(), &evaluator, state.sink.as_ref()).await;
    cycle_response(result)
}

/// 存活检查端点
pub async fn health(State(state): State<WebAppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_seconds: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}

fn cycle_response(result: CycleResult) -> Response {
    let status = if result.success {
        StatusCode::OK
    } else {
        error!("检测周期失败: {}", result.message);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result)).into_response()
}

#[cfg(test)]
mod tests {
    use crate::error::{FetchError, RunnerVitalsError};
    use crate::health::record::{RawItem, SourceType};
    use crate::health::{HealthCheck, RecordScope, Threshold};
    use crate::sink::NoOpSink;
    use crate::web::{create_router, WebAppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct StubCheck {
        source_type: SourceType,
        items: Option<Vec<Value>>,
    }

    #[async_trait]
    impl HealthCheck for StubCheck {
        fn source_type(&self) -> SourceType {
            self.source_type
        }

        fn api_name(&self) -> &'static str {
            "Stub API"
        }

        fn stream_name(&self) -> &str {
            "Custom-Stub_CL"
        }

        fn scope(&self) -> RecordScope {
            RecordScope::virtual_network("sub", "rg", "vnet")
        }

        fn missing_settings(&self) -> Vec<&'static str> {
            Vec::new()
        }

        async fn fetch(&self) -> Result<Vec<RawItem>, RunnerVitalsError> {
            match &self.items {
                Some(items) => Ok(items
                    .iter()
                    .filter_map(|item| item.as_object().cloned())
                    .collect()),
                None => Err(FetchError::Status {
                    api: "Stub API",
                    status: 500,
                }
                .into()),
            }
        }
    }

    fn state(runners: Option<Vec<Value>>, usages: Option<Vec<Value>>) -> WebAppState {
        WebAppState::new(
            Arc::new(StubCheck {
                source_type: SourceType::Runner,
                items: runners,
            }),
            Arc::new(StubCheck {
                source_type: SourceType::VNetUsage,
                items: usages,
            }),
            Arc::new(NoOpSink),
            Threshold::default(),
        )
    }

    async fn get(state: WebAppState, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn usage_85() -> Vec<Value> {
        vec![json!({"name": {"value": "SubnetSpace"}, "currentValue": 85, "limit": 100})]
    }

    #[tokio::test]
    async fn test_runner_status_success() {
        let runners = vec![
            json!({"id": 1, "name": "r1", "status": "online"}),
            json!({"id": 2, "name": "r2", "status": "offline"}),
        ];
        let (status, body) = get(state(Some(runners), None), "/api/runners/status").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Found 1 offline runners");
        assert_eq!(json["details"]["offline_runners"], json!(["r2"]));
    }

    #[tokio::test]
    async fn test_runner_status_failure_is_500() {
        let (status, body) = get(state(None, None), "/api/runners/status").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Stub API error: 500");
        assert!(json["details"].is_null());
    }

    #[tokio::test]
    async fn test_vnet_usage_uses_default_threshold() {
        let (status, body) = get(state(None, Some(usage_85())), "/api/vnet/usage").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Threshold exceeded for 1 usage(s).");
        assert_eq!(json["details"]["threshold_percentage"], 80.0);
        assert_eq!(json["details"]["threshold_exceeded"][0]["usagePct"], 85.0);
    }

    #[tokio::test]
    async fn test_vnet_usage_query_threshold() {
        let (status, body) =
            get(state(None, Some(usage_85())), "/api/vnet/usage?threshold=90").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "All VNet usages are within threshold.");
        assert_eq!(json["details"]["exceeded_count"], 0);
    }

    #[tokio::test]
    async fn test_vnet_usage_invalid_threshold() {
        for query in ["threshold=abc", "threshold=-5", "threshold=NaN"] {
            let uri = format!("/api/vnet/usage?{query}");
            let (status, body) = get(state(None, Some(usage_85())), &uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, b"Invalid threshold parameter");
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = get(state(None, None), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
    }
}
