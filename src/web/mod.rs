//! HTTP 触发端点模块
//!
//! 按需执行一次检测周期并以JSON返回周期结果

use crate::health::{HealthCheck, Threshold};
use crate::sink::LogSink;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod server;

pub use server::WebServer;

/// Web 应用状态
#[derive(Clone)]
pub struct WebAppState {
    /// Runner 状态检测
    pub runners: Arc<dyn HealthCheck>,
    /// 虚拟网络用量检测
    pub vnet: Arc<dyn HealthCheck>,
    /// 日志投递器
    pub sink: Arc<dyn LogSink>,
    /// 请求未指定阈值时使用的默认值
    pub default_threshold: Threshold,
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl WebAppState {
    pub fn new(
        runners: Arc<dyn HealthCheck>,
        vnet: Arc<dyn HealthCheck>,
        sink: Arc<dyn LogSink>,
        default_threshold: Threshold,
    ) -> Self {
        Self {
            runners,
            vnet,
            sink,
            default_threshold,
            start_time: chrono::Utc::now(),
        }
    }
}

/// 创建路由
pub fn create_router(state: WebAppState) -> Router {
    Router::new()
        .route("/api/runners/status", get(handlers::runner_status))
        .route("/api/vnet/usage", get(handlers::vnet_usage))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
