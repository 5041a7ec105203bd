//! Web服务器实现
//!
//! 负责监听地址绑定和优雅关闭

use super::{create_router, WebAppState};
use crate::config::WebConfig;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 应用状态
    state: WebAppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, state: WebAppState) -> Self {
        Self { config, state }
    }

    /// 启动Web服务器，收到关闭信号后返回
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.enabled {
            info!("Web服务器已禁用");
            return Ok(());
        }

        let addr = self.config.socket_addr().map_err(anyhow::Error::msg)?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("绑定监听地址失败: {addr}"))?;

        info!("Web服务器已启动: http://{}", addr);
        info!("Runner 状态: http://{}/api/runners/status", addr);
        info!("VNet 用量: http://{}/api/vnet/usage?threshold=80", addr);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await
            .context("Web服务器运行失败")?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
