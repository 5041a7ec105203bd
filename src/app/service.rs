//! 服务管理模块
//!
//! 负责定时检测、HTTP触发端点的启动和关闭

use crate::app::components::Components;
use crate::config::Config;
use crate::health::{CheckJob, PolicyEvaluator, Scheduler, TaskScheduler};
use crate::web::{WebAppState, WebServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 服务启动器
pub struct ServiceLauncher;

impl ServiceLauncher {
    /// 应用命令行覆盖项
    pub fn apply_overrides(
        config: &mut Config,
        interval: Option<u64>,
        bind: Option<&str>,
        port: Option<u16>,
        no_web: bool,
    ) -> Result<()> {
        if let Some(interval) = interval {
            config.global.check_interval_seconds = interval;
        }
        if let Some(bind) = bind {
            config.web.bind_address = bind.to_string();
        }
        if let Some(port) = port {
            config.web.port = port;
        }
        if no_web {
            config.web.enabled = false;
        }

        crate::config::validate_config(config)
            .map_err(anyhow::Error::msg)
            .context("命令行参数无效")
    }

    /// 根据配置生成定时任务，已禁用的检测不会调度
    pub fn build_jobs(config: &Config, components: &Components) -> Vec<CheckJob> {
        let interval = Duration::from_secs(config.global.check_interval_seconds);
        let evaluator = PolicyEvaluator::new(components.threshold);
        let mut jobs = Vec::new();

        if config.runners.enabled {
            jobs.push(CheckJob {
                name: "runners".to_string(),
                check: Arc::clone(&components.runners),
                evaluator,
                interval,
                run_on_startup: config.global.run_on_startup,
            });
        }
        if config.vnet.enabled {
            jobs.push(CheckJob {
                name: "vnet-usage".to_string(),
                check: Arc::clone(&components.vnet),
                evaluator,
                interval,
                run_on_startup: config.global.run_on_startup,
            });
        }
        jobs
    }

    /// 运行服务直到收到关闭信号
    pub async fn run(config: Config) -> Result<()> {
        let components = Components::from_config(&config)?;

        let scheduler = TaskScheduler::new(Arc::clone(&components.sink));
        let jobs = Self::build_jobs(&config, &components);
        if jobs.is_empty() {
            warn!("所有检测均已禁用，只提供HTTP触发端点");
        }
        scheduler.start(jobs).await.context("启动任务调度器失败")?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut web_task = config.web.enabled.then(|| {
            let state = WebAppState::new(
                Arc::clone(&components.runners),
                Arc::clone(&components.vnet),
                Arc::clone(&components.sink),
                components.threshold,
            );
            tokio::spawn(WebServer::new(config.web.clone(), state).start(shutdown_tx.subscribe()))
        });

        let web_finished = async {
            match web_task.as_mut() {
                Some(task) => task.await,
                None => futures::future::pending().await,
            }
        };

        let early_exit = tokio::select! {
            _ = wait_for_shutdown_signal() => None,
            result = web_finished => Some(result),
        };

        info!("正在停止服务...");
        let _ = shutdown_tx.send(());
        scheduler.stop().await?;

        let web_result = match (early_exit, web_task) {
            (Some(result), _) => Some(result),
            (None, Some(task)) => Some(task.await),
            (None, None) => None,
        };
        if let Some(result) = web_result {
            result.context("Web服务器任务异常退出")??;
        }

        info!("服务已停止");
        Ok(())
    }
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("收到中断信号"),
                    _ = terminate.recv() => info!("收到终止信号"),
                }
            }
            Err(e) => {
                warn!("注册终止信号失败: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("收到中断信号");
    }
}
