//! 应用程序核心模块
//!
//! 包含主函数、命令执行和应用程序生命周期管理

pub mod components;
pub mod service;

pub use components::Components;
pub use service::ServiceLauncher;

use crate::cli::args::{Args, Commands};
use crate::cli::commands::{CheckCommand, Command, ServeCommand, ValidateCommand};
use crate::config::{load_config, Config, SystemEnvironment};
use crate::logging::{parse_level, LogConfig, LoggingSystem};
use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use tracing::{debug, error, info};

/// 应用程序主函数
pub async fn main() -> Result<()> {
    let args = Args::parse();

    // 配置加载失败时仍需要日志输出错误
    let loaded = load_config(args.config_path(), &SystemEnvironment).await;

    let level = match (args.log_level, &loaded) {
        (Some(level), _) => level.into(),
        (None, Ok(config)) => parse_level(&config.global.log_level).unwrap_or(LevelFilter::Info),
        (None, Err(_)) => LevelFilter::Info,
    };
    let log_config = LogConfig {
        level,
        json_format: args.json_logs,
        ..Default::default()
    };
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Runner Vitals v{} 启动", crate::VERSION);

    let config = match loaded {
        Ok(config) => {
            debug!("存储连接串来源: {}", Config::storage_source(&SystemEnvironment));
            config
        }
        Err(e) => {
            error!("加载配置失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_command(&args, &config).await {
        error!("命令执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
pub async fn execute_command(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Commands::Serve { .. } => ServeCommand.execute(args, config).await,
        Commands::Check { .. } => CheckCommand.execute(args, config).await,
        Commands::Validate { .. } => ValidateCommand.execute(args, config).await,
    }
}
