//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Runner Vitals - CI Runner 与虚拟网络用量巡检工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "runner-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "RUNNER_VITALS_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的级别
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "RUNNER_VITALS_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// 显式指定的配置文件路径
    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config.as_deref()
    }
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动定时检测和HTTP触发端点
    Serve {
        /// 检测间隔（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            help = "检测间隔（秒）",
            env = "RUNNER_VITALS_INTERVAL"
        )]
        interval: Option<u64>,

        /// 监听地址
        #[arg(long, value_name = "ADDR", help = "HTTP监听地址")]
        bind: Option<String>,

        /// 监听端口
        #[arg(short, long, value_name = "PORT", help = "HTTP监听端口")]
        port: Option<u16>,

        /// 不启动HTTP触发端点
        #[arg(long, help = "只运行定时检测")]
        no_web: bool,
    },

    /// 立即执行一次检测
    Check {
        /// 检测目标
        #[arg(value_enum)]
        target: CheckTarget,

        /// 用量阈值（百分比），仅对 vnet 生效
        #[arg(short, long, value_name = "PERCENT", help = "用量阈值（百分比）")]
        threshold: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 验证配置
    Validate {
        /// 显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },
}

/// 检测目标
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum CheckTarget {
    /// GitHub Runner 状态
    Runners,
    /// 虚拟网络地址用量
    Vnet,
}

/// 输出格式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}
