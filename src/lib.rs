//! Runner Vitals - CI Runner 与虚拟网络用量巡检工具
//!
//! 定时或按需执行检测周期：
//! - 拉取 GitHub 组织 Runner 状态与虚拟网络地址用量
//! - 规范化为固定结构的记录并按策略判定异常
//! - 投递到 Azure Monitor 日志摄取端点
//! - 通过HTTP端点返回周期结果

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod secrets;
pub mod sink;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig};
pub use error::RunnerVitalsError;
pub use health::{CycleResult, HealthCheck, PolicyEvaluator, Reporter};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
