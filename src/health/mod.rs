//! 健康检测模块
//!
//! 提供检测项、记录规范化、策略判定、检测周期执行和任务调度功能

pub mod checker;
pub mod normalizer;
pub mod policy;
pub mod record;
pub mod reporter;
pub mod runner_check;
pub mod scheduler;
pub mod vnet_check;

// 重新导出主要类型
pub use checker::{build_http_client, HealthCheck};
pub use normalizer::{normalize, RecordScope};
pub use policy::{PolicyEvaluator, Threshold};
pub use record::{CycleDetails, CycleResult, NormalizedRecord, PolicyVerdict, SourceType};
pub use reporter::{CyclePhase, Reporter};
pub use runner_check::RunnerCheck;
pub use scheduler::{CheckJob, Scheduler, TaskScheduler};
pub use vnet_check::VnetUsageCheck;
