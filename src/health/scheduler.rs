//! 任务调度器模块
//!
//! 每种检测项运行在独立的定时任务中，按固定间隔调用 `Reporter`，
//! 并负责输出每个周期的最终日志。

use crate::health::checker::HealthCheck;
use crate::health::policy::PolicyEvaluator;
use crate::health::record::CycleResult;
use crate::health::reporter::Reporter;
use crate::sink::LogSink;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 触发时刻晚于计划时刻超过该值时视为延迟
const PAST_DUE_TOLERANCE: Duration = Duration::from_secs(1);

/// 一个定时检测任务
#[derive(Clone)]
pub struct CheckJob {
    /// 任务名称
    pub name: String,
    /// 检测项
    pub check: Arc<dyn HealthCheck>,
    /// 策略判定器
    pub evaluator: PolicyEvaluator,
    /// 检测间隔
    pub interval: Duration,
    /// 启动时是否立即执行
    pub run_on_startup: bool,
}

/// 调度器状态
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// 运行中的任务数量
    pub running_tasks: usize,
    /// 调度器是否运行中
    pub is_running: bool,
    /// 已完成的周期数
    pub completed_cycles: u64,
    /// 失败的周期数
    pub failed_cycles: u64,
    /// 最后更新时间
    pub last_update: Instant,
}

/// 任务调度器trait，定义调度接口
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// 启动调度器
    ///
    /// # 参数
    /// * `jobs` - 检测任务列表
    async fn start(&self, jobs: Vec<CheckJob>) -> Result<()>;

    /// 停止调度器
    async fn stop(&self) -> Result<()>;

    /// 获取调度器状态
    async fn get_status(&self) -> SchedulerStatus;
}

/// 任务调度器实现
pub struct TaskScheduler {
    /// 日志投递器
    sink: Arc<dyn LogSink>,
    /// 运行中的任务
    tasks: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
    /// 调度器状态
    status: Arc<RwLock<SchedulerStatus>>,
}

impl TaskScheduler {
    /// 创建新的任务调度器
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        let status = SchedulerStatus {
            running_tasks: 0,
            is_running: false,
            completed_cycles: 0,
            failed_cycles: 0,
            last_update: Instant::now(),
        };

        Self {
            sink,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            status: Arc::new(RwLock::new(status)),
        }
    }

    /// 启动单个检测任务
    async fn start_job(&self, job: CheckJob) {
        let name = job.name.clone();
        let sink = Arc::clone(&self.sink);
        let status = Arc::clone(&self.status);

        let task = tokio::spawn(async move {
            let period = job.interval.max(Duration::from_millis(1));
            let start = if job.run_on_startup {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("启动检测任务: {}，间隔 {:?}", job.name, period);

            loop {
                let scheduled = ticker.tick().await;
                if scheduled.elapsed() > PAST_DUE_TOLERANCE {
                    warn!("检测任务已延迟: {} ({:?})", job.name, scheduled.elapsed());
                }

                debug!("开始检测周期: {}", job.name);
                let result =
                    Reporter::run_cycle(job.check.as_ref(), &job.evaluator, sink.as_ref()).await;
                log_cycle_result(&job.name, &result);

                let mut status = status.write().await;
                status.completed_cycles += 1;
                if !result.success {
                    status.failed_cycles += 1;
                }
                status.last_update = Instant::now();
            }
        });

        let mut tasks = self.tasks.write().await;
        if let Some(previous) = tasks.insert(name.clone(), task) {
            previous.abort();
            debug!("替换已存在的检测任务: {}", name);
        }
    }

    /// 更新调度器状态
    async fn update_status(&self) {
        let tasks = self.tasks.read().await;
        let mut status = self.status.write().await;

        status.running_tasks = tasks.len();
        status.last_update = Instant::now();
    }
}

/// 输出周期的最终日志，失败使用 error 级别
fn log_cycle_result(name: &str, result: &CycleResult) {
    if result.success {
        info!("检测周期完成: {} - {}", name, result.message);
    } else {
        error!("检测周期失败: {} - {}", name, result.message);
    }
}

#[async_trait]
impl Scheduler for TaskScheduler {
    async fn start(&self, jobs: Vec<CheckJob>) -> Result<()> {
        info!("启动任务调度器，任务数量: {}", jobs.len());

        for job in jobs {
            self.start_job(job).await;
        }

        {
            let mut status = self.status.write().await;
            status.is_running = true;
        }
        self.update_status().await;
        info!("任务调度器启动完成");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("停止任务调度器");

        let mut tasks = self.tasks.write().await;
        for (name, task) in tasks.drain() {
            task.abort();
            debug!("停止任务: {}", name);
        }

        let mut status = self.status.write().await;
        status.is_running = false;
        status.running_tasks = 0;

        info!("任务调度器已停止");
        Ok(())
    }

    async fn get_status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }
}
