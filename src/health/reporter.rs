//! 检测周期执行器
//!
//! 一次检测周期依次完成：配置校验、拉取、规范化与判定、投递、汇总。
//! 周期内的所有错误（包括 panic）只在这里被转换为 `CycleResult`。

use crate::error::{ConfigError, RunnerVitalsError};
use crate::health::checker::HealthCheck;
use crate::health::normalizer::normalize;
use crate::health::policy::PolicyEvaluator;
use crate::health::record::{
    format_timestamp, CycleDetails, CycleResult, ExceededUsage, PolicyVerdict, Row,
    RunnerSummary, SourceType, UsageSummary,
};
use crate::sink::{LogSink, UploadFailure};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 记录遥测事件使用的日志目标
pub const TELEMETRY_TARGET: &str = "runner_vitals::telemetry";

/// 检测周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Init,
    Validating,
    Fetching,
    Evaluating,
    Delivering,
    Done,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CyclePhase::Init => "init",
            CyclePhase::Validating => "validating",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Evaluating => "evaluating",
            CyclePhase::Delivering => "delivering",
            CyclePhase::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// 检测周期执行器
pub struct Reporter;

impl Reporter {
    /// 执行一次检测周期
    ///
    /// # 参数
    /// * `check` - 检测项
    /// * `evaluator` - 策略判定器
    /// * `sink` - 日志投递器
    ///
    /// # 返回
    /// * `CycleResult` - 周期结果，从不返回错误
    pub async fn run_cycle(
        check: &dyn HealthCheck,
        evaluator: &PolicyEvaluator,
        sink: &dyn LogSink,
    ) -> CycleResult {
        let cycle_id = Uuid::new_v4();
        let source_type = check.source_type();
        transition(cycle_id, source_type, CyclePhase::Init);

        let outcome = AssertUnwindSafe(Self::execute(cycle_id, check, evaluator, sink))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!(cycle = %cycle_id, "检测周期提前结束: {}", e);
                CycleResult::failed(failure_message(&e))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(cycle = %cycle_id, "检测周期发生 panic: {}", reason);
                CycleResult::failed(format!("Error: {reason}"))
            }
        }
    }

    async fn execute(
        cycle_id: Uuid,
        check: &dyn HealthCheck,
        evaluator: &PolicyEvaluator,
        sink: &dyn LogSink,
    ) -> Result<CycleResult, RunnerVitalsError> {
        let source_type = check.source_type();

        transition(cycle_id, source_type, CyclePhase::Validating);
        let missing = check.missing_settings();
        if !missing.is_empty() {
            return Err(ConfigError::MissingSettings {
                keys: missing.into_iter().map(str::to_string).collect(),
            }
            .into());
        }

        transition(cycle_id, source_type, CyclePhase::Fetching);
        let raw_items = check.fetch().await?;
        debug!(cycle = %cycle_id, "{} 拉取到 {} 条原始条目", check.api_name(), raw_items.len());

        transition(cycle_id, source_type, CyclePhase::Evaluating);
        let scope = check.scope();
        let mut verdicts = Vec::with_capacity(raw_items.len());
        let mut rows = Vec::with_capacity(raw_items.len());
        for item in &raw_items {
            let record = normalize(item, source_type, &scope, Utc::now());
            let verdict = evaluator.evaluate(&record);
            let row = record.to_row();
            emit_record(cycle_id, &verdict, &row);
            verdicts.push(verdict);
            rows.push(row);
        }

        transition(cycle_id, source_type, CyclePhase::Delivering);
        deliver(cycle_id, check.stream_name(), &rows, sink).await;

        let result = summarize(source_type, evaluator, &verdicts, rows);
        transition(cycle_id, source_type, CyclePhase::Done);
        Ok(result)
    }
}

fn transition(cycle_id: Uuid, source_type: SourceType, phase: CyclePhase) {
    debug!(cycle = %cycle_id, source_type = %source_type, phase = %phase, "检测周期阶段切换");
}

/// 把单条记录作为结构化事件输出，异常记录使用 error 级别
fn emit_record(cycle_id: Uuid, verdict: &PolicyVerdict, row: &Row) {
    let record = &verdict.record;
    let payload = serde_json::Value::Object(row.clone());
    if verdict.anomalous {
        error!(
            target: TELEMETRY_TARGET,
            cycle = %cycle_id,
            source_type = %record.source_type,
            source_id = %record.source_id,
            scope = %record.scope,
            reason = verdict.reason.as_deref().unwrap_or_default(),
            record = %payload,
            "异常记录: {}",
            record.display_name()
        );
    } else {
        info!(
            target: TELEMETRY_TARGET,
            cycle = %cycle_id,
            source_type = %record.source_type,
            source_id = %record.source_id,
            scope = %record.scope,
            record = %payload,
            "记录: {}",
            record.display_name()
        );
    }
}

/// 投递整批记录，投递失败只记录日志
async fn deliver(cycle_id: Uuid, stream: &str, rows: &[Row], sink: &dyn LogSink) {
    let mut on_error = |failure: &UploadFailure| {
        error!(
            cycle = %cycle_id,
            stream = stream,
            failed = failure.failed_logs.len(),
            "部分记录投递失败: {}",
            failure.error
        );
    };

    match sink.upload(stream, rows, &mut on_error).await {
        Ok(outcome) if outcome.is_complete() => {
            debug!(cycle = %cycle_id, "投递完成: {} ({} 条)", stream, outcome.attempted);
        }
        Ok(outcome) => {
            warn!(
                cycle = %cycle_id,
                "投递部分失败: {}，{} 条中 {} 条被拒绝",
                stream,
                outcome.attempted,
                outcome.failed_logs.len()
            );
        }
        Err(e) => {
            error!(cycle = %cycle_id, "投递失败: {} - {}", stream, e);
        }
    }
}

fn summarize(
    source_type: SourceType,
    evaluator: &PolicyEvaluator,
    verdicts: &[PolicyVerdict],
    rows: Vec<Row>,
) -> CycleResult {
    let timestamp = format_timestamp(&Utc::now());
    let anomalies: Vec<&PolicyVerdict> = verdicts.iter().filter(|v| v.anomalous).collect();

    match source_type {
        SourceType::Runner => {
            let offline_runners: Vec<String> = anomalies
                .iter()
                .map(|v| v.record.display_name().to_string())
                .collect();
            let message = if offline_runners.is_empty() {
                "All runners online".to_string()
            } else {
                format!("Found {} offline runners", offline_runners.len())
            };
            CycleResult::succeeded(
                message,
                CycleDetails::Runners(RunnerSummary {
                    total_runners: verdicts.len(),
                    offline_count: offline_runners.len(),
                    offline_runners,
                    runner_statuses: rows,
                    timestamp,
                }),
            )
        }
        SourceType::VNetUsage => {
            let threshold_exceeded: Vec<ExceededUsage> = anomalies
                .iter()
                .map(|v| ExceededUsage {
                    name: v.record.display_name().to_string(),
                    current_value: v.record.num_field("CurrentValue_d").unwrap_or(0.0),
                    limit: v.record.num_field("Limit_d").unwrap_or(0.0),
                    usage_pct: v.usage_pct.unwrap_or(0.0),
                })
                .collect();
            let message = if threshold_exceeded.is_empty() {
                "All VNet usages are within threshold.".to_string()
            } else {
                format!("Threshold exceeded for {} usage(s).", threshold_exceeded.len())
            };
            CycleResult::succeeded(
                message,
                CycleDetails::Usage(UsageSummary {
                    total_usages: verdicts.len(),
                    exceeded_count: threshold_exceeded.len(),
                    threshold_percentage: evaluator.threshold().value(),
                    threshold_exceeded,
                    vnet_usages: rows,
                    timestamp,
                }),
            )
        }
    }
}

/// 配置与拉取错误直接使用其描述，其余错误统一加前缀
fn failure_message(error: &RunnerVitalsError) -> String {
    match error {
        RunnerVitalsError::Config(e) => e.to_string(),
        RunnerVitalsError::Fetch(e) => e.to_string(),
        other => format!("Error: {other}"),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
