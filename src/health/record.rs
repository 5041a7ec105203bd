//! 检测记录数据结构
//!
//! 定义原始条目、规范化记录、策略判定与检测周期结果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 外部接口返回的原始条目
pub type RawItem = serde_json::Map<String, serde_json::Value>;

/// 投递到日志摄取端点的一行数据
pub type Row = serde_json::Map<String, serde_json::Value>;

/// 记录时间戳格式：ISO-8601 UTC，微秒精度
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// 按约定格式渲染时间戳
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// 记录来源类型，决定下游的流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// CI runner 状态
    Runner,
    /// 虚拟网络地址用量
    VNetUsage,
}

impl SourceType {
    /// 记录在日志工作区中的表名
    pub fn table(&self) -> &'static str {
        match self {
            SourceType::Runner => "GHRunnerStatus_CL",
            SourceType::VNetUsage => "VNetUsage_CL",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Runner => write!(f, "runner"),
            SourceType::VNetUsage => write!(f, "vnet-usage"),
        }
    }
}

/// 记录字段的标量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 以浮点数读取数值字段
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Bool(b) => serde_json::Value::Bool(b),
            FieldValue::Int(i) => serde_json::Value::from(i),
            FieldValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Str(s) => serde_json::Value::String(s),
        }
    }
}

/// 规范化后的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// 规范化时刻
    pub timestamp: DateTime<Utc>,
    /// 来源条目标识
    pub source_id: String,
    /// 来源类型
    pub source_type: SourceType,
    /// 类型化字段，键为日志表列名
    pub fields: BTreeMap<String, FieldValue>,
    /// 组织名或资源范围
    pub scope: String,
}

impl NormalizedRecord {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }

    pub fn num_field(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(FieldValue::as_f64)
    }

    /// 记录的显示名称
    pub fn display_name(&self) -> &str {
        let column = match self.source_type {
            SourceType::Runner => "Name_s",
            SourceType::VNetUsage => "UsageName_s",
        };
        self.str_field(column).unwrap_or(&self.source_id)
    }

    /// 转换为摄取端点接收的扁平行
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(
            "TimeGenerated".to_string(),
            serde_json::Value::String(format_timestamp(&self.timestamp)),
        );
        for (key, value) in &self.fields {
            row.insert(key.clone(), value.clone().into());
        }
        row
    }
}

/// 策略判定结果
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyVerdict {
    /// 被判定的记录
    pub record: NormalizedRecord,
    /// 是否异常
    pub anomalous: bool,
    /// 异常原因
    pub reason: Option<String>,
    /// 用量百分比（仅用量记录）
    pub usage_pct: Option<f64>,
}

/// Runner 检测的汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSummary {
    pub total_runners: usize,
    pub offline_count: usize,
    pub offline_runners: Vec<String>,
    pub runner_statuses: Vec<Row>,
    pub timestamp: String,
}

/// 超过阈值的用量条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceededUsage {
    pub name: String,
    pub current_value: f64,
    pub limit: f64,
    pub usage_pct: f64,
}

/// 用量检测的汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_usages: usize,
    pub exceeded_count: usize,
    pub threshold_percentage: f64,
    pub threshold_exceeded: Vec<ExceededUsage>,
    pub vnet_usages: Vec<Row>,
    pub timestamp: String,
}

/// 检测周期的详细信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CycleDetails {
    Runners(RunnerSummary),
    Usage(UsageSummary),
}

/// 检测周期结果，HTTP 与定时触发共用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub success: bool,
    pub message: String,
    pub details: Option<CycleDetails>,
}

impl CycleResult {
    pub fn succeeded(message: impl Into<String>, details: CycleDetails) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
        }
    }
}
