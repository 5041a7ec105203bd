//! 记录规范化
//!
//! 把外部接口返回的原始条目映射为固定结构的 `NormalizedRecord`。
//! 规范化是全函数：缺失字段使用约定的默认值而不是报错。

use crate::health::policy::usage_percentage;
use crate::health::record::{FieldValue, NormalizedRecord, RawItem, SourceType};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

const UNKNOWN: &str = "unknown";

/// 记录所属范围
///
/// `id` 写入 `NormalizedRecord::scope`，`columns` 作为常量列附加到每条记录。
#[derive(Debug, Clone, PartialEq)]
pub struct RecordScope {
    pub id: String,
    pub columns: Vec<(String, String)>,
}

impl RecordScope {
    /// GitHub 组织范围
    pub fn organization(org: &str, computer: &str) -> Self {
        Self {
            id: org.to_string(),
            columns: vec![
                ("Organization_s".to_string(), org.to_string()),
                ("Computer".to_string(), computer.to_string()),
            ],
        }
    }

    /// 虚拟网络范围
    pub fn virtual_network(subscription_id: &str, resource_group: &str, vnet_name: &str) -> Self {
        Self {
            id: format!(
                "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Network/virtualNetworks/{vnet_name}"
            ),
            columns: vec![
                ("SubscriptionId_s".to_string(), subscription_id.to_string()),
                ("ResourceGroupName_s".to_string(), resource_group.to_string()),
                ("VNetName_s".to_string(), vnet_name.to_string()),
            ],
        }
    }
}

/// 规范化单个原始条目
///
/// # 参数
/// * `raw` - 原始条目
/// * `source_type` - 来源类型
/// * `scope` - 记录所属范围
/// * `now` - 规范化时刻，由调用方注入
pub fn normalize(
    raw: &RawItem,
    source_type: SourceType,
    scope: &RecordScope,
    now: DateTime<Utc>,
) -> NormalizedRecord {
    let mut fields = match source_type {
        SourceType::Runner => runner_fields(raw),
        SourceType::VNetUsage => usage_fields(raw),
    };

    for (column, value) in &scope.columns {
        fields.insert(column.clone(), FieldValue::Str(value.clone()));
    }

    let source_id = match source_type {
        SourceType::Runner => id_string(raw.get("id")),
        SourceType::VNetUsage => usage_name(raw),
    };

    NormalizedRecord {
        timestamp: now,
        source_id,
        source_type,
        fields,
        scope: scope.id.clone(),
    }
}

fn runner_fields(raw: &RawItem) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    fields.insert("RunnerId_s".to_string(), FieldValue::Str(id_string(raw.get("id"))));
    fields.insert("Name_s".to_string(), FieldValue::Str(string_or_unknown(raw.get("name"))));
    fields.insert("Status_s".to_string(), FieldValue::Str(string_or_unknown(raw.get("status"))));
    fields.insert("OS_s".to_string(), FieldValue::Str(string_or_unknown(raw.get("os"))));
    fields.insert(
        "Busy_b".to_string(),
        FieldValue::Bool(raw.get("busy").and_then(Value::as_bool).unwrap_or(false)),
    );
    let labels = raw
        .get("labels")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    fields.insert("Labels_s".to_string(), FieldValue::Str(labels.to_string()));
    fields
}

fn usage_fields(raw: &RawItem) -> BTreeMap<String, FieldValue> {
    let current_value = number(raw.get("currentValue"));
    let limit = number(raw.get("limit"));
    let unit = raw
        .get("unit")
        .and_then(Value::as_str)
        .unwrap_or("Count")
        .to_string();

    let mut fields = BTreeMap::new();
    fields.insert("UsageName_s".to_string(), FieldValue::Str(usage_name(raw)));
    fields.insert("CurrentValue_d".to_string(), FieldValue::Float(current_value));
    fields.insert("Limit_d".to_string(), FieldValue::Float(limit));
    fields.insert("Unit_s".to_string(), FieldValue::Str(unit));
    fields.insert(
        "UsagePct_d".to_string(),
        FieldValue::Float(usage_percentage(current_value, limit)),
    );
    fields
}

/// 用量名称：ARM 返回 `{"value": .., "localizedValue": ..}`，也兼容纯字符串
fn usage_name(raw: &RawItem) -> String {
    match raw.get("name") {
        Some(Value::Object(name)) => name
            .get("value")
            .or_else(|| name.get("localizedValue"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN)
            .to_string(),
        Some(Value::String(name)) => name.clone(),
        _ => UNKNOWN.to_string(),
    }
}

fn string_or_unknown(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// 标识可能是数字也可能是字符串，缺失时为 `unknown`
fn id_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}
