//! 策略判定
//!
//! Runner 状态不为 online 即异常；用量百分比严格大于阈值即异常。

use crate::error::ValidationError;
use crate::health::record::{NormalizedRecord, PolicyVerdict, SourceType};
use serde::{Deserialize, Serialize};

/// 默认用量阈值（百分比）
pub const DEFAULT_THRESHOLD_PERCENTAGE: f64 = 80.0;

/// 用量阈值，保证为有限的非负数
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Threshold(f64);

impl Threshold {
    /// 从数值构造阈值
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidThreshold(value.to_string()))
        }
    }

    /// 解析调用方提供的阈值参数
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let value: f64 = input
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidThreshold(input.to_string()))?;
        Self::new(value).map_err(|_| ValidationError::InvalidThreshold(input.to_string()))
    }

    /// 解析可选参数，缺失或为空时使用默认值
    pub fn parse_or(input: Option<&str>, default: Threshold) -> Result<Self, ValidationError> {
        match input.map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) => Self::parse(value),
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_PERCENTAGE)
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// 计算用量百分比
///
/// `limit` 不大于0时返回0。这会把无上限或未知上限视作0%用量，
/// 可能低估真实耗尽情况。
pub fn usage_percentage(current_value: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        current_value / limit * 100.0
    } else {
        0.0
    }
}

/// 策略判定器
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator {
    threshold: Threshold,
}

impl PolicyEvaluator {
    pub fn new(threshold: Threshold) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// 判定单条记录
    pub fn evaluate(&self, record: &NormalizedRecord) -> PolicyVerdict {
        match record.source_type {
            SourceType::Runner => self.evaluate_runner(record),
            SourceType::VNetUsage => self.evaluate_usage(record),
        }
    }

    fn evaluate_runner(&self, record: &NormalizedRecord) -> PolicyVerdict {
        let status = record.str_field("Status_s").unwrap_or_default();
        let anomalous = !status.eq_ignore_ascii_case("online");

        PolicyVerdict {
            record: record.clone(),
            anomalous,
            reason: anomalous.then(|| format!("runner status is {status:?}")),
            usage_pct: None,
        }
    }

    fn evaluate_usage(&self, record: &NormalizedRecord) -> PolicyVerdict {
        let current_value = record.num_field("CurrentValue_d").unwrap_or(0.0);
        let limit = record.num_field("Limit_d").unwrap_or(0.0);
        let usage_pct = usage_percentage(current_value, limit);
        let anomalous = usage_pct > self.threshold.value();

        PolicyVerdict {
            record: record.clone(),
            anomalous,
            reason: anomalous
                .then(|| format!("usage {usage_pct:.2}% exceeds threshold {}", self.threshold)),
            usage_pct: Some(usage_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::normalizer::{normalize, RecordScope};
    use chrono::Utc;
    use serde_json::json;

    fn runner(status: Option<&str>) -> NormalizedRecord {
        let mut item = json!({"id": 1, "name": "r1"});
        if let Some(status) = status {
            item["status"] = json!(status);
        }
        normalize(
            item.as_object().unwrap(),
            SourceType::Runner,
            &RecordScope::organization("acme", ""),
            Utc::now(),
        )
    }

    fn usage(current: f64, limit: f64) -> NormalizedRecord {
        let item = json!({"name": {"value": "SubnetSpace"}, "currentValue": current, "limit": limit});
        normalize(
            item.as_object().unwrap(),
            SourceType::VNetUsage,
            &RecordScope::virtual_network("s", "rg", "v"),
            Utc::now(),
        )
    }

    fn evaluator(threshold: f64) -> PolicyEvaluator {
        PolicyEvaluator::new(Threshold::new(threshold).unwrap())
    }

    #[test]
    fn test_runner_status_is_case_insensitive() {
        let evaluator = PolicyEvaluator::default();
        for status in ["online", "Online", "ONLINE"] {
            assert!(!evaluator.evaluate(&runner(Some(status))).anomalous, "{status}");
        }
    }

    #[test]
    fn test_runner_other_statuses_are_anomalous() {
        let evaluator = PolicyEvaluator::default();
        for status in ["offline", "", "busy", "online "] {
            let verdict = evaluator.evaluate(&runner(Some(status)));
            assert!(verdict.anomalous, "{status:?}");
            assert!(verdict.reason.is_some());
        }
        // 缺失状态默认为 unknown
        assert!(evaluator.evaluate(&runner(None)).anomalous);
    }

    #[test]
    fn test_usage_above_threshold_is_anomalous() {
        let verdict = evaluator(80.0).evaluate(&usage(85.0, 100.0));
        assert!(verdict.anomalous);
        assert_eq!(verdict.usage_pct, Some(85.0));

        let verdict = evaluator(90.0).evaluate(&usage(85.0, 100.0));
        assert!(!verdict.anomalous);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_usage_at_threshold_is_not_anomalous() {
        let verdict = evaluator(80.0).evaluate(&usage(80.0, 100.0));
        assert!(!verdict.anomalous);
        assert_eq!(verdict.usage_pct, Some(80.0));
    }

    #[test]
    fn test_zero_limit_is_never_anomalous() {
        for current in [0.0, 1.0, 1_000_000.0] {
            let verdict = evaluator(0.0).evaluate(&usage(current, 0.0));
            assert!(!verdict.anomalous);
            assert_eq!(verdict.usage_pct, Some(0.0));
        }
    }

    #[test]
    fn test_threshold_parse() {
        assert_eq!(Threshold::parse("90").unwrap().value(), 90.0);
        assert_eq!(Threshold::parse(" 12.5 ").unwrap().value(), 12.5);
        assert_eq!(Threshold::parse("0").unwrap().value(), 0.0);
        assert!(Threshold::parse("abc").is_err());
        assert!(Threshold::parse("-1").is_err());
        assert!(Threshold::parse("NaN").is_err());
        assert!(Threshold::parse("inf").is_err());
    }

    #[test]
    fn test_threshold_parse_or_default() {
        let default = Threshold::default();
        assert_eq!(Threshold::parse_or(None, default).unwrap(), default);
        assert_eq!(Threshold::parse_or(Some(""), default).unwrap(), default);
        assert_eq!(Threshold::parse_or(Some("95"), default).unwrap().value(), 95.0);
        assert!(Threshold::parse_or(Some("high"), default).is_err());
    }
}
