//! 日志投递模块
//!
//! 把一批规范化记录投递到日志摄取端点。部分失败通过回调上报，
//! 不会中断其余批次的投递。

pub mod ingestion;

pub use ingestion::LogsIngestionSink;

use crate::error::DeliveryError;
use crate::health::record::Row;
use async_trait::async_trait;
use tracing::warn;

/// 一次被拒绝的上传
#[derive(Debug, Clone)]
pub struct UploadFailure {
    /// 被拒绝的记录
    pub failed_logs: Vec<Row>,
    /// 错误描述
    pub error: String,
}

/// 部分失败回调
pub type OnUploadError<'a> = dyn FnMut(&UploadFailure) + Send + 'a;

/// 投递结果
#[derive(Debug, Clone, Default)]
pub struct DeliveryOutcome {
    /// 提交的记录数
    pub attempted: usize,
    /// 被拒绝的记录，保持提交顺序
    pub failed_logs: Vec<Row>,
    /// 每个失败批次的错误描述
    pub errors: Vec<String>,
}

impl DeliveryOutcome {
    /// 所有记录都被接受
    pub fn is_complete(&self) -> bool {
        self.failed_logs.is_empty() && self.errors.is_empty()
    }

    /// 记录一次失败并通知回调
    pub fn record_failure(&mut self, failure: UploadFailure, on_error: &mut OnUploadError<'_>) {
        on_error(&failure);
        self.failed_logs.extend(failure.failed_logs);
        self.errors.push(failure.error);
    }
}

/// 日志投递trait
#[async_trait]
pub trait LogSink: Send + Sync {
    /// 投递一批记录
    ///
    /// # 参数
    /// * `stream` - 目标流名
    /// * `rows` - 记录行
    /// * `on_error` - 部分失败回调，接收被拒绝的记录和错误描述
    ///
    /// # 返回
    /// * `Ok(DeliveryOutcome)` - 投递完成（可能包含部分失败）
    /// * `Err(DeliveryError)` - 端点完全不可用
    async fn upload(
        &self,
        stream: &str,
        rows: &[Row],
        on_error: &mut OnUploadError<'_>,
    ) -> Result<DeliveryOutcome, DeliveryError>;
}

/// 未配置摄取端点时使用的空实现
pub struct NoOpSink;

#[async_trait]
impl LogSink for NoOpSink {
    async fn upload(
        &self,
        stream: &str,
        rows: &[Row],
        _on_error: &mut OnUploadError<'_>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        warn!("日志摄取端点未配置，跳过投递: {} ({} 条)", stream, rows.len());
        Ok(DeliveryOutcome {
            attempted: rows.len(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink_accepts_everything() {
        let rows = vec![Row::new(), Row::new()];
        let mut calls = 0;
        let outcome = NoOpSink
            .upload("Custom-Test_CL", &rows, &mut |_| calls += 1)
            .await
            .unwrap();
        assert_eq!(outcome.attempted, 2);
        assert!(outcome.is_complete());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_record_failure_invokes_callback() {
        let mut outcome = DeliveryOutcome::default();
        let mut seen = Vec::new();
        let mut row = Row::new();
        row.insert("Name_s".to_string(), "r1".into());

        outcome.record_failure(
            UploadFailure {
                failed_logs: vec![row],
                error: "status 400".to_string(),
            },
            &mut |failure| seen.push(failure.error.clone()),
        );

        assert_eq!(seen, vec!["status 400".to_string()]);
        assert_eq!(outcome.failed_logs.len(), 1);
        assert!(!outcome.is_complete());
    }
}
