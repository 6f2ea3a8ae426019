//! 错误记录服务 - 业务能力层
//!
//! 只负责"写错误台账"能力，不关心流程

use std::sync::Arc;
use tracing::error;

use crate::models::ErrorRecord;
use crate::traits::ErrorLedger;

/// 列表读取失败时使用的主体
pub const SUBJECT_FOLDER: &str = "FOLDER";
/// 推送失败时使用的主体
pub const SUBJECT_SEND_MESSAGE: &str = "SEND_MESSAGE";
/// 登记扫描任务失败时使用的主体
pub const SUBJECT_TRIGGER: &str = "TRIGGER";

/// 错误记录服务
///
/// 写入失败只打日志，绝不向调用方传播。
#[derive(Clone)]
pub struct ErrorRecorder {
    ledger: Arc<dyn ErrorLedger>,
}

impl ErrorRecorder {
    pub fn new(ledger: Arc<dyn ErrorLedger>) -> Self {
        Self { ledger }
    }

    /// 记录一个错误，`trace` 为完整的错误链
    pub async fn record(&self, subject: &str, err: &anyhow::Error) {
        let message = err.to_string();
        let trace = format!("{:#}", err);
        let trace = (trace != message).then_some(trace);
        self.write(ErrorRecord::new(subject, message, trace)).await;
    }

    async fn write(&self, record: ErrorRecord) {
        error!("❌ [{}] {}", record.subject, record.message);
        if let Err(e) = self.ledger.record(record).await {
            error!("写入错误台账失败: {}", e);
        }
    }
}
