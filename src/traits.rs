//! 外部协作方接口
//!
//! 核心流程只依赖这些 trait，具体实现在 `clients/`、`services/` 和
//! `infrastructure/` 中，测试时可以替换为内存实现。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::error::{ApiError, LedgerError};
use crate::models::{
    ActionId, DocumentRef, ErrorRecord, Handler, LedgerRow, ScheduledAction, TriageStatus,
};

/// 文档来源（云盘文件夹）
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_modified_since(
        &self,
        folder_id: &str,
        mime_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DocumentRef>, ApiError>;

    async fn get_content(&self, document: &DocumentRef) -> Result<Vec<u8>, ApiError>;

    async fn rename(&self, document: &DocumentRef, new_name: &str) -> Result<(), ApiError>;
}

/// 长时识别任务的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStatus {
    pub done: bool,
    /// 任务完成但报告了错误
    pub error: Option<String>,
}

/// 文字识别任务的传输层：对象存储 + 异步批量识别
#[async_trait]
pub trait RecognitionTransport: Send + Sync {
    /// 上传文件，返回对象 URI
    async fn upload(
        &self,
        object_name: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, ApiError>;

    /// 提交异步识别任务，返回 operation ID
    async fn submit(
        &self,
        input_uri: &str,
        mime_type: &str,
        output_prefix: &str,
    ) -> Result<String, ApiError>;

    async fn poll(&self, operation_id: &str) -> Result<OperationStatus, ApiError>;

    /// 按前缀列出对象名，保持服务端返回的顺序
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, ApiError>;

    async fn fetch_object(&self, name: &str) -> Result<JsonValue, ApiError>;

    /// 对象存储中的 URI 前缀，例如 `gs://bucket`
    fn object_uri(&self, object_name: &str) -> String;
}

/// 生成式文本服务
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// 消息推送
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn broadcast(&self, text: &str) -> Result<(), ApiError>;
}

/// 持久化的一次性延迟任务队列
#[async_trait]
pub trait ActionQueue: Send + Sync {
    async fn register_one_shot(
        &self,
        fire_at: NaiveDateTime,
        handler: Handler,
    ) -> Result<ActionId, LedgerError>;

    /// 返回是否真的删除了任务
    async fn cancel(&self, id: &ActionId) -> Result<bool, LedgerError>;

    async fn is_live(&self, id: &ActionId) -> Result<bool, LedgerError>;

    async fn has_live(&self, handler: Handler) -> Result<bool, LedgerError>;

    /// 到期任务，按触发时间排序
    async fn due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledAction>, LedgerError>;
}

/// 处理结果台账
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn contains(&self, document_id: &str) -> Result<bool, LedgerError>;

    /// 追加新行，文档ID重复时报错
    async fn append(&self, row: LedgerRow) -> Result<(), LedgerError>;

    /// 按写入顺序返回所有行
    async fn rows(&self) -> Result<Vec<LedgerRow>, LedgerError>;

    /// 按文档ID整行替换
    async fn update(&self, row: &LedgerRow) -> Result<(), LedgerError>;
}

/// 错误台账（只追加）
#[async_trait]
pub trait ErrorLedger: Send + Sync {
    async fn record(&self, record: ErrorRecord) -> Result<(), LedgerError>;

    /// 返回 (序号, 记录)，可按主体过滤
    async fn errors(&self, subject: Option<&str>)
        -> Result<Vec<(usize, ErrorRecord)>, LedgerError>;

    async fn set_status(&self, index: usize, status: TriageStatus) -> Result<(), LedgerError>;
}
