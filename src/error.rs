use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 台账读写错误
    #[error("台账错误: {0}")]
    Ledger(#[from] LedgerError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回非成功状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 响应结构不符合预期
    #[error("API响应格式错误 ({endpoint}): {detail}")]
    MalformedResponse { endpoint: String, detail: String },
}

impl ApiError {
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn malformed(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::MalformedResponse {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }
}

/// 文字识别（长时任务）错误
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// 上传原始文件失败
    #[error("上传文件失败: {0}")]
    Upload(#[source] ApiError),
    /// 提交识别任务失败
    #[error("提交识别任务失败: {0}")]
    Submit(#[source] ApiError),
    /// 查询任务状态失败
    #[error("查询任务状态失败 (operation: {operation}): {source}")]
    Poll {
        operation: String,
        #[source]
        source: ApiError,
    },
    /// 任务自身报告失败
    #[error("识别任务失败 (operation: {operation}): {message}")]
    OperationFailed { operation: String, message: String },
    /// 超过轮询次数仍未完成
    #[error("识别任务超时 (operation: {operation}, 已轮询 {attempts} 次)")]
    Timeout { operation: String, attempts: u32 },
    /// 列出输出文件失败
    #[error("列出输出文件失败: {0}")]
    List(#[source] ApiError),
    /// 没有找到输出分片
    #[error("未找到输出文件 (document: {document_id})")]
    NoOutput { document_id: String },
    /// 所有分片都没有文本
    #[error("输出文件中没有文本内容 (document: {document_id})")]
    EmptyText { document_id: String },
}

/// 台账错误
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 读写文件失败
    #[error("读写台账文件失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("台账文件解析失败 ({path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 台账结构版本不匹配
    #[error("台账结构版本不匹配 ({path}): 期望 {expected}, 实际 {found}")]
    SchemaMismatch {
        path: String,
        expected: u32,
        found: u32,
    },
    /// 文档ID重复
    #[error("文档已存在于台账中: {0}")]
    DuplicateDocument(String),
    /// 找不到对应的行
    #[error("台账中不存在该文档: {0}")]
    RowNotFound(String),
    /// 找不到对应的错误记录
    #[error("错误记录不存在: #{0}")]
    ErrorRecordNotFound(usize),
}

/// 台账行状态迁移错误
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("文档 {document_id} 已推送，不能再变更状态")]
    AlreadyDelivered { document_id: String },
    #[error("文档 {document_id} 已登记推送任务，不能重复登记")]
    AlreadyScheduled { document_id: String },
    #[error("文档 {document_id} 尚未登记推送任务")]
    NotScheduled { document_id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必填配置项缺失
    #[error("缺少必填配置项: {0}")]
    Missing(&'static str),
    /// 配置值无法解析
    #[error("配置项 {field} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    Invalid {
        field: &'static str,
        value: String,
        expected_type: &'static str,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
