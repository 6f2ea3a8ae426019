//! 文字识别服务 - 业务能力层
//!
//! 把一个 PDF 交给长时识别任务：上传 → 提交 → 有限次轮询 → 汇总所有输出分片。
//! 只处理单个文档，不关心台账。

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RecognitionError;
use crate::traits::RecognitionTransport;

/// 分片文本之间的分隔符
pub const SHARD_SEPARATOR: &str = "\n";

/// 轮询策略
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.poll_attempts.max(1),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 6,
        }
    }
}

pub struct RecognitionService {
    transport: Arc<dyn RecognitionTransport>,
    policy: PollPolicy,
    mime_type: String,
}

impl RecognitionService {
    pub fn new(transport: Arc<dyn RecognitionTransport>, policy: PollPolicy, mime_type: impl Into<String>) -> Self {
        Self {
            transport,
            policy,
            mime_type: mime_type.into(),
        }
    }

    /// 识别文档全文
    pub async fn extract_text(&self, document_id: &str, content: Vec<u8>) -> Result<String, RecognitionError> {
        let input_uri = self
            .transport
            .upload(&input_object_name(document_id), content, &self.mime_type)
            .await
            .map_err(RecognitionError::Upload)?;
        debug!("[{}] 已上传: {}", document_id, input_uri);

        let output_prefix = self.transport.object_uri(&output_prefix(document_id));
        let operation = self
            .transport
            .submit(&input_uri, &self.mime_type, &output_prefix)
            .await
            .map_err(RecognitionError::Submit)?;
        info!("[{}] 🔍 识别任务已提交: {}", document_id, operation);

        self.wait_for_operation(&operation).await?;
        self.collect_output(document_id).await
    }

    /// 有限次轮询，超过次数返回 `Timeout`
    async fn wait_for_operation(&self, operation: &str) -> Result<(), RecognitionError> {
        for attempt in 1..=self.policy.max_attempts {
            let status = self
                .transport
                .poll(operation)
                .await
                .map_err(|source| RecognitionError::Poll {
                    operation: operation.to_string(),
                    source,
                })?;

            if status.done {
                if let Some(message) = status.error {
                    return Err(RecognitionError::OperationFailed {
                        operation: operation.to_string(),
                        message,
                    });
                }
                debug!("识别任务完成 (第 {} 次轮询)", attempt);
                return Ok(());
            }

            debug!(
                "识别任务进行中 ({}/{})",
                attempt, self.policy.max_attempts
            );
            if attempt < self.policy.max_attempts {
                sleep(self.policy.interval).await;
            }
        }

        Err(RecognitionError::Timeout {
            operation: operation.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    /// 按发现顺序读取所有输出分片并拼接文本
    async fn collect_output(&self, document_id: &str) -> Result<String, RecognitionError> {
        let prefix = output_prefix(document_id);
        let names = self
            .transport
            .list_objects(&prefix)
            .await
            .map_err(RecognitionError::List)?;

        let shards: Vec<String> = names
            .into_iter()
            .filter(|name| is_shard(&prefix, name))
            .collect();

        if shards.is_empty() {
            return Err(RecognitionError::NoOutput {
                document_id: document_id.to_string(),
            });
        }
        debug!("[{}] 找到 {} 个输出分片", document_id, shards.len());

        let mut texts = Vec::with_capacity(shards.len());
        for shard in &shards {
            match self.transport.fetch_object(shard).await {
                Ok(json) => match shard_text(&json) {
                    Some(text) => texts.push(text),
                    None => warn!("分片 {} 中没有文本", shard),
                },
                Err(e) => warn!("读取分片 {} 失败: {}", shard, e),
            }
        }

        if texts.is_empty() {
            return Err(RecognitionError::EmptyText {
                document_id: document_id.to_string(),
            });
        }

        Ok(texts.join(SHARD_SEPARATOR))
    }
}

fn input_object_name(document_id: &str) -> String {
    format!("{}.pdf", document_id)
}

fn output_prefix(document_id: &str) -> String {
    format!("{}-output", document_id)
}

/// 输出分片：`{id}-output*.json`
fn is_shard(prefix: &str, name: &str) -> bool {
    name.starts_with(prefix) && name.ends_with(".json")
}

/// 取出分片中所有 `responses[*].fullTextAnnotation.text`
fn shard_text(json: &JsonValue) -> Option<String> {
    let texts: Vec<&str> = json
        .get("responses")?
        .as_array()?
        .iter()
        .filter_map(|r| r.pointer("/fullTextAnnotation/text").and_then(|t| t.as_str()))
        .filter(|t| !t.is_empty())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join(SHARD_SEPARATOR))
    }
}
