//! 文档导入流程 - 流程层
//!
//! 核心职责：定义"一个文档"的完整处理流程
//!
//! 流程顺序：
//! 1. 台账去重
//! 2. 文件名加 `yymm_` 前缀（只改一次）
//! 3. 下载 → 文字识别 → 摘要 → 字段提取 → 推送日计算
//! 4. 追加一行 `Pending` 台账
//!
//! 第 2–4 步的任何失败都在这里被捕获并写入错误台账，不会中断整批处理。

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::models::{DocumentRef, LedgerRow, NewRow};
use crate::services::extractor;
use crate::services::{DeliveryRule, ErrorRecorder, RecognitionService, Summarizer};
use crate::traits::{DocumentStore, Ledger};
use crate::utils::logging::truncate_text;

/// 单个文档的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// 新写入台账
    Ingested,
    /// 已在台账中
    Skipped,
    /// 处理失败，已写入错误台账
    Failed,
}

/// 文档导入流程
///
/// - 编排单个文档的处理步骤
/// - 不持有任何文件列表
/// - 只依赖业务能力（services）和协作方接口（traits）
pub struct IngestFlow {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn Ledger>,
    recognition: RecognitionService,
    summarizer: Summarizer,
    recorder: ErrorRecorder,
    rule: DeliveryRule,
}

impl IngestFlow {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: Arc<dyn Ledger>,
        recognition: RecognitionService,
        summarizer: Summarizer,
        recorder: ErrorRecorder,
        rule: DeliveryRule,
    ) -> Self {
        Self {
            store,
            ledger,
            recognition,
            summarizer,
            recorder,
            rule,
        }
    }

    /// 处理一个文档
    ///
    /// `today` 用于修正重要日期。
    pub async fn run(&self, document: &DocumentRef, today: NaiveDate) -> IngestOutcome {
        match self.ledger.contains(&document.id).await {
            Ok(true) => {
                info!("[{}] ⏭️ 已在台账中，跳过", document.name);
                return IngestOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                let err = anyhow::Error::new(e).context("读取台账失败");
                self.recorder.record(&document.id, &err).await;
                return IngestOutcome::Failed;
            }
        }

        match self.ingest(document, today).await {
            Ok(row) => {
                info!(
                    "[{}] ✓ 已写入台账: {} | 重要日期 {} | 推送 {}",
                    row.document_name,
                    row.title,
                    row.key_date,
                    row.delivery_instant()
                );
                IngestOutcome::Ingested
            }
            Err(e) => {
                self.recorder.record(&document.id, &e).await;
                IngestOutcome::Failed
            }
        }
    }

    async fn ingest(&self, document: &DocumentRef, today: NaiveDate) -> Result<LedgerRow> {
        let document_name = self.ensure_prefixed(document).await?;

        info!("[{}] 📥 正在下载文件...", document_name);
        let content = self
            .store
            .get_content(document)
            .await
            .context("下载文件失败")?;
        debug!("[{}] 文件大小: {} 字节", document_name, content.len());

        info!("[{}] 🔍 正在识别文字...", document_name);
        let text = self
            .recognition
            .extract_text(&document.id, content)
            .await
            .context("文字识别失败")?;
        debug!("[{}] 识别文本: {}", document_name, truncate_text(&text, 80));

        info!("[{}] 🤖 正在生成摘要...", document_name);
        let formatted = self
            .summarizer
            .summarize(&text)
            .await
            .ok_or_else(|| anyhow!("摘要生成失败"))?;

        let fields = extractor::extract(&formatted, today);
        let delivery_date = self.rule.date_for(fields.key_date);

        let row = LedgerRow::new(NewRow {
            document_id: document.id.clone(),
            document_name,
            document_link: document.web_link(),
            title: fields.title,
            highlight: fields.highlight,
            free_summary: fields.summary,
            trend_tags: fields.trend_tags,
            key_date: fields.key_date,
            delivery_date,
            delivery_time: self.rule.time,
        });

        self.ledger
            .append(row.clone())
            .await
            .context("写入台账失败")?;

        Ok(row)
    }

    /// 返回处理后的文件名，必要时在云盘中重命名
    async fn ensure_prefixed(&self, document: &DocumentRef) -> Result<String> {
        let Some(new_name) = prefixed_name(&document.name, document.created_time) else {
            return Ok(document.name.clone());
        };

        self.store
            .rename(document, &new_name)
            .await
            .with_context(|| format!("重命名失败: {}", document.name))?;
        info!("✏️ 文件已重命名: {} → {}", document.name, new_name);
        Ok(new_name)
    }
}

/// 需要加前缀时返回新文件名，已经是 `dddd_` 开头则返回 `None`
///
/// 前缀取创建时间（本地时区）的 `yymm`。
pub fn prefixed_name(name: &str, created_time: DateTime<Utc>) -> Option<String> {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"^\d{4}_").expect("prefix pattern"));

    if prefix.is_match(name) {
        return None;
    }

    let yymm = created_time.with_timezone(&Local).format("%y%m");
    Some(format!("{}_{}", yymm, name))
}
