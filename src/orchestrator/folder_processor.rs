//! 文件夹处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **列出文件**：取最近 `lookback_days` 天内更新过的 PDF
//! 2. **逐个处理**：委托 `IngestFlow` 处理单个文档，失败不影响后续文档
//! 3. **登记扫描**：有新文档写入台账时，登记一次立即执行的扫描任务
//! 4. **统计输出**：返回并打印 `IngestStats`

use anyhow::Result;
use chrono::{Duration, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Handler;
use crate::services::{ErrorRecorder, SUBJECT_FOLDER, SUBJECT_TRIGGER};
use crate::traits::{ActionQueue, DocumentStore};
use crate::utils::logging::log_ingest_stats;
use crate::workflow::{IngestFlow, IngestOutcome};

/// 一次导入的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub listed: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 文件夹扫描参数
#[derive(Debug, Clone)]
pub struct FolderSettings {
    pub folder_id: String,
    pub mime_type: String,
    pub lookback_days: i64,
}

impl FolderSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            folder_id: config.folder_id()?.to_string(),
            mime_type: config.accepted_mime_type.clone(),
            lookback_days: config.lookback_days,
        })
    }
}

pub struct FolderProcessor {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn ActionQueue>,
    flow: IngestFlow,
    recorder: ErrorRecorder,
    settings: FolderSettings,
}

impl FolderProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: Arc<dyn ActionQueue>,
        flow: IngestFlow,
        recorder: ErrorRecorder,
        settings: FolderSettings,
    ) -> Self {
        Self {
            store,
            queue,
            flow,
            recorder,
            settings,
        }
    }

    /// 处理文件夹
    ///
    /// `now` 为本地时间，用于重要日期修正和扫描任务的触发时间。
    pub async fn process_folder(&self, now: NaiveDateTime) -> IngestStats {
        let mut stats = IngestStats::default();
        let since = Utc::now() - Duration::days(self.settings.lookback_days);

        info!("\n📁 正在扫描文件夹 {} ...", self.settings.folder_id);
        let documents = match self
            .store
            .list_modified_since(&self.settings.folder_id, &self.settings.mime_type, since)
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                let err = anyhow::Error::new(e).context("读取文件夹失败");
                self.recorder.record(SUBJECT_FOLDER, &err).await;
                return stats;
            }
        };

        stats.listed = documents.len();
        info!("✓ 找到 {} 个待处理的文件", stats.listed);

        let today = now.date();
        for (index, document) in documents.iter().enumerate() {
            info!(
                "\n[文件 {}/{}] {}",
                index + 1,
                stats.listed,
                document.name
            );
            match self.flow.run(document, today).await {
                IngestOutcome::Ingested => stats.ingested += 1,
                IngestOutcome::Skipped => stats.skipped += 1,
                IngestOutcome::Failed => stats.failed += 1,
            }
        }

        if stats.ingested > 0 {
            self.arm_sweep(now).await;
        }

        log_ingest_stats(stats.listed, stats.ingested, stats.skipped, stats.failed);
        stats
    }

    /// 登记一次立即执行的扫描任务（已有存活的扫描任务时不重复登记）
    async fn arm_sweep(&self, now: NaiveDateTime) {
        let result = async {
            if self.queue.has_live(Handler::Sweep).await? {
                info!("⏰ 扫描任务已存在，无需重复登记");
                return Ok(());
            }
            let id = self.queue.register_one_shot(now, Handler::Sweep).await?;
            info!("⏰ 已登记扫描任务: {}", id);
            Ok::<(), crate::error::LedgerError>(())
        }
        .await;

        if let Err(e) = result {
            warn!("⚠️ 登记扫描任务失败");
            let err = anyhow::Error::new(e).context("登记扫描任务失败");
            self.recorder.record(SUBJECT_TRIGGER, &err).await;
        }
    }
}
