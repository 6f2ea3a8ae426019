//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **资源初始化**：打开台账文件和任务队列文件
//! 2. **组件装配**：按子命令需要创建客户端和服务，缺少必填配置时返回 `ConfigError`
//! 3. **入口函数**：`ingest` / `sweep` / `fire` / `dispatch` / `requeue` / 错误台账维护
//! 4. **常驻模式**：按配置的间隔循环执行导入、扫描和分发

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::clients::{DriveClient, LineClient, VisionClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ApiClient, FileActionQueue, FileLedger};
use crate::models::{ActionId, ErrorRecord, TriageStatus};
use crate::orchestrator::dispatcher::{DispatchStats, Dispatcher};
use crate::orchestrator::folder_processor::{FolderProcessor, FolderSettings, IngestStats};
use crate::orchestrator::scheduler::{FireOutcome, Scheduler, SweepReport};
use crate::services::{
    DeliveryRule, ErrorRecorder, LlmService, PollPolicy, RecognitionService, Summarizer,
};
use crate::traits::ErrorLedger;
use crate::utils::logging::log_startup;
use crate::workflow::IngestFlow;

/// 应用主结构
pub struct App {
    config: Config,
    ledger: Arc<FileLedger>,
    queue: Arc<FileActionQueue>,
    recorder: ErrorRecorder,
}

impl App {
    /// 初始化应用
    ///
    /// 推送时间和推送星期在这里先校验，格式错误时任何子命令都不执行。
    pub async fn initialize(config: Config) -> AppResult<Self> {
        config.delivery_time()?;
        config.delivery_weekday()?;

        let ledger = Arc::new(FileLedger::open(&config.ledger_path).await?);
        let queue = Arc::new(FileActionQueue::open(&config.action_queue_path).await?);
        let recorder = ErrorRecorder::new(ledger.clone());

        Ok(Self {
            config,
            ledger,
            queue,
            recorder,
        })
    }

    /// 导入文件夹中的新文档
    pub async fn ingest(&self) -> Result<IngestStats> {
        let processor = self.folder_processor()?;
        log_startup("导入", &self.config.folder_id);
        Ok(processor.process_folder(now()).await)
    }

    /// 扫描台账并登记推送任务
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.scheduler()?.sweep(now()).await
    }

    /// 手动执行一个推送任务
    pub async fn fire(&self, action_id: &str) -> Result<FireOutcome> {
        self.scheduler()?.fire(&ActionId::from(action_id)).await
    }

    /// 执行所有到期的任务
    pub async fn dispatch(&self) -> Result<DispatchStats> {
        let dispatcher = Dispatcher::new(self.queue.clone(), Arc::new(self.scheduler()?));
        dispatcher.dispatch_due(now()).await
    }

    /// 推送失败后重新排队
    pub async fn requeue(&self, document_id: &str, at: NaiveDateTime) -> Result<ActionId> {
        self.scheduler()?.requeue(document_id, at, now()).await
    }

    /// 错误台账列表
    pub async fn errors(&self, subject: Option<&str>) -> Result<Vec<(usize, ErrorRecord)>> {
        Ok(self.ledger.errors(subject).await?)
    }

    /// 更新错误记录的处理状态
    pub async fn set_error_status(&self, index: usize, status: TriageStatus) -> Result<()> {
        Ok(self.ledger.set_status(index, status).await?)
    }

    /// 常驻运行：定时导入、扫描、分发到期任务，直到收到 Ctrl-C
    pub async fn run_daemon(&self) -> Result<()> {
        let processor = self.folder_processor()?;
        let scheduler = Arc::new(self.scheduler()?);
        let dispatcher = Dispatcher::new(self.queue.clone(), scheduler.clone());

        log_startup("常驻", &self.config.folder_id);
        info!(
            "⏱️ 导入间隔 {} 分钟 | 扫描间隔 {} 分钟 | 分发间隔 {} 秒",
            self.config.ingest_interval_minutes,
            self.config.sweep_interval_minutes,
            self.config.dispatch_interval_secs
        );

        let mut ingest_tick = ticker(Duration::from_secs(self.config.ingest_interval_minutes * 60));
        let mut sweep_tick = ticker(Duration::from_secs(self.config.sweep_interval_minutes * 60));
        let mut dispatch_tick = ticker(Duration::from_secs(self.config.dispatch_interval_secs));

        loop {
            tokio::select! {
                _ = ingest_tick.tick() => {
                    processor.process_folder(now()).await;
                }
                _ = sweep_tick.tick() => {
                    if let Err(e) = scheduler.sweep(now()).await {
                        error!("❌ 扫描失败: {:#}", e);
                    }
                }
                _ = dispatch_tick.tick() => {
                    if let Err(e) = dispatcher.dispatch_due(now()).await {
                        error!("❌ 分发失败: {:#}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("👋 收到退出信号，程序结束");
                    return Ok(());
                }
            }
        }
    }

    // ========== 组件装配 ==========

    fn folder_processor(&self) -> Result<FolderProcessor> {
        let config = &self.config;
        let settings = FolderSettings::from_config(config)?;
        let google = ApiClient::new(config.google_access_token()?);
        config.llm_api_key()?;

        let store = Arc::new(DriveClient::new(google.clone()));
        let transport = Arc::new(VisionClient::new(google, config.bucket_name()?));
        let recognition = RecognitionService::new(
            transport,
            PollPolicy::from_config(config),
            config.accepted_mime_type.clone(),
        );
        let summarizer = Summarizer::new(Arc::new(LlmService::new(config)));
        let rule = DeliveryRule {
            weeks_before: config.weeks_before,
            weekday: config.delivery_weekday()?,
            time: config.delivery_time()?,
        };

        let flow = IngestFlow::new(
            store.clone(),
            self.ledger.clone(),
            recognition,
            summarizer,
            self.recorder.clone(),
            rule,
        );

        Ok(FolderProcessor::new(
            store,
            self.queue.clone(),
            flow,
            self.recorder.clone(),
            settings,
        ))
    }

    fn scheduler(&self) -> Result<Scheduler> {
        let line = ApiClient::new(self.config.line_access_token()?);
        Ok(Scheduler::new(
            self.ledger.clone(),
            self.queue.clone(),
            Arc::new(LineClient::new(line)),
            self.recorder.clone(),
        ))
    }
}

/// 当前本地时间
fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut tick = interval(period.max(Duration::from_secs(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}
