//! 端到端流程测试：导入 → 扫描 → 推送
//!
//! 所有外部服务都用内存实现替代，不访问网络。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use summary_broadcast::error::ApiError;
use summary_broadcast::infrastructure::{FileActionQueue, FileLedger};
use summary_broadcast::models::{ActionId, DeliveryStatus, DocumentRef, Handler, LedgerRow};
use summary_broadcast::orchestrator::{
    Dispatcher, FireOutcome, FolderProcessor, FolderSettings, IngestStats, Scheduler,
};
use summary_broadcast::services::{
    DeliveryRule, ErrorRecorder, PollPolicy, RecognitionService, Summarizer,
    SUBJECT_FOLDER, SUBJECT_SEND_MESSAGE,
};
use summary_broadcast::traits::{
    ActionQueue, DocumentStore, ErrorLedger, Ledger, MessageTransport, OperationStatus,
    RecognitionTransport, TextGenerator,
};
use summary_broadcast::workflow::IngestFlow;

// ========== 内存实现 ==========

#[derive(Default)]
struct FakeStore {
    documents: Mutex<Vec<DocumentRef>>,
    renames: Mutex<Vec<(String, String)>>,
    fail_listing: bool,
}

impl FakeStore {
    fn with(documents: Vec<DocumentRef>) -> Self {
        Self {
            documents: Mutex::new(documents),
            ..Default::default()
        }
    }

    fn add(&self, document: DocumentRef) {
        self.documents.lock().unwrap().push(document);
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn list_modified_since(
        &self,
        _folder_id: &str,
        _mime_type: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<DocumentRef>, ApiError> {
        if self.fail_listing {
            return Err(ApiError::BadStatus {
                endpoint: "files".into(),
                status: 500,
                body: "backend error".into(),
            });
        }
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn get_content(&self, _document: &DocumentRef) -> Result<Vec<u8>, ApiError> {
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn rename(&self, document: &DocumentRef, new_name: &str) -> Result<(), ApiError> {
        self.renames
            .lock()
            .unwrap()
            .push((document.id.clone(), new_name.to_string()));
        for stored in self.documents.lock().unwrap().iter_mut() {
            if stored.id == document.id {
                stored.name = new_name.to_string();
            }
        }
        Ok(())
    }
}

/// `failing` 中的文档上传失败；`never_done` 中的文档识别任务一直不结束
#[derive(Default)]
struct FakeTransport {
    failing: HashSet<String>,
    never_done: HashSet<String>,
}

impl FakeTransport {
    fn failing(id: &str) -> Self {
        Self {
            failing: HashSet::from([id.to_string()]),
            ..Default::default()
        }
    }

    fn never_done(id: &str) -> Self {
        Self {
            never_done: HashSet::from([id.to_string()]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RecognitionTransport for FakeTransport {
    async fn upload(&self, object_name: &str, _content: Vec<u8>, _mime: &str) -> Result<String, ApiError> {
        let id = object_name.trim_end_matches(".pdf");
        if self.failing.contains(id) {
            return Err(ApiError::BadStatus {
                endpoint: "upload".into(),
                status: 403,
                body: "forbidden".into(),
            });
        }
        Ok(self.object_uri(object_name))
    }

    async fn submit(&self, input_uri: &str, _mime: &str, _output: &str) -> Result<String, ApiError> {
        Ok(format!("op-{}", input_uri))
    }

    async fn poll(&self, operation_id: &str) -> Result<OperationStatus, ApiError> {
        let id = operation_id
            .trim_start_matches("op-gs://test-bucket/")
            .trim_end_matches(".pdf");
        Ok(OperationStatus {
            done: !self.never_done.contains(id),
            error: None,
        })
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, ApiError> {
        Ok(vec![format!("{}-output-1-to-1.json", prefix)])
    }

    async fn fetch_object(&self, name: &str) -> Result<JsonValue, ApiError> {
        Ok(json!({
            "responses": [{ "fullTextAnnotation": { "text": format!("通知全文 {}", name) } }]
        }))
    }

    fn object_uri(&self, object_name: &str) -> String {
        format!("gs://test-bucket/{}", object_name)
    }
}

/// `empty` 中的文档只得到空代码块，`failing` 中的文档调用失败
#[derive(Default)]
struct FakeGenerator {
    empty: HashSet<String>,
    failing: HashSet<String>,
}

impl FakeGenerator {
    fn mentions(ids: &HashSet<String>, prompt: &str) -> bool {
        ids.iter()
            .any(|id| prompt.contains(&format!("通知全文 {}-output", id)))
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        if Self::mentions(&self.failing, prompt) {
            anyhow::bail!("status 503: model overloaded");
        }
        if Self::mentions(&self.empty, prompt) {
            return Ok("```\n```".to_string());
        }
        Ok("```\n🗻📊 秋季防灾演练通知\n\n🕒 重要日期：2024-11-16\n📍 关注要点：全体居民请参加\n📅 推送日期：2024-11-03\n\n摘要：\n11月16日上午在社区广场举行防灾演练。\n\n#防灾 #社区活动\n```".to_string())
    }
}

#[derive(Default)]
struct FakeMessenger {
    sent: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

impl FakeMessenger {
    fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageTransport for FakeMessenger {
    async fn broadcast(&self, text: &str) -> Result<(), ApiError> {
        if *self.fail.lock().unwrap() {
            return Err(ApiError::BadStatus {
                endpoint: "broadcast".into(),
                status: 429,
                body: "rate limited".into(),
            });
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ========== 测试装配 ==========

struct Harness {
    store: Arc<FakeStore>,
    ledger: Arc<FileLedger>,
    queue: Arc<FileActionQueue>,
    messenger: Arc<FakeMessenger>,
    processor: FolderProcessor,
    scheduler: Arc<Scheduler>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new(store: FakeStore, transport: FakeTransport) -> Self {
        Self::with_generator(store, transport, FakeGenerator::default())
    }

    fn with_generator(store: FakeStore, transport: FakeTransport, generator: FakeGenerator) -> Self {
        Self::build(
            store,
            transport,
            generator,
            Arc::new(FileLedger::in_memory()),
            Arc::new(FileActionQueue::in_memory()),
        )
    }

    fn with_storage(
        store: FakeStore,
        transport: FakeTransport,
        ledger: Arc<FileLedger>,
        queue: Arc<FileActionQueue>,
    ) -> Self {
        Self::build(store, transport, FakeGenerator::default(), ledger, queue)
    }

    fn build(
        store: FakeStore,
        transport: FakeTransport,
        generator: FakeGenerator,
        ledger: Arc<FileLedger>,
        queue: Arc<FileActionQueue>,
    ) -> Self {
        let store = Arc::new(store);
        let messenger = Arc::new(FakeMessenger::default());
        let recorder = ErrorRecorder::new(ledger.clone());

        let recognition = RecognitionService::new(
            Arc::new(transport),
            PollPolicy {
                interval: Duration::ZERO,
                max_attempts: 3,
            },
            "application/pdf",
        );
        let rule = DeliveryRule {
            weeks_before: 2,
            weekday: Weekday::Sun,
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        let flow = IngestFlow::new(
            store.clone(),
            ledger.clone(),
            recognition,
            Summarizer::new(Arc::new(generator)),
            recorder.clone(),
            rule,
        );
        let processor = FolderProcessor::new(
            store.clone(),
            queue.clone(),
            flow,
            recorder.clone(),
            FolderSettings {
                folder_id: "folder-1".into(),
                mime_type: "application/pdf".into(),
                lookback_days: 2,
            },
        );
        let scheduler = Arc::new(Scheduler::new(
            ledger.clone(),
            queue.clone(),
            messenger.clone(),
            recorder,
        ));
        let dispatcher = Dispatcher::new(queue.clone(), scheduler.clone());

        Self {
            store,
            ledger,
            queue,
            messenger,
            processor,
            scheduler,
            dispatcher,
        }
    }

    async fn rows(&self) -> Vec<LedgerRow> {
        self.ledger.rows().await.unwrap()
    }

    async fn row(&self, document_id: &str) -> LedgerRow {
        self.rows()
            .await
            .into_iter()
            .find(|r| r.document_id == document_id)
            .unwrap()
    }

    async fn actions(&self, handler: Handler) -> usize {
        self.queue
            .live_actions()
            .await
            .unwrap()
            .iter()
            .filter(|a| a.handler == handler)
            .count()
    }
}

fn document(id: &str, name: &str) -> DocumentRef {
    let created = Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap();
    DocumentRef {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        modified_time: created,
        created_time: created,
    }
}

fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// 导入时的当前时间，早于推送时间 2024-11-03 09:00
fn ingest_time() -> NaiveDateTime {
    at(10, 20, 10)
}

// ========== 导入 ==========

#[tokio::test]
async fn test_ingest_writes_pending_rows() {
    let h = Harness::new(
        FakeStore::with(vec![
            document("doc-1", "防灾演练.pdf"),
            document("doc-2", "2409_秋祭.pdf"),
        ]),
        FakeTransport::default(),
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_eq!(
        stats,
        IngestStats {
            listed: 2,
            ingested: 2,
            skipped: 0,
            failed: 0
        }
    );

    let row = h.row("doc-1").await;
    assert_eq!(row.status(), DeliveryStatus::Pending);
    assert!(row.scheduled_action_id().is_none());
    assert_eq!(row.document_name, "2410_防灾演练.pdf");
    assert_eq!(row.document_link, "https://drive.google.com/file/d/doc-1/view");
    assert_eq!(row.title, "🗻📊 秋季防灾演练通知");
    assert_eq!(row.highlight, "全体居民请参加");
    assert_eq!(row.trend_tags, "#防灾 #社区活动");
    assert_eq!(row.key_date, NaiveDate::from_ymd_opt(2024, 11, 16).unwrap());
    assert_eq!(row.delivery_date, NaiveDate::from_ymd_opt(2024, 11, 3).unwrap());
    assert_eq!(row.delivery_instant(), at(11, 3, 9));

    // 已有前缀的文件不改名
    assert_eq!(h.row("doc-2").await.document_name, "2409_秋祭.pdf");
    assert_eq!(h.store.renames.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ingest_is_idempotent() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );

    h.processor.process_folder(ingest_time()).await;
    let second = h.processor.process_folder(ingest_time()).await;

    assert_eq!(second.ingested, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(h.rows().await.len(), 1);
    assert_eq!(h.store.renames.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failing_document_does_not_abort_batch() {
    let h = Harness::new(
        FakeStore::with(vec![
            document("bad", "损坏文件.pdf"),
            document("doc-1", "防灾演练.pdf"),
        ]),
        FakeTransport::failing("bad"),
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.failed, 1);

    let rows = h.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].document_id, "doc-1");

    let errors = h.ledger.errors(Some("bad")).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.message.contains("文字识别失败"));
}

/// 失败的文档：计入 failed，不写台账行，错误台账中有一条以文档ID为主体的记录
async fn assert_single_failure(h: &Harness, stats: IngestStats, document_id: &str, message: &str) {
    assert_eq!(stats.listed, 2);
    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.failed, 1);

    let rows = h.rows().await;
    assert!(rows.iter().all(|r| r.document_id != document_id));
    assert_eq!(rows.len(), 1);

    let errors = h.ledger.errors(Some(document_id)).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.message.contains(message));
    assert_eq!(h.ledger.errors(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recognition_timeout_fails_only_that_document() {
    let h = Harness::new(
        FakeStore::with(vec![
            document("slow", "大文件.pdf"),
            document("doc-1", "防灾演练.pdf"),
        ]),
        FakeTransport::never_done("slow"),
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_single_failure(&h, stats, "slow", "文字识别失败").await;

    let errors = h.ledger.errors(Some("slow")).await.unwrap();
    let trace = errors[0].1.trace.clone().unwrap_or_default();
    assert!(trace.contains("识别任务超时"), "trace: {}", trace);
}

#[tokio::test]
async fn test_empty_summary_fails_only_that_document() {
    let h = Harness::with_generator(
        FakeStore::with(vec![
            document("blank", "空白通知.pdf"),
            document("doc-1", "防灾演练.pdf"),
        ]),
        FakeTransport::default(),
        FakeGenerator {
            empty: HashSet::from(["blank".to_string()]),
            ..Default::default()
        },
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_single_failure(&h, stats, "blank", "摘要生成失败").await;
}

#[tokio::test]
async fn test_generator_error_fails_only_that_document() {
    let h = Harness::with_generator(
        FakeStore::with(vec![
            document("busy", "秋祭.pdf"),
            document("doc-1", "防灾演练.pdf"),
        ]),
        FakeTransport::default(),
        FakeGenerator {
            failing: HashSet::from(["busy".to_string()]),
            ..Default::default()
        },
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_single_failure(&h, stats, "busy", "摘要生成失败").await;

    // 下一轮重试会再次处理该文档
    let again = h.processor.process_folder(ingest_time()).await;
    assert_eq!(again.skipped, 1);
    assert_eq!(again.failed, 1);
}

#[tokio::test]
async fn test_listing_failure_is_recorded_for_folder() {
    let h = Harness::new(
        FakeStore {
            fail_listing: true,
            ..Default::default()
        },
        FakeTransport::default(),
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_eq!(stats, IngestStats::default());
    assert_eq!(h.ledger.errors(Some(SUBJECT_FOLDER)).await.unwrap().len(), 1);
    assert_eq!(h.actions(Handler::Sweep).await, 0);
}

#[tokio::test]
async fn test_sweep_is_armed_once() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );

    h.processor.process_folder(ingest_time()).await;
    assert_eq!(h.actions(Handler::Sweep).await, 1);

    h.store.add(document("doc-2", "秋祭.pdf"));
    h.processor.process_folder(ingest_time()).await;
    assert_eq!(h.actions(Handler::Sweep).await, 1);
}

#[tokio::test]
async fn test_nothing_new_does_not_arm_sweep() {
    let h = Harness::new(FakeStore::default(), FakeTransport::default());
    h.processor.process_folder(ingest_time()).await;
    assert_eq!(h.actions(Handler::Sweep).await, 0);
}

// ========== 扫描 ==========

#[tokio::test]
async fn test_sweep_twice_schedules_once() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;

    let first = assert_ok!(h.scheduler.sweep(ingest_time()).await);
    let second = assert_ok!(h.scheduler.sweep(ingest_time()).await);

    assert_eq!(first.scheduled, 1);
    assert_eq!(second.scheduled, 0);
    assert_eq!(h.actions(Handler::Deliver).await, 1);

    let row = h.row("doc-1").await;
    assert_eq!(row.status(), DeliveryStatus::Scheduled);
    let id = row.scheduled_action_id().unwrap();
    assert!(h.queue.is_live(id).await.unwrap());
}

#[tokio::test]
async fn test_sweep_skips_past_instants() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;

    let report = assert_ok!(h.scheduler.sweep(at(11, 3, 9)).await);
    assert_eq!(report.skipped_past, 1);
    assert_eq!(report.scheduled, 0);
    assert_eq!(h.row("doc-1").await.status(), DeliveryStatus::Pending);
    assert_eq!(h.actions(Handler::Deliver).await, 0);
}

#[tokio::test]
async fn test_sweep_rearms_lost_action() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();

    let lost = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();
    h.queue.cancel(&lost).await.unwrap();

    let report = assert_ok!(h.scheduler.sweep(ingest_time()).await);
    assert_eq!(report.rearmed, 1);

    let row = h.row("doc-1").await;
    let rearmed = row.scheduled_action_id().unwrap();
    assert_ne!(rearmed, &lost);
    assert!(h.queue.is_live(rearmed).await.unwrap());
    assert_eq!(h.actions(Handler::Deliver).await, 1);
}

#[tokio::test]
async fn test_sweep_reports_lost_action_in_the_past() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();

    let lost = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();
    h.queue.cancel(&lost).await.unwrap();

    let report = assert_ok!(h.scheduler.sweep(at(11, 4, 9)).await);
    assert_eq!(report.stale, 1);
    assert_eq!(h.row("doc-1").await.scheduled_action_id(), Some(&lost));
}

// ========== 推送 ==========

#[tokio::test]
async fn test_fire_delivers_and_clears_action() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();
    let id = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();

    let outcome = assert_ok!(h.scheduler.fire(&id).await);
    assert_eq!(
        outcome,
        FireOutcome::Delivered {
            document_id: "doc-1".into()
        }
    );

    let row = h.row("doc-1").await;
    assert_eq!(row.status(), DeliveryStatus::Delivered);
    assert!(row.scheduled_action_id().is_none());
    assert!(!h.queue.is_live(&id).await.unwrap());

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("🗻📊 秋季防灾演练通知\n"));
    assert!(sent[0].contains("🕒 2024-11-16"));
    assert!(sent[0].contains("📍 全体居民请参加"));
    assert!(sent[0].ends_with("#防灾 #社区活动"));
}

#[tokio::test]
async fn test_refire_after_delivery_does_not_panic() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();
    let id = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();

    h.scheduler.fire(&id).await.unwrap();
    let again = assert_ok!(h.scheduler.fire(&id).await);

    assert_eq!(again, FireOutcome::NothingToSend);
    assert_eq!(h.messenger.sent().len(), 1);
}

#[tokio::test]
async fn test_unknown_action_falls_back_to_oldest_undelivered() {
    let h = Harness::new(
        FakeStore::with(vec![
            document("doc-1", "防灾演练.pdf"),
            document("doc-2", "秋祭.pdf"),
        ]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();
    let bound = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();

    let outcome = assert_ok!(h.scheduler.fire(&ActionId::from("unknown")).await);
    assert_eq!(
        outcome,
        FireOutcome::Delivered {
            document_id: "doc-1".into()
        }
    );
    // 兜底推送的行原来登记的任务也被注销
    assert!(!h.queue.is_live(&bound).await.unwrap());
    assert_eq!(h.row("doc-2").await.status(), DeliveryStatus::Scheduled);
}

#[tokio::test]
async fn test_failed_send_records_error_and_cancels_action() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();
    let id = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();

    h.messenger.set_failing(true);
    let outcome = assert_ok!(h.scheduler.fire(&id).await);
    assert_eq!(
        outcome,
        FireOutcome::SendFailed {
            document_id: "doc-1".into()
        }
    );

    let row = h.row("doc-1").await;
    assert_eq!(row.status(), DeliveryStatus::Scheduled);
    assert_eq!(row.scheduled_action_id(), Some(&id));
    assert!(!h.queue.is_live(&id).await.unwrap());
    assert_eq!(
        h.ledger.errors(Some(SUBJECT_SEND_MESSAGE)).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_requeue_after_failed_send() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;
    h.scheduler.sweep(ingest_time()).await.unwrap();
    let id = h.row("doc-1").await.scheduled_action_id().cloned().unwrap();

    h.messenger.set_failing(true);
    h.scheduler.fire(&id).await.unwrap();
    h.messenger.set_failing(false);

    let now = at(11, 3, 10);
    assert_err!(h.scheduler.requeue("doc-1", at(11, 3, 8), now).await);

    let new_id = assert_ok!(h.scheduler.requeue("doc-1", at(11, 3, 12), now).await);
    let row = h.row("doc-1").await;
    assert_eq!(row.status(), DeliveryStatus::Scheduled);
    assert_eq!(row.scheduled_action_id(), Some(&new_id));
    assert!(h.queue.is_live(&new_id).await.unwrap());

    let outcome = assert_ok!(h.scheduler.fire(&new_id).await);
    assert!(matches!(outcome, FireOutcome::Delivered { .. }));

    // 已推送的行不能再排队
    assert_err!(h.scheduler.requeue("doc-1", at(11, 4, 9), now).await);
}

// ========== 分发 ==========

#[tokio::test]
async fn test_dispatcher_runs_sweep_then_delivery() {
    let h = Harness::new(
        FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
        FakeTransport::default(),
    );
    h.processor.process_folder(ingest_time()).await;

    let first = assert_ok!(h.dispatcher.dispatch_due(ingest_time()).await);
    assert_eq!(first.sweeps, 1);
    assert_eq!(h.actions(Handler::Sweep).await, 0);
    assert_eq!(h.row("doc-1").await.status(), DeliveryStatus::Scheduled);

    // 推送时间之前什么都不做
    let early = assert_ok!(h.dispatcher.dispatch_due(at(11, 3, 8)).await);
    assert_eq!(early.due, 0);

    let due = assert_ok!(h.dispatcher.dispatch_due(at(11, 3, 9)).await);
    assert_eq!(due.delivered, 1);
    assert_eq!(h.row("doc-1").await.status(), DeliveryStatus::Delivered);
    assert!(h.queue.live_actions().await.unwrap().is_empty());
}

// ========== 持久化 ==========

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.json");
    let queue_path = dir.path().join("actions.json");

    {
        let h = Harness::with_storage(
            FakeStore::with(vec![document("doc-1", "防灾演练.pdf")]),
            FakeTransport::default(),
            Arc::new(FileLedger::open(&ledger_path).await.unwrap()),
            Arc::new(FileActionQueue::open(&queue_path).await.unwrap()),
        );
        h.processor.process_folder(ingest_time()).await;
        h.scheduler.sweep(ingest_time()).await.unwrap();
    }

    let h = Harness::with_storage(
        FakeStore::with(vec![document("doc-1", "2410_防灾演练.pdf")]),
        FakeTransport::default(),
        Arc::new(FileLedger::open(&ledger_path).await.unwrap()),
        Arc::new(FileActionQueue::open(&queue_path).await.unwrap()),
    );

    let stats = h.processor.process_folder(ingest_time()).await;
    assert_eq!(stats.skipped, 1);

    let row = h.row("doc-1").await;
    assert_eq!(row.status(), DeliveryStatus::Scheduled);
    assert!(h.queue.is_live(row.scheduled_action_id().unwrap()).await.unwrap());

    let due = assert_ok!(h.dispatcher.dispatch_due(at(11, 3, 9)).await);
    assert_eq!(due.delivered, 1);
}
