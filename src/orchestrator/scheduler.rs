//! 推送调度器 - 编排层
//!
//! 台账行的状态机：`Pending → Scheduled → Delivered`
//!
//! - `sweep`：为未来的待推送行登记推送任务，并修复丢失任务的已登记行
//! - `fire`：推送任务到期时发送消息
//! - `requeue`：推送失败后由运维人员重新排队

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{ActionId, DeliveryStatus, Handler, LedgerRow};
use crate::services::{ErrorRecorder, SUBJECT_SEND_MESSAGE};
use crate::traits::{ActionQueue, Ledger, MessageTransport};

/// 消息中标题与正文之间的分隔线
pub const SEPARATOR: &str = "────────────────";

/// 一次扫描的结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// 新登记的行
    pub scheduled: usize,
    /// 推送时间已过而跳过的待推送行
    pub skipped_past: usize,
    /// 任务丢失后重新登记的行
    pub rearmed: usize,
    /// 任务丢失且推送时间已过，需要人工处理的行
    pub stale: usize,
    /// 处理失败的行
    pub failed: usize,
}

/// 一次推送的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    Delivered { document_id: String },
    SendFailed { document_id: String },
    /// 没有可推送的行
    NothingToSend,
}

pub struct Scheduler {
    ledger: Arc<dyn Ledger>,
    queue: Arc<dyn ActionQueue>,
    messenger: Arc<dyn MessageTransport>,
    recorder: ErrorRecorder,
}

impl Scheduler {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        queue: Arc<dyn ActionQueue>,
        messenger: Arc<dyn MessageTransport>,
        recorder: ErrorRecorder,
    ) -> Self {
        Self {
            ledger,
            queue,
            messenger,
            recorder,
        }
    }

    /// 扫描台账并登记推送任务
    ///
    /// 重复执行不会重复登记：已登记且任务存活的行会被跳过。
    pub async fn sweep(&self, now: NaiveDateTime) -> Result<SweepReport> {
        let rows = self.ledger.rows().await.context("读取台账失败")?;
        let mut report = SweepReport::default();

        for mut row in rows {
            let result = match row.status() {
                DeliveryStatus::Pending => self.schedule_pending(&mut row, now, &mut report).await,
                DeliveryStatus::Scheduled => self.heal_scheduled(&mut row, now, &mut report).await,
                DeliveryStatus::Delivered => Ok(()),
            };

            if let Err(e) = result {
                report.failed += 1;
                self.recorder.record(&row.document_id, &e).await;
            }
        }

        info!(
            "🗓️ 扫描完成: 新登记 {} | 重新登记 {} | 已过期跳过 {} | 需人工处理 {}",
            report.scheduled, report.rearmed, report.skipped_past, report.stale
        );
        Ok(report)
    }

    async fn schedule_pending(
        &self,
        row: &mut LedgerRow,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) -> Result<()> {
        let instant = row.delivery_instant();
        if instant <= now {
            info!(
                "[{}] 推送时间 {} 已过，跳过登记",
                row.document_name, instant
            );
            report.skipped_past += 1;
            return Ok(());
        }

        let id = self.queue.register_one_shot(instant, Handler::Deliver).await?;
        row.schedule(id.clone())?;
        if let Err(e) = self.ledger.update(row).await {
            self.queue.cancel(&id).await?;
            return Err(e.into());
        }

        info!("[{}] ⏰ 已登记推送任务 {} @ {}", row.document_name, id, instant);
        report.scheduled += 1;
        Ok(())
    }

    /// 已登记但任务已不存在的行：未来的重新登记，过期的只报告
    async fn heal_scheduled(
        &self,
        row: &mut LedgerRow,
        now: NaiveDateTime,
        report: &mut SweepReport,
    ) -> Result<()> {
        if let Some(id) = row.scheduled_action_id() {
            if self.queue.is_live(id).await? {
                return Ok(());
            }
        }

        let instant = row.delivery_instant();
        if instant <= now {
            warn!(
                "⚠️ [{}] 推送任务已丢失且推送时间 {} 已过，请使用 requeue 重新排队",
                row.document_name, instant
            );
            report.stale += 1;
            return Ok(());
        }

        let id = self.queue.register_one_shot(instant, Handler::Deliver).await?;
        let previous = row.rebind(id.clone())?;
        if let Err(e) = self.ledger.update(row).await {
            self.queue.cancel(&id).await?;
            return Err(e.into());
        }

        warn!(
            "[{}] 🔧 推送任务 {} 已丢失，重新登记为 {}",
            row.document_name, previous, id
        );
        report.rearmed += 1;
        Ok(())
    }

    /// 执行一个到期的推送任务
    ///
    /// 无论发送成功与否，任务都会被注销。
    pub async fn fire(&self, action_id: &ActionId) -> Result<FireOutcome> {
        let outcome = self.deliver_for(action_id).await;

        if let Err(e) = self.queue.cancel(action_id).await {
            warn!("注销推送任务 {} 失败: {}", action_id, e);
        }

        outcome
    }

    async fn deliver_for(&self, action_id: &ActionId) -> Result<FireOutcome> {
        let rows = self.ledger.rows().await.context("读取台账失败")?;

        let row = match rows
            .iter()
            .find(|r| r.scheduled_action_id() == Some(action_id))
        {
            Some(row) => row.clone(),
            None => match oldest_undelivered(&rows) {
                Some(row) => {
                    warn!(
                        "⚠️ 找不到任务 {} 对应的行，改为推送最早未推送的行: {}",
                        action_id, row.document_name
                    );
                    row.clone()
                }
                None => {
                    info!("没有待推送的行 (任务 {})", action_id);
                    return Ok(FireOutcome::NothingToSend);
                }
            },
        };

        self.send_row(row, action_id).await
    }

    async fn send_row(&self, mut row: LedgerRow, fired: &ActionId) -> Result<FireOutcome> {
        let message = build_message(&row);
        info!("[{}] 📤 正在推送消息...", row.document_name);

        if let Err(e) = self.messenger.broadcast(&message).await {
            let err = anyhow::Error::new(e).context(format!("推送失败: {}", row.document_id));
            self.recorder.record(SUBJECT_SEND_MESSAGE, &err).await;
            return Ok(FireOutcome::SendFailed {
                document_id: row.document_id,
            });
        }

        let bound = row.scheduled_action_id().cloned();
        row.deliver()?;
        self.ledger
            .update(&row)
            .await
            .context("写入推送状态失败")?;

        // 兜底路径推送的行，原来登记的任务也要注销
        if let Some(bound) = bound.filter(|id| id != fired) {
            self.queue.cancel(&bound).await?;
        }

        info!("[{}] ✓ 推送成功", row.document_name);
        Ok(FireOutcome::Delivered {
            document_id: row.document_id,
        })
    }

    /// 为已登记的行换一个新的推送时间
    ///
    /// 已推送的行和过去的时间都会被拒绝，行保持 `Scheduled` 状态。
    pub async fn requeue(
        &self,
        document_id: &str,
        at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<ActionId> {
        if at <= now {
            bail!("推送时间 {} 早于当前时间 {}", at, now);
        }

        let rows = self.ledger.rows().await.context("读取台账失败")?;
        let mut row = rows
            .into_iter()
            .find(|r| r.document_id == document_id)
            .with_context(|| format!("台账中不存在该文档: {}", document_id))?;

        match row.status() {
            DeliveryStatus::Delivered => bail!("文档 {} 已推送，不能重新排队", document_id),
            DeliveryStatus::Pending => bail!("文档 {} 尚未登记推送任务，请先执行 sweep", document_id),
            DeliveryStatus::Scheduled => {}
        }

        let id = self.queue.register_one_shot(at, Handler::Deliver).await?;
        let previous = row.rebind(id.clone())?;
        if let Err(e) = self.ledger.update(&row).await {
            self.queue.cancel(&id).await?;
            return Err(e.into());
        }
        self.queue.cancel(&previous).await?;

        info!("[{}] 🔁 已重新排队: {} → {} @ {}", row.document_name, previous, id, at);
        Ok(id)
    }
}

/// 最早写入且尚未推送的行
fn oldest_undelivered(rows: &[LedgerRow]) -> Option<&LedgerRow> {
    rows.iter()
        .filter(|r| !r.is_delivered())
        .min_by_key(|r| r.created_at)
}

/// 推送消息正文
pub fn build_message(row: &LedgerRow) -> String {
    let mut lines = vec![row.title.clone(), SEPARATOR.to_string()];
    lines.push(format!("🕒 {}", row.key_date.format("%Y-%m-%d")));
    if !row.highlight.is_empty() {
        lines.push(format!("📍 {}", row.highlight));
    }
    lines.push(String::new());
    lines.push(row.free_summary.clone());
    if !row.trend_tags.is_empty() {
        lines.push(String::new());
        lines.push(row.trend_tags.clone());
    }
    lines.join("\n")
}
