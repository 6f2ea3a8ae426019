//! 任务分发器 - 编排层
//!
//! 按触发时间顺序执行所有到期的延迟任务：
//!
//! - `Deliver` → `Scheduler::fire`
//! - `Sweep` → `Scheduler::sweep`，完成后注销任务

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::models::Handler;
use crate::orchestrator::scheduler::{FireOutcome, Scheduler};
use crate::traits::ActionQueue;

/// 一次分发的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub due: usize,
    pub delivered: usize,
    pub sweeps: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    queue: Arc<dyn ActionQueue>,
    scheduler: Arc<Scheduler>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn ActionQueue>, scheduler: Arc<Scheduler>) -> Self {
        Self { queue, scheduler }
    }

    /// 执行 `now` 之前到期的所有任务
    pub async fn dispatch_due(&self, now: NaiveDateTime) -> Result<DispatchStats> {
        let due = self.queue.due(now).await.context("读取任务队列失败")?;
        let mut stats = DispatchStats {
            due: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            debug!("没有到期的任务");
            return Ok(stats);
        }

        for action in due {
            // 前面的任务可能已经注销了它
            if !self.queue.is_live(&action.id).await? {
                continue;
            }
            debug!("执行任务 {} ({:?}) @ {}", action.id, action.handler, action.fire_at);
            match action.handler {
                Handler::Deliver => match self.scheduler.fire(&action.id).await {
                    Ok(FireOutcome::Delivered { .. }) => stats.delivered += 1,
                    Ok(FireOutcome::SendFailed { .. }) => stats.failed += 1,
                    Ok(FireOutcome::NothingToSend) => {}
                    Err(e) => {
                        error!("❌ 推送任务 {} 执行失败: {:#}", action.id, e);
                        stats.failed += 1;
                    }
                },
                Handler::Sweep => {
                    match self.scheduler.sweep(now).await {
                        Ok(_) => stats.sweeps += 1,
                        Err(e) => {
                            error!("❌ 扫描任务 {} 执行失败: {:#}", action.id, e);
                            stats.failed += 1;
                        }
                    }
                    if let Err(e) = self.queue.cancel(&action.id).await {
                        warn!("注销扫描任务 {} 失败: {}", action.id, e);
                    }
                }
            }
        }

        Ok(stats)
    }
}
