//! 基于 JSON 文件的延迟任务队列
//!
//! 只负责保存 (fire_at, handler, id)，由 `orchestrator::dispatcher` 定时取出到期任务执行。

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::LedgerError;
use crate::infrastructure::json_file::JsonFile;
use crate::models::{ActionId, Handler, ScheduledAction};
use crate::traits::ActionQueue;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueState {
    #[serde(default)]
    actions: Vec<ScheduledAction>,
}

pub struct FileActionQueue {
    file: JsonFile<QueueState>,
}

impl FileActionQueue {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Ok(Self {
            file: JsonFile::open(path).await?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            file: JsonFile::in_memory(),
        }
    }

    /// 当前所有存活的任务
    pub async fn live_actions(&self) -> Result<Vec<ScheduledAction>, LedgerError> {
        self.file.read(|s| s.actions.clone()).await
    }
}

#[async_trait]
impl ActionQueue for FileActionQueue {
    async fn register_one_shot(
        &self,
        fire_at: NaiveDateTime,
        handler: Handler,
    ) -> Result<ActionId, LedgerError> {
        let id = ActionId::generate();
        let action = ScheduledAction {
            id: id.clone(),
            fire_at,
            handler,
        };
        self.file
            .update(|s| {
                s.actions.push(action);
                Ok(())
            })
            .await?;
        debug!("登记任务 {} ({:?}) @ {}", id, handler, fire_at);
        Ok(id)
    }

    async fn cancel(&self, id: &ActionId) -> Result<bool, LedgerError> {
        let removed = self
            .file
            .update(|s| {
                let before = s.actions.len();
                s.actions.retain(|a| &a.id != id);
                Ok(s.actions.len() != before)
            })
            .await?;
        if removed {
            debug!("删除任务 {}", id);
        }
        Ok(removed)
    }

    async fn is_live(&self, id: &ActionId) -> Result<bool, LedgerError> {
        self.file
            .read(|s| s.actions.iter().any(|a| &a.id == id))
            .await
    }

    async fn has_live(&self, handler: Handler) -> Result<bool, LedgerError> {
        self.file
            .read(|s| s.actions.iter().any(|a| a.handler == handler))
            .await
    }

    async fn due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledAction>, LedgerError> {
        let mut due: Vec<ScheduledAction> = self
            .file
            .read(|s| {
                s.actions
                    .iter()
                    .filter(|a| a.fire_at <= now)
                    .cloned()
                    .collect()
            })
            .await?;
        due.sort_by_key(|a| a.fire_at);
        Ok(due)
    }
}
