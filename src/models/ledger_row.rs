//! 台账行
//!
//! 每个成功处理的文档对应一行。状态只能向前迁移：
//!
//! ```text
//! Pending ──schedule──▶ Scheduled ──deliver──▶ Delivered
//!    └──────────────deliver（兜底路径）─────────────▲
//! ```
//!
//! `scheduled_action_id` 有值当且仅当状态为 `Scheduled`，
//! 所有修改都必须通过下面的迁移方法完成。

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionError;
use crate::models::action::ActionId;

/// 推送状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Scheduled,
    Delivered,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Pending => "待登记",
            DeliveryStatus::Scheduled => "已登记",
            DeliveryStatus::Delivered => "已推送",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub document_id: String,
    pub document_name: String,
    pub document_link: String,
    pub title: String,
    pub highlight: String,
    pub free_summary: String,
    pub trend_tags: String,
    pub key_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub delivery_time: NaiveTime,
    scheduled_action_id: Option<ActionId>,
    delivery_status: DeliveryStatus,
    pub created_at: DateTime<Local>,
}

/// 新建台账行所需的字段
#[derive(Debug, Clone)]
pub struct NewRow {
    pub document_id: String,
    pub document_name: String,
    pub document_link: String,
    pub title: String,
    pub highlight: String,
    pub free_summary: String,
    pub trend_tags: String,
    pub key_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub delivery_time: NaiveTime,
}

impl LedgerRow {
    /// 新行总是从 `Pending` 开始
    pub fn new(fields: NewRow) -> Self {
        Self {
            document_id: fields.document_id,
            document_name: fields.document_name,
            document_link: fields.document_link,
            title: fields.title,
            highlight: fields.highlight,
            free_summary: fields.free_summary,
            trend_tags: fields.trend_tags,
            key_date: fields.key_date,
            delivery_date: fields.delivery_date,
            delivery_time: fields.delivery_time,
            scheduled_action_id: None,
            delivery_status: DeliveryStatus::Pending,
            created_at: Local::now(),
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        self.delivery_status
    }

    pub fn scheduled_action_id(&self) -> Option<&ActionId> {
        self.scheduled_action_id.as_ref()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivery_status == DeliveryStatus::Delivered
    }

    /// 推送时刻（本地时间）
    pub fn delivery_instant(&self) -> NaiveDateTime {
        self.delivery_date.and_time(self.delivery_time)
    }

    /// Pending → Scheduled
    pub fn schedule(&mut self, action_id: ActionId) -> Result<(), TransitionError> {
        match self.delivery_status {
            DeliveryStatus::Pending => {
                self.scheduled_action_id = Some(action_id);
                self.delivery_status = DeliveryStatus::Scheduled;
                Ok(())
            }
            DeliveryStatus::Scheduled => Err(TransitionError::AlreadyScheduled {
                document_id: self.document_id.clone(),
            }),
            DeliveryStatus::Delivered => Err(TransitionError::AlreadyDelivered {
                document_id: self.document_id.clone(),
            }),
        }
    }

    /// 已登记的行换绑新的任务（自愈与人工重新排队）
    ///
    /// 返回被替换掉的旧任务ID。
    pub fn rebind(&mut self, action_id: ActionId) -> Result<ActionId, TransitionError> {
        match self.delivery_status {
            DeliveryStatus::Scheduled => {
                let previous = self.scheduled_action_id.replace(action_id);
                previous.ok_or_else(|| TransitionError::NotScheduled {
                    document_id: self.document_id.clone(),
                })
            }
            DeliveryStatus::Pending => Err(TransitionError::NotScheduled {
                document_id: self.document_id.clone(),
            }),
            DeliveryStatus::Delivered => Err(TransitionError::AlreadyDelivered {
                document_id: self.document_id.clone(),
            }),
        }
    }

    /// Pending/Scheduled → Delivered，同时清除任务ID
    pub fn deliver(&mut self) -> Result<(), TransitionError> {
        if self.is_delivered() {
            return Err(TransitionError::AlreadyDelivered {
                document_id: self.document_id.clone(),
            });
        }
        self.scheduled_action_id = None;
        self.delivery_status = DeliveryStatus::Delivered;
        Ok(())
    }

    /// 单行是否满足状态不变量（加载台账时校验）
    pub fn is_consistent(&self) -> bool {
        self.scheduled_action_id.is_some() == (self.delivery_status == DeliveryStatus::Scheduled)
            && self.delivery_date < self.key_date
    }
}
