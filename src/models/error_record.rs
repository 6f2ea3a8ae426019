use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 错误记录的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Unhandled,
    InProgress,
    Resolved,
    Ignored,
}

impl fmt::Display for TriageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriageStatus::Unhandled => "unhandled",
            TriageStatus::InProgress => "in_progress",
            TriageStatus::Resolved => "resolved",
            TriageStatus::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

impl FromStr for TriageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unhandled" => Ok(TriageStatus::Unhandled),
            "in_progress" | "in-progress" => Ok(TriageStatus::InProgress),
            "resolved" => Ok(TriageStatus::Resolved),
            "ignored" => Ok(TriageStatus::Ignored),
            other => Err(format!("未知的处理状态: {}", other)),
        }
    }
}

/// 错误台账中的一条记录（只追加，除处理状态外不可修改）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Local>,
    /// 文档ID、"FOLDER"、"SEND_MESSAGE" 等
    pub subject: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub status: TriageStatus,
}

impl ErrorRecord {
    pub fn new(subject: impl Into<String>, message: impl Into<String>, trace: Option<String>) -> Self {
        Self {
            timestamp: Local::now(),
            subject: subject.into(),
            message: message.into(),
            trace,
            status: TriageStatus::Unhandled,
        }
    }
}
