use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 云盘中的一个文档（只在单次处理中存在，不持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: DateTime<Utc>,
    pub created_time: DateTime<Utc>,
}

impl DocumentRef {
    /// 台账中保存的文件链接
    pub fn web_link(&self) -> String {
        format!("https://drive.google.com/file/d/{}/view", self.id)
    }
}
