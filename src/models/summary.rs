use chrono::NaiveDate;

/// 从 LLM 摘要中提取出的结构化字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFields {
    pub title: String,
    /// 已经过滚动修正，保证不早于今天
    pub key_date: NaiveDate,
    pub highlight: String,
    pub summary: String,
    pub trend_tags: String,
}
