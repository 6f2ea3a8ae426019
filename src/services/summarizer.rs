//! 摘要服务 - 业务能力层
//!
//! 把识别出的全文交给 LLM，得到固定格式的摘要文本：
//!
//! ```text
//! 🗻📊 标题
//!
//! 🕒 重要日期：2024-11-16
//! 📍 关注要点：一句话要点
//! 📅 推送日期：2024-11-03
//!
//! 摘要：
//! 正文摘要
//!
//! #标签1 #标签2
//! ```

use std::sync::Arc;
use tracing::{debug, warn};

use crate::traits::TextGenerator;
use crate::utils::logging::truncate_text;

pub const TITLE_MARK: &str = "🗻";
pub const KEY_DATE_LABEL: &str = "🕒 重要日期：";
pub const HIGHLIGHT_LABEL: &str = "📍 关注要点：";
pub const BROADCAST_LABEL: &str = "📅 推送日期：";
pub const SUMMARY_LABEL: &str = "摘要：";

pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// 生成固定格式的摘要
    ///
    /// 任何调用失败都返回 `None`，由调用方记录错误。
    pub async fn summarize(&self, text: &str) -> Option<String> {
        let sanitized = sanitize_text(text);
        if sanitized.is_empty() {
            warn!("待摘要文本为空，跳过 LLM 调用");
            return None;
        }

        let prompt = build_prompt(&sanitized);
        debug!("摘要提示词长度: {} 字符", prompt.chars().count());

        match self.generator.generate(&prompt).await {
            Ok(raw) => {
                let cleaned = strip_code_fences(&raw);
                if cleaned.is_empty() {
                    warn!("LLM 返回的摘要为空");
                    return None;
                }
                debug!("摘要: {}", truncate_text(&cleaned, 80));
                Some(cleaned)
            }
            Err(e) => {
                warn!("摘要生成失败: {:#}", e);
                None
            }
        }
    }
}

/// 转义会破坏请求体的字符，并把多行压成一行
pub fn sanitize_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "")
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// 去掉代码块标记
///
/// 只有 ``` 或 ```text 这样的独立围栏行会整行删除；
/// 与内容写在同一行的 ``` 只删除标记本身，内容保留。
pub fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !is_fence_line(line))
        .map(|line| line.replace("```", ""))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn is_fence_line(line: &str) -> bool {
    line.trim()
        .strip_prefix("```")
        .map_or(false, |tag| {
            tag.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
        })
}

fn build_prompt(sanitized: &str) -> String {
    format!(
        r#"# 角色
你是社区公告摘要助手，读者是 50-70 岁的居委会成员。语气亲切、明快、简洁。

# 输入
下面是一份通知文件的全文：
"""
{text}
"""

# 输出要求
- 标题：必须包含 2 个表情符号，20 字以内，抓住重点
- 关注要点：50 字以内，最吸引读者的一点
- 重要日期：文件中最重要的活动日期，格式 yyyy-mm-dd
- 推送日期：重要日期两周前的星期日，格式 yyyy-mm-dd，与重要日期不同
- 摘要：85 字以内
- 最后一行给出 2 个热点词，使用 #话题 格式

# 输出格式（严格遵守，不要输出其他内容）
{title_mark}📊 [标题]

{key_date}[日期]
{highlight}[要点]
{broadcast}[日期]

{summary}
[摘要]

#热点词1 #热点词2"#,
        text = sanitized,
        title_mark = TITLE_MARK,
        key_date = KEY_DATE_LABEL,
        highlight = HIGHLIGHT_LABEL,
        broadcast = BROADCAST_LABEL,
        summary = SUMMARY_LABEL,
    )
}
