//! 摘要字段提取
//!
//! 按固定格式逐项匹配，匹配不到的字段为空字符串，不会报错。

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::SummaryFields;

struct Patterns {
    title: Regex,
    key_date: Regex,
    highlight: Regex,
    summary_label: Regex,
    tag_line: Regex,
    full_date: Regex,
    month_day: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        title: Regex::new(r"🗻[^\n]*").expect("title pattern"),
        key_date: Regex::new(r"🕒[ \t]*重要日期[ \t]*[：:][ \t]*([^\n]+)").expect("key date pattern"),
        highlight: Regex::new(r"📍[ \t]*关注要点[ \t]*[：:][ \t]*([^\n]+)").expect("highlight pattern"),
        summary_label: Regex::new(r"摘要\s*[：:]").expect("summary pattern"),
        tag_line: Regex::new(r"(?m)^[ \t]*(#[^\n]+)$").expect("tag pattern"),
        full_date: Regex::new(r"(\d{4})\s*[-/.年]\s*(\d{1,2})\s*[-/.月]\s*(\d{1,2})")
            .expect("date pattern"),
        month_day: Regex::new(r"(\d{1,2})\s*[-/月]\s*(\d{1,2})").expect("month-day pattern"),
    })
}

/// 从固定格式摘要中提取字段
///
/// `today` 用于修正重要日期，调用方传入当前本地日期。
pub fn extract(formatted: &str, today: NaiveDate) -> SummaryFields {
    let p = patterns();

    let title = p
        .title
        .find(formatted)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let raw_date = capture(&p.key_date, formatted);
    let highlight = capture(&p.highlight, formatted);

    let summary = p
        .summary_label
        .find(formatted)
        .map(|m| {
            let rest = &formatted[m.end()..];
            let end = p.tag_line.find(rest).map_or(rest.len(), |t| t.start());
            rest[..end].trim().to_string()
        })
        .unwrap_or_default();

    let trend_tags = p
        .tag_line
        .captures_iter(formatted)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect::<Vec<_>>()
        .join(" ");

    SummaryFields {
        title,
        key_date: normalize_key_date(&raw_date, today),
        highlight,
        summary,
        trend_tags,
    }
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// 解析日期字符串
///
/// 支持 `2024-11-16`、`2024/11/16`、`2024.11.16`、`2024年11月16日`，
/// 以及缺少年份的 `11月16日`（年份取 `today` 的年份）。
pub fn parse_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let p = patterns();

    if let Some(c) = p.full_date.captures(raw) {
        let year = c[1].parse().ok()?;
        let month = c[2].parse().ok()?;
        let day = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let c = p.month_day.captures(raw)?;
    let month = c[1].parse().ok()?;
    let day = c[2].parse().ok()?;
    NaiveDate::from_ymd_opt(today.year(), month, day)
}

/// 修正重要日期，保证结果不早于 `today`
///
/// - 月日早于今天：先换成今年，仍早于今天则换成明年
/// - 月日不早于今天但年份已过：换成今年
/// - 无法解析：返回今天
pub fn normalize_key_date(raw: &str, today: NaiveDate) -> NaiveDate {
    let Some(date) = parse_date(raw, today) else {
        return today;
    };

    if (date.month(), date.day()) < (today.month(), today.day()) {
        let this_year = with_year(date, today.year());
        if this_year < today {
            return with_year(date, today.year() + 1);
        }
        return this_year;
    }

    if date < today {
        return with_year(date, today.year());
    }

    date
}

/// 换年份，2月29日在平年变成2月28日
fn with_year(date: NaiveDate, year: i32) -> NaiveDate {
    date.with_year(year)
        .or_else(|| date.pred_opt().and_then(|d| d.with_year(year)))
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const FULL_SUMMARY: &str = "🗻📊 秋季防灾演练通知\n\n🕒 重要日期：2024-11-16\n📍 关注要点：全体居民请参加\n📅 推送日期：2024-11-03\n\n摘要：\n11月16日上午在社区广场举行防灾演练，\n请携带饮用水。\n\n#防灾 #社区活动";

    #[test]
    fn test_extract_all_fields() {
        let fields = extract(FULL_SUMMARY, ymd(2024, 10, 1));
        assert_eq!(fields.title, "🗻📊 秋季防灾演练通知");
        assert_eq!(fields.key_date, ymd(2024, 11, 16));
        assert_eq!(fields.highlight, "全体居民请参加");
        assert_eq!(
            fields.summary,
            "11月16日上午在社区广场举行防灾演练，\n请携带饮用水。"
        );
        assert_eq!(fields.trend_tags, "#防灾 #社区活动");
    }

    #[test]
    fn test_missing_hashtags_yield_empty_tags() {
        let text = "🗻📊 标题\n🕒 重要日期：2024-11-16\n摘要：只有摘要没有话题";
        let fields = extract(text, ymd(2024, 10, 1));
        assert_eq!(fields.trend_tags, "");
        assert_eq!(fields.summary, "只有摘要没有话题");
        assert_eq!(fields.highlight, "");
    }

    #[test]
    fn test_garbage_input_never_fails() {
        let today = ymd(2024, 6, 1);
        let fields = extract("模型没有按格式输出", today);
        assert_eq!(fields.title, "");
        assert_eq!(fields.summary, "");
        assert_eq!(fields.trend_tags, "");
        assert_eq!(fields.key_date, today);
    }

    #[test]
    fn test_past_date_rolls_to_next_year() {
        assert_eq!(
            normalize_key_date("2024-01-15", ymd(2024, 6, 1)),
            ymd(2025, 1, 15)
        );
    }

    #[test]
    fn test_future_date_unchanged() {
        assert_eq!(
            normalize_key_date("2024-09-10", ymd(2024, 6, 1)),
            ymd(2024, 9, 10)
        );
    }

    #[test]
    fn test_today_is_kept() {
        assert_eq!(
            normalize_key_date("2024-06-01", ymd(2024, 6, 1)),
            ymd(2024, 6, 1)
        );
    }

    #[test]
    fn test_stale_year_with_future_month_day() {
        assert_eq!(
            normalize_key_date("2023-09-10", ymd(2024, 6, 1)),
            ymd(2024, 9, 10)
        );
    }

    #[test]
    fn test_unparseable_date_falls_back_to_today() {
        let today = ymd(2024, 6, 1);
        assert_eq!(normalize_key_date("未定", today), today);
        assert_eq!(normalize_key_date("", today), today);
        assert_eq!(normalize_key_date("2024-13-45", today), today);
    }

    #[test]
    fn test_other_date_formats() {
        let today = ymd(2024, 6, 1);
        assert_eq!(normalize_key_date("2024年9月10日（周二）", today), ymd(2024, 9, 10));
        assert_eq!(normalize_key_date("2024/09/10", today), ymd(2024, 9, 10));
        assert_eq!(normalize_key_date("9月10日", today), ymd(2024, 9, 10));
        assert_eq!(normalize_key_date("1月15日", today), ymd(2025, 1, 15));
    }

    #[test]
    fn test_leap_day_rolls_to_feb_28() {
        assert_eq!(
            normalize_key_date("2024-02-29", ymd(2024, 6, 1)),
            ymd(2025, 2, 28)
        );
    }
}
