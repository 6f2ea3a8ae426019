//! 推送日期计算
//!
//! 纯函数，不读取系统时钟。

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

/// 推送日规则
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRule {
    /// 提前的周数，至少为 1
    pub weeks_before: u32,
    /// 对齐到的星期
    pub weekday: Weekday,
    /// 推送时刻
    pub time: NaiveTime,
}

impl DeliveryRule {
    pub fn date_for(&self, key_date: NaiveDate) -> NaiveDate {
        compute_delivery_date(key_date, self.weeks_before, self.weekday)
    }
}

/// 重要日期往前推 `weeks_before` 周，再取所在周（周一开始）中的 `weekday`
///
/// `weeks_before` 小于 1 时按 1 计算，保证结果早于 `key_date`。
pub fn compute_delivery_date(key_date: NaiveDate, weeks_before: u32, weekday: Weekday) -> NaiveDate {
    let weeks = i64::from(weeks_before.max(1));
    let shifted = key_date - Duration::days(weeks * 7);
    let week_start = shifted - Duration::days(i64::from(shifted.weekday().num_days_from_monday()));
    week_start + Duration::days(i64::from(weekday.num_days_from_monday()))
}
