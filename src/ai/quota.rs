use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::AiError;
use crate::db::quota as quota_db;

#[derive(Debug, Clone, Serialize)]
pub struct QuotaInfo {
    pub daily_limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub percentage: f64,
    pub reset_time: DateTime<Utc>,
    pub can_call: bool,
    pub retry_after: Option<DateTime<Utc>>,
    pub message: String,
}

/// Next UTC midnight after `now`
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now + Duration::days(1))
}

pub fn quota_info(conn: &Connection, daily_limit: i64, now: DateTime<Utc>) -> rusqlite::Result<QuotaInfo> {
    let used = quota_db::get_usage(conn, now)?;
    Ok(build_info(daily_limit, used, now))
}

fn build_info(daily_limit: i64, used: i64, now: DateTime<Utc>) -> QuotaInfo {
    let remaining = (daily_limit - used).max(0);
    let percentage = if daily_limit > 0 {
        ((used as f64 / daily_limit as f64) * 1000.0).round() / 10.0
    } else {
        100.0
    };
    let can_call = remaining > 0;
    let reset_time = next_reset(now);
    let reset_str = reset_time.format("%Y-%m-%d %H:%M UTC");

    let message = if !can_call {
        format!("Daily AI quota used up ({}/{} calls), resets at {}", used, daily_limit, reset_str)
    } else if percentage > 90.0 {
        format!("Daily AI quota almost used up ({} calls left), resets at {}", remaining, reset_str)
    } else if percentage > 75.0 {
        format!("{:.1}% of daily AI quota used ({} calls left)", percentage, remaining)
    } else {
        format!("Daily AI quota available ({} / {} calls left)", remaining, daily_limit)
    };

    QuotaInfo {
        daily_limit,
        used,
        remaining,
        percentage,
        reset_time,
        can_call,
        retry_after: (!can_call).then_some(reset_time),
        message,
    }
}

/// Reserve one call from today's budget or fail with a quota error
pub fn track_call(conn: &Connection, daily_limit: i64, now: DateTime<Utc>) -> Result<i64, AiError> {
    match quota_db::try_increment(conn, daily_limit, now) {
        Ok(Some(used)) => Ok(used),
        Ok(None) => Err(AiError::Quota {
            message: format!("Daily AI quota of {} calls exceeded", daily_limit),
            retry_after: Some(next_reset(now)),
        }),
        Err(e) => Err(AiError::Storage(e.to_string())),
    }
}
