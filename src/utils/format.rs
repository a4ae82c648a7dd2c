/// 时间格式化工具
///
/// 秒数与 `m:ss` / `h:mm:ss` 字符串之间的转换
use crate::error::ValidationError;

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    }
}

/// 格式化为 `m:ss`，分钟不补零；非法输入按 0 处理
pub fn format_duration(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{}:{:02}", total / 60, total % 60)
}

/// 超过一小时时格式化为 `h:mm:ss`，否则为 `m:ss`
pub fn format_duration_full(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    let hours = total / 3600;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, (total % 3600) / 60, total % 60)
    } else {
        format_duration(seconds)
    }
}

/// 解析 `h:mm:ss` 或 `m:ss` 为秒数
///
/// # 参数
/// - `value`: 用户输入的时间戳
///
/// # 返回
/// 总秒数；格式不对时返回 `InvalidTimestamp`
pub fn parse_timestamp(value: &str) -> Result<f64, ValidationError> {
    let invalid = || ValidationError::InvalidTimestamp {
        value: value.to_string(),
    };

    let parts = value
        .trim()
        .split(':')
        .map(|part| part.trim().parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    let total = match parts.as_slice() {
        [minutes, seconds] if *seconds < 60 => minutes
            .checked_mul(60)
            .and_then(|total| total.checked_add(*seconds)),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => hours
            .checked_mul(3600)
            .and_then(|total| total.checked_add(minutes * 60 + seconds)),
        _ => None,
    };
    total.map(|total| total as f64).ok_or_else(invalid)
}

/// Markdown 时间戳链接：`[m:ss](#t=N)`
pub fn timestamp_link(seconds: f64) -> String {
    format!("[{}](#t={})", format_duration_full(seconds), whole_seconds(seconds))
}
