//! Date and time tools.
//!
//! Five tools share a default timezone taken from configuration:
//! `get_current_time`, `get_current_date`, `get_timestamp`, `format_date` and
//! `get_timezone`. Formatting logic lives in plain functions over an explicit
//! instant so it can be tested without a clock.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};

use super::pattern::to_strftime;
use crate::error::ToolError;
use crate::tools::tool::{FnTool, Tool};
use crate::tools::types::ToolParameters;

/// Timestamps strictly above this are read as milliseconds.
pub const MILLISECOND_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Input formats tried in order when `format_date` gets no `inputFormat`.
pub const COMMON_INPUT_FORMATS: [&str; 5] = [
    "yyyy-MM-dd",
    "MM/dd/yyyy",
    "dd/MM/yyyy",
    "yyyy-MM-dd'T'HH:mm:ss",
    "yyyy-MM-dd HH:mm:ss",
];

pub fn all_tools(default_tz: Tz) -> Vec<Arc<dyn Tool>> {
    vec![
        current_time_tool(default_tz),
        current_date_tool(default_tz),
        timestamp_tool(),
        format_date_tool(default_tz),
        timezone_tool(default_tz),
    ]
}

pub fn current_time_tool(default_tz: Tz) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_current_time",
        "Get the current time in a specified format",
        ToolParameters::object()
            .string("format", "Time format (e.g., 'HH:mm', '12-hour', '24-hour')", false)
            .string(
                "timezone",
                "Timezone identifier (e.g., 'UTC', 'America/New_York'). Defaults to system timezone.",
                false,
            )
            .build(),
        move |args, _ctx| async move {
            let tz = resolve_timezone(args.get_str_opt("timezone"), default_tz)?;
            Ok(current_time(Utc::now(), tz, args.get_str_opt("format")))
        },
    ))
}

pub fn current_date_tool(default_tz: Tz) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_current_date",
        "Get the current date in a specified format",
        ToolParameters::object()
            .string(
                "format",
                "Date format (e.g., 'YYYY-MM-DD', 'MM/DD/YYYY', 'long', 'short')",
                false,
            )
            .string("timezone", "Timezone identifier. Defaults to system timezone.", false)
            .build(),
        move |args, _ctx| async move {
            let tz = resolve_timezone(args.get_str_opt("timezone"), default_tz)?;
            Ok(current_date(Utc::now(), tz, args.get_str_opt("format")))
        },
    ))
}

pub fn timestamp_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_timestamp",
        "Get the current Unix timestamp",
        ToolParameters::object()
            .string_enum("unit", "Timestamp unit", &["seconds", "milliseconds"], false)
            .build(),
        |args, _ctx| async move { timestamp(Utc::now(), args.get_str_opt("unit")) },
    ))
}

pub fn format_date_tool(default_tz: Tz) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "format_date",
        "Format a given date string or timestamp to a different format",
        ToolParameters::object()
            .string("input", "Input date string or timestamp to format", true)
            .string(
                "inputFormat",
                "Format of the input date (e.g., 'YYYY-MM-DD', 'timestamp')",
                false,
            )
            .string("outputFormat", "Desired output format", true)
            .string("timezone", "Timezone for the output", false)
            .build(),
        move |args, _ctx| async move {
            let input = args.get_str("input")?;
            let output_format = args.get_str("outputFormat")?;
            let output_tz = resolve_timezone(args.get_str_opt("timezone"), default_tz)?;
            format_date(
                input,
                args.get_str_opt("inputFormat"),
                output_format,
                default_tz,
                output_tz,
            )
        },
    ))
}

pub fn timezone_tool(default_tz: Tz) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_timezone",
        "Get information about the current or specified timezone",
        ToolParameters::object()
            .string(
                "timezone",
                "Timezone identifier. If not provided, returns current system timezone info.",
                false,
            )
            .build(),
        move |args, _ctx| async move {
            let tz = resolve_timezone(args.get_str_opt("timezone"), default_tz)?;
            Ok(timezone_info(Utc::now(), tz))
        },
    ))
}

/// Look up an IANA identifier, falling back to `default` when none is given.
pub fn resolve_timezone(name: Option<&str>, default: Tz) -> Result<Tz, ToolError> {
    match name {
        None => Ok(default),
        Some(name) => name
            .trim()
            .parse::<Tz>()
            .map_err(|_| ToolError::InvalidTimezone(name.to_string())),
    }
}

pub fn current_time(now: DateTime<Utc>, tz: Tz, format: Option<&str>) -> String {
    let pattern = match format.unwrap_or("24-hour") {
        "12-hour" => "h:mm:ss a",
        "24-hour" | "HH:mm:ss" => "HH:mm:ss",
        "HH:mm" => "HH:mm",
        custom => custom,
    };
    let local = now.with_timezone(&tz);
    format!("{} ({})", local.format(&to_strftime(pattern)), tz.name())
}

pub fn current_date(now: DateTime<Utc>, tz: Tz, format: Option<&str>) -> String {
    let strftime = match format.unwrap_or("YYYY-MM-DD") {
        "YYYY-MM-DD" => to_strftime("yyyy-MM-dd"),
        "MM/DD/YYYY" => to_strftime("MM/dd/yyyy"),
        "DD/MM/YYYY" => to_strftime("dd/MM/yyyy"),
        "short" => to_strftime("M/d/yy"),
        "medium" => to_strftime("MMM d, y"),
        "long" => to_strftime("MMMM d, y"),
        "full" => to_strftime("EEEE, MMMM d, y"),
        custom => to_strftime(custom),
    };
    let local = now.with_timezone(&tz);
    format!("{} ({})", local.format(&strftime), tz.name())
}

pub fn timestamp(now: DateTime<Utc>, unit: Option<&str>) -> Result<String, ToolError> {
    match unit.unwrap_or("seconds") {
        "seconds" => Ok(now.timestamp().to_string()),
        "milliseconds" => Ok(now.timestamp_millis().to_string()),
        other => Err(ToolError::InvalidUnit(other.to_string())),
    }
}

/// Reformat a date string or Unix timestamp.
///
/// Naive inputs are read in `input_tz`; the result is rendered in `output_tz`.
pub fn format_date(
    input: &str,
    input_format: Option<&str>,
    output_format: &str,
    input_tz: Tz,
    output_tz: Tz,
) -> Result<String, ToolError> {
    let input = input.trim();
    let is_timestamp = match input_format {
        Some(format) => format == "timestamp",
        None => !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()),
    };

    let instant = if is_timestamp {
        parse_timestamp(input)?
    } else {
        let naive = match input_format {
            Some(format) => parse_naive(input, format),
            None => COMMON_INPUT_FORMATS
                .iter()
                .find_map(|format| parse_naive(input, format)),
        }
        .ok_or(ToolError::InvalidDateFormat)?;
        input_tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or(ToolError::InvalidDateFormat)?
            .with_timezone(&Utc)
    };

    Ok(instant
        .with_timezone(&output_tz)
        .format(&to_strftime(output_format))
        .to_string())
}

/// Interpret a numeric timestamp, treating values above 10^12 as milliseconds.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ToolError> {
    let value: f64 = input.parse().map_err(|_| ToolError::InvalidDateFormat)?;
    if !value.is_finite() {
        return Err(ToolError::InvalidDateFormat);
    }
    let seconds = if value > MILLISECOND_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).ok_or(ToolError::InvalidDateFormat)
}

fn parse_naive(input: &str, pattern: &str) -> Option<NaiveDateTime> {
    let format = to_strftime(pattern);
    NaiveDateTime::parse_from_str(input, &format).ok().or_else(|| {
        NaiveDate::parse_from_str(input, &format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

pub fn timezone_info(now: DateTime<Utc>, tz: Tz) -> String {
    let local = now.with_timezone(&tz);
    let offset = local.offset();
    let seconds = offset.fix().local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let magnitude = seconds.unsigned_abs();
    let is_dst = !offset.dst_offset().is_zero();

    format!(
        "Timezone: {}\nAbbreviation: {}\nUTC Offset: {}{:02}:{:02}\nIs DST: {}",
        tz.name(),
        local.format("%Z"),
        sign,
        magnitude / 3600,
        (magnitude % 3600) / 60,
        is_dst,
    )
}
