//! Five-field cron expression validation.
//!
//! Advisory, purely syntactic: a valid expression tokenizes into exactly
//! five fields (minute, hour, day-of-month, month, day-of-week), each being
//! `*`, a bounded integer, a bounded range `a-b`, or a comma-separated list
//! of integers and ranges. Semantic calendar checks (day 31 in February) are
//! out of scope, as is computing next-fire times.

use thiserror::Error;

/// Position of a field inside a cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::Minute,
        Field::Hour,
        Field::DayOfMonth,
        Field::Month,
        Field::DayOfWeek,
    ];

    fn name(self) -> &'static str {
        match self {
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day",
            Field::Month => "month",
            Field::DayOfWeek => "day_of_week",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            Field::Minute => (0, 59),
            Field::Hour => (0, 23),
            Field::DayOfMonth => (1, 31),
            Field::Month => (1, 12),
            Field::DayOfWeek => (0, 6),
        }
    }
}

/// Why a cron expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCron {
    #[error("expected 5 fields (minute hour day month day_of_week), found {found}")]
    FieldCount { found: usize },

    #[error("{field} field '{value}' is not a number, a range, a list or '*'")]
    Malformed { field: &'static str, value: String },

    #[error("{field} value {value} is out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Validate a five-field cron expression.
pub fn validate(expression: &str) -> Result<(), InvalidCron> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(InvalidCron::FieldCount {
            found: fields.len(),
        });
    }

    for (raw, field) in fields.iter().zip(Field::ALL) {
        validate_field(raw, field)?;
    }

    Ok(())
}

fn validate_field(raw: &str, field: Field) -> Result<(), InvalidCron> {
    // The wildcard only stands alone, never inside a list.
    if raw == "*" {
        return Ok(());
    }

    for item in raw.split(',') {
        match item.split_once('-') {
            Some((start, end)) => {
                check_value(start, field, raw)?;
                check_value(end, field, raw)?;
            }
            None => check_value(item, field, raw)?,
        }
    }

    Ok(())
}

fn check_value(text: &str, field: Field, raw: &str) -> Result<(), InvalidCron> {
    let malformed = || InvalidCron::Malformed {
        field: field.name(),
        value: raw.to_string(),
    };

    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let value: u32 = text.parse().map_err(|_| malformed())?;

    let (min, max) = field.bounds();
    if value < min || value > max {
        return Err(InvalidCron::OutOfRange {
            field: field.name(),
            value,
            min,
            max,
        });
    }

    Ok(())
}
