use chrono::{
    naive::{NaiveDate, NaiveDateTime, NaiveTime},
    DateTime, Duration, FixedOffset, Local, Utc,
};

/// The wire type of a column, which decides how its string values are parsed
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawCell {
    Fixed,
    Real,
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampLtz,
    TimestampNtz,
    TimestampTz,
    Variant,
    Object,
    Array,
    #[serde(other)]
    Unknown,
}

impl RawCell {
    /// Convert a wire value into a Cell.
    ///
    /// - Decimals are not supported. Number type columns are converted to i128 if possible,
    ///   otherwise f64. So there can be a loss of precision, which is a tradeoff for convenience.
    /// - For the same reason, NUMBER columns can contain mixed types: Int and Float
    /// - A value that does not parse as its declared type is kept as `Varchar`
    pub fn to_cell(&self, value: &Option<String>) -> Cell {
        let Some(value) = value else {
            return Cell::Null;
        };
        self.parse(value)
            .unwrap_or_else(|| Cell::Varchar(value.to_owned()))
    }

    fn parse(&self, value: &str) -> Option<Cell> {
        Some(match self {
            RawCell::Fixed => match value.parse() {
                Ok(value) => Cell::Int(value),
                Err(_) => Cell::Float(value.parse().ok()?),
            },
            RawCell::Real => Cell::Float(value.parse().ok()?),
            RawCell::Text | RawCell::Unknown => Cell::Varchar(value.to_owned()),
            RawCell::Binary => Cell::Binary(hex::decode(value).ok()?),
            RawCell::Boolean => Cell::Boolean(parse_bool(value)?),
            RawCell::Date => {
                Cell::Date(NaiveDate::from_ymd_opt(1970, 1, 1)? + Duration::days(value.parse().ok()?))
            }
            RawCell::Time => {
                let (seconds, nanos) = split_epoch(value)?;
                Cell::Time(NaiveTime::from_num_seconds_from_midnight_opt(
                    u32::try_from(seconds).ok()?,
                    nanos,
                )?)
            }
            RawCell::TimestampLtz => {
                let (seconds, nanos) = split_epoch(value)?;
                Cell::TimestampLtz(DateTime::<Utc>::from_timestamp(seconds, nanos)?.with_timezone(&Local))
            }
            RawCell::TimestampNtz => {
                let (seconds, nanos) = split_epoch(value)?;
                Cell::TimestampNtz(DateTime::<Utc>::from_timestamp(seconds, nanos)?.naive_utc())
            }
            RawCell::TimestampTz => {
                // "<epoch seconds> <offset minutes + 1440>"
                let (epoch, offset) = value.split_once(' ')?;
                let (seconds, nanos) = split_epoch(epoch)?;
                let offset_minutes: i32 = offset.trim().parse::<i32>().ok()? - 1440;
                let offset = FixedOffset::east_opt(offset_minutes * 60)?;
                Cell::TimestampTz(DateTime::<Utc>::from_timestamp(seconds, nanos)?.with_timezone(&offset))
            }
            RawCell::Variant | RawCell::Object | RawCell::Array => {
                Cell::Variant(serde_json::from_str(value).ok()?)
            }
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" => Some(true),
        "0" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Split "1672534861.123456789" into whole seconds and nanoseconds
fn split_epoch(value: &str) -> Option<(i64, u32)> {
    let (seconds, fraction) = value.split_once('.').unwrap_or((value, ""));
    let seconds: i64 = seconds.parse().ok()?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(9).collect();
        digits.parse().ok()?
    };
    if seconds < 0 && nanos > 0 {
        // -1.5 means one and a half seconds before the epoch
        Some((seconds - 1, 1_000_000_000 - nanos))
    } else {
        Some((seconds, nanos))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Int(i128),
    Float(f64),
    Varchar(String),
    Binary(Vec<u8>),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    TimestampLtz(DateTime<Local>),
    TimestampNtz(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Variant(serde_json::Value),
}

impl From<Cell> for serde_json::Value {
    fn from(cell: Cell) -> Self {
        use serde_json::json;
        use Cell::*;
        match cell {
            Null => json!(null),
            Int(value) => json!(value),
            Float(value) => json!(value),
            Varchar(value) => json!(value),
            Binary(value) => json!(hex::encode(value)),
            Boolean(value) => json!(value),
            Date(value) => json!(value),
            Time(value) => json!(value),
            TimestampLtz(value) => json!(value),
            TimestampNtz(value) => json!(value),
            TimestampTz(value) => json!(value),
            Variant(value) => value,
        }
    }
}
