//! Date/time views and formats: `${now.utc.iso8601}`, `${when.millis}`,
//! `${when.+05:30}`, `${when.Asia/Tokyo.rfc1123}`, `${when.yyyyMMdd}`.
//!
//! A zone view (`utc`, `local`, an offset or a named zone) yields another
//! date-time and chains into the next segment. A format view yields text.
//! Anything else is read as a date pattern in the `yyyy-MM-dd HH:mm:ss`
//! letter style, spanning the rest of the path including any `.`.

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use time_tz::{timezones, OffsetDateTimeExt};
use tracing::warn;

use super::{split_first, Selection, Selector};
use crate::types::{format_iso_millis, Value};

#[derive(Debug, Clone, Copy)]
pub struct DateTimeSelector {
    local: UtcOffset,
}

impl DateTimeSelector {
    /// Pin the offset `local` converts to.
    pub fn with_local_offset(local: UtcOffset) -> Self {
        DateTimeSelector { local }
    }

    /// Read the host's local offset once. The platform may refuse (notably
    /// once other threads are running), in which case `local` means UTC.
    pub fn detect() -> Self {
        let local = match UtcOffset::current_local_offset() {
            Ok(offset) => offset,
            Err(e) => {
                warn!(error = %e, "local UTC offset unavailable, `local` date views use UTC");
                UtcOffset::UTC
            }
        };
        DateTimeSelector { local }
    }

    pub fn local_offset(&self) -> UtcOffset {
        self.local
    }
}

impl Default for DateTimeSelector {
    fn default() -> Self {
        Self::detect()
    }
}

impl Selector for DateTimeSelector {
    fn select(&self, context: &Value, path: &str) -> Option<Selection> {
        let Value::DateTime(dt) = context else {
            return None;
        };
        let dt = *dt;
        let (head, rest) = split_first(path);
        let value = match head.to_ascii_lowercase().as_str() {
            "utc" => Value::DateTime(dt.to_offset(UtcOffset::UTC)),
            "local" => Value::DateTime(dt.to_offset(self.local)),
            "millis" => Value::Int(epoch_millis(dt)?),
            "seconds" => Value::Int(dt.unix_timestamp()),
            "iso8601" => Value::Text(format_iso_millis(dt)),
            "rfc1123" => Value::Text(format_rfc1123(dt)?),
            "rfc850" => Value::Text(format_rfc850(dt)?),
            "asctime" => Value::Text(format_asctime(dt)?),
            _ => {
                if let Some(offset) = parse_offset(head) {
                    Value::DateTime(dt.to_offset(offset))
                } else if let Some(tz) = timezones::get_by_name(head) {
                    Value::DateTime(dt.to_timezone(tz))
                } else {
                    return format_pattern(dt, path).map(|s| Selection::done(Value::Text(s)));
                }
            }
        };
        Some(Selection::partial(value, rest))
    }
}

fn epoch_millis(dt: OffsetDateTime) -> Option<i64> {
    i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok()
}

fn format_rfc1123(dt: OffsetDateTime) -> Option<String> {
    let fmt = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    dt.to_offset(UtcOffset::UTC).format(&fmt).ok()
}

fn format_rfc850(dt: OffsetDateTime) -> Option<String> {
    let fmt = format_description!(
        "[weekday], [day]-[month repr:short]-[year repr:last_two] [hour]:[minute]:[second] GMT"
    );
    dt.to_offset(UtcOffset::UTC).format(&fmt).ok()
}

/// C `asctime()` layout in the value's own offset; it names no zone.
fn format_asctime(dt: OffsetDateTime) -> Option<String> {
    let fmt = format_description!(
        "[weekday repr:short] [month repr:short] [day padding:space] [hour]:[minute]:[second] [year]"
    );
    dt.format(&fmt).ok()
}

/// `+hh`, `-hh`, `+hhmm` or `+hh:mm`.
fn parse_offset(s: &str) -> Option<UtcOffset> {
    let sign: i8 = match s.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = s.get(1..)?;
    if !digits.is_ascii() {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits, "00"),
        4 => digits.split_at(2),
        5 if digits.as_bytes()[2] == b':' => (&digits[..2], &digits[3..]),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i8 = hours.parse().ok()?;
    let minutes: i8 = minutes.parse().ok()?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

// ──────────────────────────────────────────────
// Date patterns
// ──────────────────────────────────────────────

fn format_pattern(dt: OffsetDateTime, pattern: &str) -> Option<String> {
    let description = translate_pattern(pattern)?;
    let items = time::format_description::parse(&description).ok()?;
    dt.format(&items).ok()
}

/// Rewrite a letter pattern (`yyyyMMdd'T'HH:mm:ss.SSS`) as a `time` format
/// description. `None` for unknown letters, an unclosed quote, or a pattern
/// with no date or time field at all.
fn translate_pattern(pattern: &str) -> Option<String> {
    let mut description = String::with_capacity(pattern.len() * 2);
    let mut has_field = false;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                description.push('\'');
            }
            '\'' => loop {
                match chars.next()? {
                    '\'' if chars.peek() == Some(&'\'') => {
                        chars.next();
                        description.push('\'');
                    }
                    '\'' => break,
                    '[' => description.push_str("[["),
                    other => description.push(other),
                }
            },
            c if c.is_ascii_alphabetic() => {
                let mut width = 1;
                while chars.peek() == Some(&c) {
                    chars.next();
                    width += 1;
                }
                description.push_str(&pattern_field(c, width)?);
                has_field = true;
            }
            '[' => description.push_str("[["),
            other => description.push(other),
        }
    }
    has_field.then_some(description)
}

fn pattern_field(letter: char, width: usize) -> Option<String> {
    let padded = |name: &str| {
        if width == 1 {
            format!("[{} padding:none]", name)
        } else {
            format!("[{}]", name)
        }
    };
    Some(match letter {
        'y' if width == 2 => "[year repr:last_two]".to_string(),
        'y' => "[year]".to_string(),
        'M' => match width {
            1 => "[month padding:none]".to_string(),
            2 => "[month]".to_string(),
            3 => "[month repr:short]".to_string(),
            _ => "[month repr:long]".to_string(),
        },
        'd' => padded("day"),
        'D' => "[ordinal]".to_string(),
        'H' => padded("hour"),
        'h' if width == 1 => "[hour repr:12 padding:none]".to_string(),
        'h' => "[hour repr:12]".to_string(),
        'm' => padded("minute"),
        's' => padded("second"),
        'S' if width <= 9 => format!("[subsecond digits:{}]", width),
        'E' if width <= 3 => "[weekday repr:short]".to_string(),
        'E' => "[weekday]".to_string(),
        'a' => "[period]".to_string(),
        'Z' => "[offset_hour sign:mandatory][offset_minute]".to_string(),
        'X' if width == 1 => "[offset_hour sign:mandatory]".to_string(),
        'X' if width == 2 => "[offset_hour sign:mandatory][offset_minute]".to_string(),
        'X' => "[offset_hour sign:mandatory]:[offset_minute]".to_string(),
        _ => return None,
    })
}
