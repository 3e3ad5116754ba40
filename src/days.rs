use std::ops::RangeInclusive;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::ScheduleError;

/// How malformed day segments are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Drop malformed segments and keep going (logged at warn level).
    #[default]
    Lenient,
    /// Reject the whole day-range text on the first malformed segment.
    Strict,
}

/// Policy used when nothing else is configured. Lenient parsing silently
/// drops typos in clinical day ranges; pass `--strict` to catch them.
pub const DEFAULT_PARSE_POLICY: ParsePolicy = ParsePolicy::Lenient;

const RANGE_SEPARATOR: &str = "to";

/// A segment that was dropped under the lenient policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSegment {
    pub segment: String,
    pub reason: String,
}

/// Result of resolving a day-range text.
///
/// Ranges are kept unexpanded; a single day is a one-day range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDays {
    /// Inclusive day ranges in document order. Backwards ranges are empty.
    pub ranges: Vec<RangeInclusive<u32>>,
    pub skipped: Vec<SkippedSegment>,
}

impl ParsedDays {
    /// Day offsets in document order, duplicates preserved.
    pub fn days(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }

    pub fn day_count(&self) -> u64 {
        self.ranges.iter().map(range_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.day_count() == 0
    }
}

fn range_len(range: &RangeInclusive<u32>) -> u64 {
    if range.is_empty() {
        0
    } else {
        u64::from(range.end() - range.start()) + 1
    }
}

/// Highest day number that can be dated from any anchor chrono supports.
pub fn max_calendar_day() -> u32 {
    let span = NaiveDate::MAX.signed_duration_since(NaiveDate::MIN).num_days();
    u32::try_from(span + 1).unwrap_or(u32::MAX)
}

/// Parse day-range text such as `"2 to 5, 9 to 12, 15"` into day offsets.
///
/// Never fails: unparsable segments are dropped.
/// - `"3"` -> `[3]`
/// - `"2 to 5"` -> `[2, 3, 4, 5]`
/// - `"5 to 2"` -> `[]` (backwards ranges are empty, never swapped)
/// - `"a, 3, b to c"` -> `[3]`
///
/// Segments reaching past [`max_calendar_day`] are dropped too, since none
/// of their later days could ever land on a date.
pub fn parse_days(text: &str) -> Vec<u32> {
    let Ok(parsed) = parse_days_with(text, ParsePolicy::Lenient) else {
        return Vec::new(); // lenient parsing has no error path
    };

    let limit = max_calendar_day();
    parsed
        .ranges
        .into_iter()
        .filter(|range| {
            let datable = range.is_empty() || *range.end() <= limit;
            if !datable {
                warn!(end = *range.end(), limit, "skipping day range beyond calendar range");
            }
            datable
        })
        .flatten()
        .collect()
}

/// Parse day-range text under an explicit policy.
///
/// Segments are separated by commas and trimmed. Empty segments are ignored
/// under both policies.
pub fn parse_days_with(text: &str, policy: ParsePolicy) -> Result<ParsedDays, ScheduleError> {
    let mut parsed = ParsedDays::default();

    for raw in text.split(',') {
        let segment = raw.trim();
        if segment.is_empty() {
            continue;
        }

        match parse_segment(segment) {
            Ok(range) => parsed.ranges.push(range),
            Err(reason) => match policy {
                ParsePolicy::Strict => {
                    return Err(ScheduleError::MalformedSegment {
                        segment: segment.to_string(),
                        reason,
                    });
                }
                ParsePolicy::Lenient => {
                    warn!(segment, %reason, text, "skipping malformed day segment");
                    parsed.skipped.push(SkippedSegment {
                        segment: segment.to_string(),
                        reason,
                    });
                }
            },
        }
    }

    Ok(parsed)
}

fn parse_segment(segment: &str) -> Result<RangeInclusive<u32>, String> {
    let tokens: Vec<&str> = segment.split_whitespace().collect();

    if !tokens.contains(&RANGE_SEPARATOR) {
        let day = parse_day(segment)?;
        return Ok(day..=day);
    }

    match tokens.as_slice() {
        [start, sep, end] if *sep == RANGE_SEPARATOR => {
            let start = parse_day(start)?;
            let end = parse_day(end)?;
            // start > end yields an empty range
            Ok(start..=end)
        }
        _ => Err(format!("expected '<start> {RANGE_SEPARATOR} <end>'")),
    }
}

fn parse_day(token: &str) -> Result<u32, String> {
    match token.parse::<u32>() {
        Ok(0) => Err("day numbers start at 1".to_string()),
        Ok(day) => Ok(day),
        Err(_) => Err(format!("'{token}' is not a day number")),
    }
}

/// Render day ranges as compact day-range text.
///
/// Empty ranges are left out and ranges that continue each other merge,
/// so `[1..=1, 2..=3, 8..=8]` becomes `"1 to 3, 8"`. Order is kept as given.
pub fn format_ranges(ranges: &[RangeInclusive<u32>]) -> String {
    let mut merged: Vec<(u32, u32)> = Vec::new();

    for range in ranges.iter().filter(|r| !r.is_empty()) {
        let (start, end) = (*range.start(), *range.end());
        if let Some(last) = merged.last_mut() {
            if last.1.checked_add(1) == Some(start) {
                last.1 = end;
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start} {RANGE_SEPARATOR} {end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render day offsets back into compact day-range text.
///
/// Runs of consecutive days collapse into `A to B`; order is kept as given,
/// so `[1, 2, 3, 8]` becomes `"1 to 3, 8"`.
pub fn format_days(days: &[u32]) -> String {
    let ranges: Vec<RangeInclusive<u32>> = days.iter().map(|&d| d..=d).collect();
    format_ranges(&ranges)
}
