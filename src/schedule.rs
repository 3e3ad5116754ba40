use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::days::{parse_days_with, ParsePolicy, DEFAULT_PARSE_POLICY};
use crate::error::ScheduleError;

const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const ANCHOR_FORMAT: &str = "%Y-%m-%d";

/// One treatment line of a protocol phase, as supplied by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentSpec {
    pub medication: String,
    pub dose: String,
    /// Raw day-range text, e.g. "2 to 5, 9, 12 to 14"
    pub day_range_text: String,
}

impl TreatmentSpec {
    pub fn new(
        medication: impl Into<String>,
        dose: impl Into<String>,
        days: impl Into<String>,
    ) -> Self {
        TreatmentSpec {
            medication: medication.into(),
            dose: dose.into(),
            day_range_text: days.into(),
        }
    }
}

/// How the end of each event is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDuration {
    /// A one-hour slot starting at `start` on the treatment day.
    OneHourSlot { start: NaiveTime },
    /// A whole-day event with no explicit end.
    AllDay,
}

impl Default for EventDuration {
    fn default() -> Self {
        EventDuration::OneHourSlot {
            start: NaiveTime::MIN,
        }
    }
}

impl FromStr for EventDuration {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one-hour-slot" | "one-hour" | "slot" => Ok(EventDuration::default()),
            "all-day" | "allday" => Ok(EventDuration::AllDay),
            _ => Err(ScheduleError::UnknownDuration(s.to_string())),
        }
    }
}

impl fmt::Display for EventDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventDuration::OneHourSlot { .. } => write!(f, "one-hour-slot"),
            EventDuration::AllDay => write!(f, "all-day"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectOptions {
    pub duration: EventDuration,
    pub parse_policy: ParsePolicy,
}

impl ProjectOptions {
    pub fn new(duration: EventDuration, parse_policy: ParsePolicy) -> Self {
        ProjectOptions {
            duration,
            parse_policy,
        }
    }
}

/// End boundary of a projected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEnd {
    At(NaiveDateTime),
    AllDay,
}

/// A dated treatment occurrence, ready for a display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEvent {
    pub title: String,
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: EventEnd,
    pub description: String,
}

impl ScheduleEvent {
    pub fn is_all_day(&self) -> bool {
        matches!(self.end, EventEnd::AllDay)
    }

    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            title: self.title.clone(),
            start: self.start.format(WIRE_DATETIME_FORMAT).to_string(),
            end: match self.end {
                EventEnd::At(end) => Some(end.format(WIRE_DATETIME_FORMAT).to_string()),
                EventEnd::AllDay => None,
            },
            all_day: self.is_all_day(),
            description: self.description.clone(),
        }
    }
}

/// Calendar-widget JSON shape of an event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub all_day: bool,
    pub description: String,
}

/// Parse a clinician-chosen day 1 in `YYYY-MM-DD` form.
pub fn parse_anchor(text: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(text.trim(), ANCHOR_FORMAT)
        .map_err(|_| ScheduleError::InvalidAnchorDate(text.to_string()))
}

/// Project treatments onto the calendar with day 1 at `anchor`.
///
/// Emits one event per (treatment, resolved day) in treatment-then-day
/// order. Events are not sorted by date and duplicates are kept.
pub fn project(
    treatments: &[TreatmentSpec],
    anchor: NaiveDate,
    options: &ProjectOptions,
) -> Result<Vec<ScheduleEvent>, ScheduleError> {
    let mut events = Vec::new();

    for treatment in treatments {
        let parsed = parse_days_with(&treatment.day_range_text, options.parse_policy)?;

        for range in parsed.ranges.iter().filter(|r| !r.is_empty()) {
            // days only grow within a range, so a datable end means every day is datable
            let last = *range.end();
            if day_to_date(anchor, last).is_none() {
                if options.parse_policy == ParsePolicy::Strict {
                    return Err(ScheduleError::DateOutOfRange { day: last, anchor });
                }
                warn!(
                    first = *range.start(),
                    last,
                    %anchor,
                    medication = %treatment.medication,
                    "day range reaches past calendar range, skipping"
                );
                continue;
            }

            events.extend(
                range
                    .clone()
                    .filter_map(|day| day_to_date(anchor, day))
                    .map(|date| build_event(treatment, date, options.duration)),
            );
        }
    }

    debug!(
        treatments = treatments.len(),
        events = events.len(),
        %anchor,
        "projected schedule"
    );
    Ok(events)
}

/// Project with the default duration and the default (lenient) parse policy.
/// Never fails.
pub fn project_lenient(treatments: &[TreatmentSpec], anchor: NaiveDate) -> Vec<ScheduleEvent> {
    let options = ProjectOptions::new(EventDuration::default(), DEFAULT_PARSE_POLICY);
    project(treatments, anchor, &options).unwrap_or_default()
}

fn day_to_date(anchor: NaiveDate, day: u32) -> Option<NaiveDate> {
    anchor.checked_add_days(chrono::Days::new(u64::from(day) - 1))
}

fn build_event(
    treatment: &TreatmentSpec,
    date: NaiveDate,
    duration: EventDuration,
) -> ScheduleEvent {
    let (start, end) = match duration {
        EventDuration::OneHourSlot { start } => {
            let start = date.and_time(start);
            (start, EventEnd::At(start + Duration::hours(1)))
        }
        EventDuration::AllDay => (date.and_time(NaiveTime::MIN), EventEnd::AllDay),
    };

    ScheduleEvent {
        title: treatment.medication.clone(),
        date,
        start,
        end,
        description: treatment.dose.clone(),
    }
}

/// Stable sort by start time, for surfaces that need chronological order.
pub fn sort_chronologically(events: &mut [ScheduleEvent]) {
    events.sort_by_key(|e| e.start);
}

/// Events that fall on `date`, in their original order.
pub fn events_on(events: &[ScheduleEvent], date: NaiveDate) -> Vec<&ScheduleEvent> {
    events.iter().filter(|e| e.date == date).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::days::parse_days;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lenient(duration: EventDuration) -> ProjectOptions {
        ProjectOptions::new(duration, ParsePolicy::Lenient)
    }

    #[test]
    fn test_project_single_treatment() {
        let treatments = vec![TreatmentSpec::new("X", "10mg", "1,3")];
        let events = project_lenient(&treatments, date(2024, 1, 1));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].date, date(2024, 1, 1));
        assert_eq!(events[1].date, date(2024, 1, 3));
        for event in &events {
            assert_eq!(event.title, "X");
            assert_eq!(event.description, "10mg");
        }
    }

    #[test]
    fn test_one_hour_slot_end() {
        let treatments = vec![TreatmentSpec::new("X", "10mg", "2")];
        let events = project_lenient(&treatments, date(2024, 1, 1));

        let start = date(2024, 1, 2).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(events[0].start, start);
        assert_eq!(events[0].end, EventEnd::At(date(2024, 1, 2).and_hms_opt(1, 0, 0).unwrap()));
        assert!(!events[0].is_all_day());
    }

    #[test]
    fn test_slot_start_time_and_midnight_rollover() {
        let start = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        let options = lenient(EventDuration::OneHourSlot { start });
        let treatments = vec![TreatmentSpec::new("X", "1g", "1")];
        let events = project(&treatments, date(2024, 2, 28), &options).unwrap();

        assert_eq!(events[0].date, date(2024, 2, 28));
        let end = date(2024, 2, 29).and_hms_opt(0, 30, 0).unwrap();
        assert_eq!(events[0].end, EventEnd::At(end));
    }

    #[test]
    fn test_all_day_events() {
        let options = lenient(EventDuration::AllDay);
        let treatments = vec![TreatmentSpec::new("X", "1g", "1 to 2")];
        let events = project(&treatments, date(2024, 1, 1), &options).unwrap();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_all_day()));
        let wire = events[1].to_wire();
        assert_eq!(wire.start, "2024-01-02T00:00:00");
        assert_eq!(wire.end, None);
        assert!(wire.all_day);
    }

    #[test]
    fn test_treatment_then_day_order() {
        let treatments = vec![
            TreatmentSpec::new("A", "1", "8, 1"),
            TreatmentSpec::new("B", "2", "3"),
        ];
        let events = project_lenient(&treatments, date(2024, 1, 1));
        let order: Vec<(&str, u32)> = events
            .iter()
            .map(|e| (e.title.as_str(), chrono::Datelike::day(&e.date)))
            .collect();
        assert_eq!(order, vec![("A", 8), ("A", 1), ("B", 3)]);
    }

    #[test]
    fn test_duplicates_yield_duplicate_events() {
        let events = project_lenient(&[TreatmentSpec::new("X", "10mg", "3,3")], date(2024, 1, 1));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], events[1]);
    }

    #[test]
    fn test_event_count_matches_parsed_days() {
        let treatments = vec![
            TreatmentSpec::new("Daunorubicin", "60 mg/m2", "1 to 3"),
            TreatmentSpec::new("Vincristine", "1.4 mg/m2", "1, 8, 15, 22"),
            TreatmentSpec::new("Typo", "x", "1 to, b"),
            TreatmentSpec::new("Empty", "x", ""),
        ];
        let expected: usize = treatments.iter().map(|t| parse_days(&t.day_range_text).len()).sum();
        assert_eq!(project_lenient(&treatments, date(2024, 3, 1)).len(), expected);
        assert_eq!(expected, 7);
    }

    #[test]
    fn test_project_is_idempotent() {
        let treatments = vec![TreatmentSpec::new("X", "10mg", "1 to 4, 10")];
        let anchor = date(2024, 12, 30);
        assert_eq!(project_lenient(&treatments, anchor), project_lenient(&treatments, anchor));
    }

    #[test]
    fn test_empty_treatment_list() {
        assert!(project_lenient(&[], date(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_strict_policy_errors() {
        let options = ProjectOptions::new(EventDuration::AllDay, ParsePolicy::Strict);
        let treatments = vec![TreatmentSpec::new("X", "1", "1, oops")];
        let result = project(&treatments, date(2024, 1, 1), &options);
        assert!(matches!(result, Err(ScheduleError::MalformedSegment { .. })));
    }

    #[test]
    fn test_out_of_range_days() {
        let treatments = vec![TreatmentSpec::new("X", "1", "1, 4000000000")];
        let events = project_lenient(&treatments, date(2024, 1, 1));
        assert_eq!(events.len(), 1);

        let options = ProjectOptions::new(EventDuration::AllDay, ParsePolicy::Strict);
        let result = project(&treatments, date(2024, 1, 1), &options);
        assert!(matches!(
            result,
            Err(ScheduleError::DateOutOfRange { day: 4000000000, .. })
        ));
    }

    #[test]
    fn test_huge_range_is_not_expanded() {
        let treatments = vec![
            TreatmentSpec::new("X", "1", "1 to 4000000000, 3"),
            TreatmentSpec::new("Y", "2", "2"),
        ];
        let events = project_lenient(&treatments, date(2024, 1, 1));
        let dates: Vec<NaiveDate> = events.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 2)]);

        let expected: usize = treatments
            .iter()
            .map(|t| parse_days(&t.day_range_text).len())
            .sum();
        assert_eq!(events.len(), expected);

        let options = ProjectOptions::new(EventDuration::AllDay, ParsePolicy::Strict);
        let result = project(&treatments, date(2024, 1, 1), &options);
        assert!(matches!(
            result,
            Err(ScheduleError::DateOutOfRange { day: 4000000000, .. })
        ));
    }

    #[test]
    fn test_range_at_end_of_calendar() {
        let anchor = NaiveDate::MAX.pred_opt().unwrap();
        let fits = project_lenient(&[TreatmentSpec::new("X", "1", "1 to 2")], anchor);
        assert_eq!(fits.len(), 2);
        assert_eq!(fits[1].date, NaiveDate::MAX);

        let overflows = vec![TreatmentSpec::new("X", "1", "1 to 3")];
        assert!(project_lenient(&overflows, anchor).is_empty());

        let options = ProjectOptions::new(EventDuration::AllDay, ParsePolicy::Strict);
        assert!(matches!(
            project(&overflows, anchor, &options),
            Err(ScheduleError::DateOutOfRange { day: 3, .. })
        ));
    }

    #[test]
    fn test_far_future_day() {
        let events = project_lenient(&[TreatmentSpec::new("X", "1", "367")], date(2024, 1, 1));
        assert_eq!(events[0].date, date(2025, 1, 1));
    }

    #[test]
    fn test_parse_anchor() {
        assert_eq!(parse_anchor("2024-01-01").unwrap(), date(2024, 1, 1));
        assert_eq!(parse_anchor(" 2024-02-29 ").unwrap(), date(2024, 2, 29));
        assert!(matches!(parse_anchor("2023-02-29"), Err(ScheduleError::InvalidAnchorDate(_))));
        assert!(matches!(parse_anchor("01/02/2024"), Err(ScheduleError::InvalidAnchorDate(_))));
        assert!(parse_anchor("").is_err());
    }

    #[test]
    fn test_duration_from_str() {
        assert_eq!("all-day".parse::<EventDuration>().unwrap(), EventDuration::AllDay);
        assert_eq!("One-Hour-Slot".parse::<EventDuration>().unwrap(), EventDuration::default());
        assert!("weekly".parse::<EventDuration>().is_err());
        assert_eq!(EventDuration::AllDay.to_string(), "all-day");
    }

    #[test]
    fn test_wire_json_shape() {
        let events = project_lenient(&[TreatmentSpec::new("X", "10mg", "1")], date(2024, 1, 1));
        let json = serde_json::to_value(events[0].to_wire()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "X",
                "start": "2024-01-01T00:00:00",
                "end": "2024-01-01T01:00:00",
                "allDay": false,
                "description": "10mg"
            })
        );
    }

    #[test]
    fn test_sort_and_filter_helpers() {
        let treatments = vec![
            TreatmentSpec::new("A", "1", "5"),
            TreatmentSpec::new("B", "2", "1, 5"),
        ];
        let mut events = project_lenient(&treatments, date(2024, 1, 1));

        let on_fifth: Vec<&str> = events_on(&events, date(2024, 1, 5))
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(on_fifth, vec!["A", "B"]);

        sort_chronologically(&mut events);
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A", "B"]);
    }
}
