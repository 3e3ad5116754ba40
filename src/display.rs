use crate::days::{format_ranges, parse_days_with, ParsePolicy};
use crate::schedule::{EventEnd, ScheduleEvent, TreatmentSpec};

/// One summary line per treatment: `"<medication>: Days <days> <dose>"`.
///
/// Day text that does not parse cleanly, or that contains a backwards range
/// such as `5 to 2`, is shown as entered.
pub fn protocol_text(treatments: &[TreatmentSpec]) -> String {
    treatments
        .iter()
        .map(|t| {
            let days = match parse_days_with(&t.day_range_text, ParsePolicy::Strict) {
                Ok(parsed) if !parsed.ranges.iter().any(|r| r.is_empty()) => {
                    format_ranges(&parsed.ranges)
                }
                _ => t.day_range_text.trim().to_string(),
            };
            format!("{}: Days {} {}", t.medication, days, t.dose)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_event_line(event: &ScheduleEvent) -> String {
    let when = match event.end {
        EventEnd::AllDay => "all day".to_string(),
        EventEnd::At(end) => format!("{}-{}", event.start.format("%H:%M"), end.format("%H:%M")),
    };
    format!(
        "  {}  {:<11}  {}  ({})",
        event.date.format("%a %Y-%m-%d"),
        when,
        event.title,
        event.description
    )
}

pub fn print_events(heading: &str, events: &[ScheduleEvent]) {
    if events.is_empty() {
        println!("No treatments scheduled.");
        return;
    }

    println!("\n{}", heading);
    println!("{}", "=".repeat(60));
    for event in events {
        println!("{}", format_event_line(event));
    }
    println!("\n  {} event(s)", events.len());
    println!();
}

pub fn events_json(events: &[ScheduleEvent]) -> Result<String, serde_json::Error> {
    let wire: Vec<_> = events.iter().map(ScheduleEvent::to_wire).collect();
    serde_json::to_string_pretty(&wire)
}
