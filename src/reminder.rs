use chrono::NaiveDate;
use notify_rust::Notification;
use tracing::{info, warn};

use crate::schedule::{events_on, EventEnd, ScheduleEvent};

/// Notification body for the treatments due on one date, or `None` if
/// nothing is scheduled.
pub fn agenda_body(events: &[ScheduleEvent], date: NaiveDate) -> Option<String> {
    let due = events_on(events, date);
    if due.is_empty() {
        return None;
    }

    let lines: Vec<String> = due
        .iter()
        .map(|e| match e.end {
            EventEnd::At(_) => format!(
                "{} {} ({})",
                e.start.format("%H:%M"),
                e.title,
                e.description
            ),
            EventEnd::AllDay => format!("{} ({})", e.title, e.description),
        })
        .collect();
    Some(lines.join("\n"))
}

/// Sends a desktop notification listing the treatments due on `date`.
/// Returns whether a notification was shown.
pub fn notify_agenda(protocol: &str, events: &[ScheduleEvent], date: NaiveDate) -> bool {
    let Some(body) = agenda_body(events, date) else {
        info!(%date, "no treatments due, skipping notification");
        return false;
    };

    let result = Notification::new()
        .summary(&format!("{} treatments for {}", protocol, date.format("%Y-%m-%d")))
        .body(&body)
        .icon("medication")
        .timeout(0) // Don't auto-dismiss
        .show();

    match result {
        Ok(_) => {
            info!(%date, protocol, "agenda notification sent");
            true
        }
        Err(e) => {
            warn!(error = %e, %date, "failed to send agenda notification");
            false
        }
    }
}
