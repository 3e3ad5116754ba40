use chrono::NaiveTime;

/// Parse the start time of a one-hour treatment slot.
///
/// Accepts:
/// - Named times: "morning" (08:00), "noon" (12:00), "evening" (18:00), ...
/// - HH:MM format: "08:00", "8:30", "8:5"
/// - Hour only: "8", "14" (defaults to :00)
pub fn parse_slot_time(time_str: &str) -> Option<NaiveTime> {
    let trimmed = time_str.trim();

    let named = match trimmed.to_lowercase().as_str() {
        "morning" => Some((8, 0)),
        "midmorning" | "mid-morning" => Some((10, 0)),
        "noon" | "midday" => Some((12, 0)),
        "afternoon" => Some((15, 0)),
        "evening" => Some((18, 0)),
        "night" => Some((21, 0)),
        "midnight" => Some((0, 0)),
        _ => None,
    };

    let (hour, minute) = match named {
        Some(hm) => hm,
        None => match trimmed.split_once(':') {
            Some((h, m)) => (h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?),
            None => (trimmed.parse::<u32>().ok()?, 0),
        },
    };

    // from_hms_opt rejects hour >= 24 and minute >= 60
    NaiveTime::from_hms_opt(hour, minute, 0)
}
