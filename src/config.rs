//! Runtime configuration, resolved once in `main` and passed down.

use std::path::PathBuf;

use crate::days::{ParsePolicy, DEFAULT_PARSE_POLICY};
use crate::error::ScheduleError;
use crate::schedule::{EventDuration, ProjectOptions};
use crate::store::default_store_path;
use crate::time::parse_slot_time;

pub const STORE_ENV: &str = "ONCOCAL_STORE";
pub const DURATION_ENV: &str = "ONCOCAL_DURATION";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store_path: PathBuf,
    pub options: ProjectOptions,
}

/// Raw settings gathered from flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub store: Option<PathBuf>,
    pub duration: Option<String>,
    pub slot_time: Option<String>,
    pub strict: bool,
}

impl Settings {
    /// Fills unset values from `ONCOCAL_STORE` and `ONCOCAL_DURATION`.
    pub fn with_env(mut self) -> Self {
        if self.store.is_none() {
            self.store = std::env::var_os(STORE_ENV).map(PathBuf::from);
        }
        if self.duration.is_none() {
            self.duration = std::env::var(DURATION_ENV).ok();
        }
        self
    }
}

impl Config {
    pub fn resolve(settings: Settings) -> Result<Self, ScheduleError> {
        let store_path = settings.store.unwrap_or_else(default_store_path);

        let mut duration = match settings.duration.as_deref() {
            Some(text) => text.parse::<EventDuration>()?,
            None => EventDuration::default(),
        };

        if let Some(text) = settings.slot_time.as_deref() {
            let start = parse_slot_time(text)
                .ok_or_else(|| ScheduleError::InvalidTime(text.to_string()))?;
            // --at only means something for slot events
            if let EventDuration::OneHourSlot { .. } = duration {
                duration = EventDuration::OneHourSlot { start };
            }
        }

        let parse_policy = if settings.strict {
            ParsePolicy::Strict
        } else {
            DEFAULT_PARSE_POLICY
        };

        Ok(Config {
            store_path,
            options: ProjectOptions::new(duration, parse_policy),
        })
    }
}
