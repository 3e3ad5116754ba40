//! Chemotherapy protocol calendar.
//!
//! Resolves the day-range text of protocol treatments (e.g. `"1 to 4, 8"`)
//! and projects it onto calendar dates from a chosen day 1.

pub mod config;
pub mod days;
pub mod display;
pub mod error;
pub mod reminder;
pub mod schedule;
pub mod store;
pub mod time;

pub use days::{parse_days, parse_days_with, ParsePolicy};
pub use error::{ScheduleError, StoreError};
pub use schedule::{project, EventDuration, ProjectOptions, ScheduleEvent, TreatmentSpec};
pub use store::TreatmentSource;
