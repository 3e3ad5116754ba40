use std::path::PathBuf;

/// Errors raised while resolving day ranges or projecting a schedule.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("malformed day segment '{segment}': {reason}")]
    MalformedSegment { segment: String, reason: String },
    #[error("invalid anchor date '{0}' (expected YYYY-MM-DD)")]
    InvalidAnchorDate(String),
    #[error("day {day} from {anchor} falls outside the supported calendar range")]
    DateOutOfRange { day: u32, anchor: chrono::NaiveDate },
    #[error("unknown event duration '{0}' (expected 'one-hour-slot' or 'all-day')")]
    UnknownDuration(String),
    #[error("invalid time '{0}'")]
    InvalidTime(String),
}

/// Errors raised by the protocol store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read protocol store {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write protocol store {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "protocol store {} is corrupted (backup at {}): {source}",
        .path.display(),
        .backup.display()
    )]
    Corrupted {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize protocol store: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to parse legacy protocol file {}: {source}", .path.display())]
    LegacyFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("protocol '{0}' not found")]
    ProtocolNotFound(String),
    #[error("protocol '{protocol}' has no version '{version}'")]
    VersionNotFound { protocol: String, version: String },
    #[error("protocol '{protocol}' has no phase '{phase}'")]
    PhaseNotFound { protocol: String, phase: String },
    #[error("protocol '{protocol}' version '{version}' already exists (use --replace)")]
    AlreadyExists { protocol: String, version: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
