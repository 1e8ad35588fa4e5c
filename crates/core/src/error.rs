use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Rule problems caught before the filesystem is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("bad-character set is empty")]
    EmptyCharSet,
    #[error("invalid character range {start:?}-{end:?}")]
    InvalidRange { start: char, end: char },
    #[error("invalid code point escape: {0}")]
    InvalidCodePoint(String),
    #[error("replacement must be exactly one character, got {0:?}")]
    ReplacementTooLong(String),
    #[error("replacement character {0:?} is not allowed in file names")]
    IllegalReplacement(char),
    #[error("sequential start {start} exceeds the maximum of {max}")]
    StartOutOfRange { start: u64, max: u64 },
    #[error("padding width {width} exceeds the maximum of {max}")]
    PaddingOutOfRange { width: usize, max: usize },
    #[error("regex pattern is empty")]
    EmptyPattern,
    #[error("regex does not compile: {0}")]
    Compile(String),
    #[error("date template is empty")]
    EmptyDateFormat,
    #[error("reserved-name suffix {0:?} is empty or not allowed in file names")]
    InvalidReservedSuffix(String),
    #[error("placeholder name {0:?} is not a valid file name")]
    InvalidPlaceholder(String),
}

/// Errors that stop an engine request as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] RuleError),
    #[error("root folder does not exist: {0}")]
    RootNotFound(PathBuf),
    #[error("root folder is not accessible: {0}")]
    RootPermission(PathBuf),
    #[error("root is not a folder: {0}")]
    RootNotDirectory(PathBuf),
    #[error("another batch is already running")]
    Busy,
    #[error("there is no batch to undo")]
    NoHistory,
    #[error("nothing has been planned yet")]
    NoPreviousPlan,
    #[error("background worker stopped unexpectedly")]
    Worker,
}

/// Why one entry was left out of a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IssueKind {
    NotFound,
    PermissionDenied,
    CollisionUnresolvable,
    InvalidName,
    Io,
}

impl IssueKind {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => IssueKind::NotFound,
            io::ErrorKind::PermissionDenied => IssueKind::PermissionDenied,
            _ => IssueKind::Io,
        }
    }
}

/// Why a single rename did not happen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureReason {
    Disappeared,
    DestinationOccupied,
    PermissionDenied,
    CrossDevice,
    Io(String),
}

impl FailureReason {
    /// Maps a failed rename call. `Disappeared` only comes from the pre-rename check, so a
    /// `NotFound` here (for example a missing destination folder) stays an ordinary failure.
    pub fn from_io(err: &io::Error) -> Self {
        if is_cross_device(err) {
            return FailureReason::CrossDevice;
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => FailureReason::PermissionDenied,
            io::ErrorKind::AlreadyExists => FailureReason::DestinationOccupied,
            _ => FailureReason::Io(err.to_string()),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Disappeared => write!(f, "source disappeared"),
            FailureReason::DestinationOccupied => write!(f, "destination already exists"),
            FailureReason::PermissionDenied => write!(f, "permission denied"),
            FailureReason::CrossDevice => write!(f, "cannot rename across devices"),
            FailureReason::Io(message) => write!(f, "{message}"),
        }
    }
}

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    // EXDEV
    err.raw_os_error() == Some(18)
}

#[cfg(windows)]
fn is_cross_device(err: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    err.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}
