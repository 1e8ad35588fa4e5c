mod charset;
mod config;
mod date_format;
mod engine;
mod entry;
mod error;
mod exif_reader;
mod executor;
mod fs_ops;
mod journal;
mod planner;
mod resolver;
mod rule;
mod sanitize;
mod transform;

pub use charset::CharSet;
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use date_format::{parse_date_format, render_date, DatePart, DateToken, DEFAULT_DATE_FORMAT};
pub use engine::{BatchState, Engine, ExecuteReport, Job, PlanRequest};
pub use entry::{EntryKind, FileEntry};
pub use error::{EngineError, FailureReason, IssueKind, RuleError};
pub use executor::{
    execute, execute_with, BatchEntry, BatchOutcome, BatchRecord, CancelToken, ExecuteOptions,
    FailurePolicy, OpStatus,
};
pub use fs_ops::{RenameFs, StdFs};
pub use journal::{UndoEntry, UndoJournal, UndoOutcome, UndoReport};
pub use planner::{
    build_plan, load_plan, relative_to_root, save_plan, PlanIssue, PlanOptions, RenameOp,
    RenamePlan, RenameStats,
};
pub use resolver::{resolve, Candidate, FolderListing, Resolution, MAX_DISAMBIGUATION};
pub use rule::{parse_replacement, CompiledRule, RenameRule, MAX_PADDING, MAX_SEQUENTIAL_START};
pub use sanitize::human_readable_size;
pub use transform::{transform, NamingPolicy, TransformContext};
