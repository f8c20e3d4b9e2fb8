mod config;
mod executor;
mod exif_reader;
mod metadata;
mod mtime;
mod organize;
mod planner;
mod probe;
mod report;
mod resolver;
mod sanitize;
mod sequence;
mod template;

pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use executor::{
    execute_plan, BatchResult, ExecuteOptions, OperationOutcome, OutcomeStatus, TransferError,
};
pub use exif_reader::ExifTagReader;
pub use metadata::{
    NoTags, ResolvedTimestamp, TagMap, TagReadError, TagReader, TimestampSource,
    ORIGINAL_DATE_TIME_TAG,
};
pub use mtime::{
    apply_sequence, normalize_mtimes, set_mtime_keep_atime, MtimeError, MtimeOutcome,
    MtimeStatus, TimestampOptions, TimestampReport,
};
pub use organize::{organize, OrganizeOptions, OrganizeReport};
pub use planner::{
    collect_sources, generate_plan, PlanOptions, PlanStats, PlannedOperation, SourceSet,
    TransferMode, TransferPlan, ValidationError, ValidationErrorKind, DEFAULT_SEPARATOR,
};
pub use probe::{DestinationProbe, EntryKind, FsProbe};
pub use report::ReportLine;
pub use resolver::{parse_strict_tag, TimestampResolver};
pub use sequence::{infer_sequence, MtimeAssignment, SequencePlan, TIME_INCREMENT_SECS};
pub use template::{
    parse_template, render_template, validate_template, DestinationTemplate, TemplateError,
};
