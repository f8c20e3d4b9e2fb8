use crate::metadata::TagReader;
use crate::report::ReportLine;
use crate::resolver::TimestampResolver;
use crate::sequence::{infer_sequence, MtimeAssignment, SequencePlan};
use filetime::FileTime;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const NO_TIMESTAMP_WARNING: &str = "No EXIF timestamp acquired";

#[derive(Debug, Error)]
pub enum MtimeError {
    #[error("cannot read file times: {0}")]
    Stat(#[source] io::Error),
    #[error("cannot set mtime: {0}")]
    Set(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MtimeStatus {
    Updated,
    WouldUpdate,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MtimeOutcome {
    pub assignment: MtimeAssignment,
    pub status: MtimeStatus,
}

impl MtimeOutcome {
    pub fn message(&self) -> String {
        let shown = self.assignment.time.format(DISPLAY_TIME_FORMAT);
        match &self.status {
            MtimeStatus::Updated => format!("mtime is now {shown}"),
            MtimeStatus::WouldUpdate => format!("mtime will be {shown}"),
            MtimeStatus::Failed { reason } => reason.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, MtimeStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampReport {
    pub plan: SequencePlan,
    pub outcomes: Vec<MtimeOutcome>,
    pub lines: Vec<ReportLine>,
}

impl TimestampReport {
    pub fn has_errors(&self) -> bool {
        self.lines.iter().any(|line| line.is_error)
    }
}

// Gaps are inferred from neighbouring files in input order.
pub fn normalize_mtimes<R: TagReader>(
    paths: &[PathBuf],
    resolver: &TimestampResolver<R>,
    options: &TimestampOptions,
) -> TimestampReport {
    let mut lines = Vec::new();
    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                let own = resolver.resolve_embedded(path).map(|resolved| resolved.time);
                items.push((path.clone(), own));
            }
            Ok(_) => debug!(path = %path.display(), "skipping non-file input"),
            Err(err) => lines.push(ReportLine::error(path, format!("cannot be read: {err}"))),
        }
    }
    let plan = infer_sequence(items);

    let outcomes = apply_sequence(&plan, options.dry_run);
    lines.extend(outcomes.iter().map(|outcome| {
        ReportLine::new(
            &outcome.assignment.path,
            outcome.message(),
            outcome.is_failure(),
        )
    }));

    if !plan.unresolved.is_empty() {
        debug!(count = plan.unresolved.len(), "no file in the batch carries a capture tag");
        lines.push(ReportLine::notice(NO_TIMESTAMP_WARNING));
    }

    info!(
        updated = outcomes.iter().filter(|o| !o.is_failure()).count(),
        failed = lines.iter().filter(|line| line.is_error).count(),
        unresolved = plan.unresolved.len(),
        dry_run = options.dry_run,
        "mtime normalization finished"
    );

    TimestampReport {
        plan,
        outcomes,
        lines,
    }
}

pub fn apply_sequence(plan: &SequencePlan, dry_run: bool) -> Vec<MtimeOutcome> {
    plan.assignments
        .iter()
        .map(|assignment| {
            let status = if dry_run {
                MtimeStatus::WouldUpdate
            } else {
                match set_mtime_keep_atime(&assignment.path, assignment.time.into()) {
                    Ok(()) => MtimeStatus::Updated,
                    Err(err) => MtimeStatus::Failed {
                        reason: err.to_string(),
                    },
                }
            };
            MtimeOutcome {
                assignment: assignment.clone(),
                status,
            }
        })
        .collect()
}

pub fn set_mtime_keep_atime(path: &Path, mtime: SystemTime) -> Result<(), MtimeError> {
    let metadata = fs::metadata(path).map_err(MtimeError::Stat)?;
    let atime = FileTime::from_last_access_time(&metadata);
    filetime::set_file_times(path, atime, FileTime::from_system_time(mtime))
        .map_err(MtimeError::Set)
}

#[cfg(test)]
mod tests {
    use super::{normalize_mtimes, set_mtime_keep_atime, TimestampOptions, NO_TIMESTAMP_WARNING};
    use crate::metadata::{TagMap, TagReadError, TagReader};
    use crate::resolver::TimestampResolver;
    use chrono::{Local, NaiveDate, TimeZone};
    use filetime::{set_file_times, FileTime};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    struct TagOnName {
        name: &'static str,
        value: &'static str,
    }

    impl TagReader for TagOnName {
        fn read_tags(&self, path: &Path) -> Result<TagMap, TagReadError> {
            if path.file_name().and_then(|n| n.to_str()) != Some(self.name) {
                return Err(TagReadError::NotThisFormat);
            }
            let mut tags = TagMap::new();
            tags.insert("DateTimeOriginal".to_string(), self.value.to_string());
            Ok(tags)
        }
    }

    fn fixture(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").expect("write fixture");
        set_file_times(
            &path,
            FileTime::from_unix_time(1_000_000, 0),
            FileTime::from_unix_time(2_000_000, 0),
        )
        .expect("set times");
        path
    }

    fn mtime_secs(path: &Path) -> i64 {
        let meta = fs::metadata(path).expect("metadata");
        FileTime::from_last_modification_time(&meta).unix_seconds()
    }

    #[test]
    fn set_mtime_preserves_access_time() {
        let temp = tempdir().expect("tempdir");
        let path = fixture(temp.path(), "a.jpg");

        set_mtime_keep_atime(&path, UNIX_EPOCH + Duration::from_secs(3_000_000))
            .expect("set mtime");

        let meta = fs::metadata(&path).expect("metadata");
        assert_eq!(FileTime::from_last_access_time(&meta).unix_seconds(), 1_000_000);
        assert_eq!(mtime_secs(&path), 3_000_000);
    }

    #[test]
    fn normalize_fills_neighbours_around_tagged_file() {
        let temp = tempdir().expect("tempdir");
        let x = fixture(temp.path(), "x.jpg");
        let y = fixture(temp.path(), "y.jpg");
        let z = fixture(temp.path(), "z.jpg");
        let resolver = TimestampResolver::new(TagOnName {
            name: "y.jpg",
            value: "2011:03:04 05:06:07",
        });
        let expected = NaiveDate::from_ymd_opt(2011, 3, 4)
            .and_then(|d| d.and_hms_opt(5, 6, 7))
            .and_then(|n| Local.from_local_datetime(&n).earliest())
            .expect("fixture time")
            .timestamp();

        let report = normalize_mtimes(
            &[x.clone(), y.clone(), z.clone()],
            &resolver,
            &TimestampOptions::default(),
        );

        assert!(!report.has_errors());
        assert_eq!(mtime_secs(&x), expected - 1);
        assert_eq!(mtime_secs(&y), expected);
        assert_eq!(mtime_secs(&z), expected + 1);
        assert_eq!(report.lines.len(), 3);
        assert!(report.lines[0].message.starts_with("mtime is now 2011-03-04 05:06:06"));
    }

    #[test]
    fn dry_run_reports_without_touching_files() {
        let temp = tempdir().expect("tempdir");
        let y = fixture(temp.path(), "y.jpg");
        let resolver = TimestampResolver::new(TagOnName {
            name: "y.jpg",
            value: "2011:03:04 05:06:07",
        });

        let report = normalize_mtimes(
            &[y.clone()],
            &resolver,
            &TimestampOptions { dry_run: true },
        );

        assert_eq!(mtime_secs(&y), 2_000_000);
        assert_eq!(report.lines[0].message, "mtime will be 2011-03-04 05:06:07");
    }

    #[test]
    fn missing_path_is_an_error_and_directories_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let y = fixture(temp.path(), "y.jpg");
        let typo = temp.path().join("typo.jpg");
        let resolver = TimestampResolver::new(TagOnName {
            name: "y.jpg",
            value: "2011:03:04 05:06:07",
        });

        let report = normalize_mtimes(
            &[typo.clone(), temp.path().to_path_buf(), y.clone()],
            &resolver,
            &TimestampOptions::default(),
        );

        assert!(report.has_errors());
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.lines[0].path.as_deref(), Some(typo.as_path()));
        assert!(report.lines[0].is_error);
        assert!(report.lines[0].message.starts_with("cannot be read: "));
        assert_eq!(report.lines[1].path.as_deref(), Some(y.as_path()));
        assert!(!report.lines[1].is_error);
    }

    #[test]
    fn untagged_batch_is_a_warning_not_an_error() {
        let temp = tempdir().expect("tempdir");
        let a = fixture(temp.path(), "a.jpg");
        let resolver = TimestampResolver::new(TagOnName {
            name: "other.jpg",
            value: "2011:03:04 05:06:07",
        });

        let report = normalize_mtimes(&[a.clone()], &resolver, &TimestampOptions::default());

        assert!(!report.has_errors());
        assert_eq!(report.plan.unresolved, vec![a.clone()]);
        assert_eq!(mtime_secs(&a), 2_000_000);
        let last = report.lines.last().expect("warning line");
        assert_eq!(last.message, NO_TIMESTAMP_WARNING);
        assert!(!last.is_error);
    }
}
