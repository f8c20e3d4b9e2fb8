use crate::planner::{PlannedOperation, TransferMode, TransferPlan};
use filetime::FileTime;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("destination has no parent directory: {}", .path.display())]
    NoParent { path: PathBuf },
    #[error("cannot create directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("destination already exists: {}", .path.display())]
    DestinationExists { path: PathBuf },
    #[error("cannot copy to {}: {source}", .path.display())]
    Copy { path: PathBuf, source: io::Error },
    #[error("cannot keep timestamps on {}: {source}", .path.display())]
    PreserveTimes { path: PathBuf, source: io::Error },
    #[error("copied to {} but cannot remove source: {source}", .path.display())]
    RemoveSource { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Copied,
    Moved,
    WouldCopy,
    WouldMove,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: OutcomeStatus,
}

impl OperationOutcome {
    pub fn message(&self) -> String {
        let to = self.destination.display();
        match &self.status {
            OutcomeStatus::Copied => format!("copied to {to}"),
            OutcomeStatus::Moved => format!("moved to {to}"),
            OutcomeStatus::WouldCopy => format!("pretending to copy to {to}"),
            OutcomeStatus::WouldMove => format!("pretending to move to {to}"),
            OutcomeStatus::Failed { reason } => reason.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<OperationOutcome>,
    pub failed: bool,
}

impl BatchResult {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    fn record(&mut self, outcome: OperationOutcome) {
        self.failed |= outcome.is_failure();
        self.outcomes.push(outcome);
    }
}

/// Runs every planned operation in destination order. A failing item is
/// recorded and the batch moves on.
pub fn execute_plan(plan: &TransferPlan, options: &ExecuteOptions) -> BatchResult {
    let mut result = BatchResult::default();

    for op in plan.ordered_operations() {
        let status = if options.dry_run {
            match op.kind {
                TransferMode::Copy => OutcomeStatus::WouldCopy,
                TransferMode::Move => OutcomeStatus::WouldMove,
            }
        } else {
            match transfer(op) {
                Ok(status) => status,
                Err(err) => {
                    debug!(source = %op.source.display(), error = %err, "transfer failed");
                    OutcomeStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        };
        result.record(OperationOutcome {
            source: op.source.clone(),
            destination: op.destination.clone(),
            status,
        });
    }

    info!(
        total = result.outcomes.len(),
        failed = result.failures(),
        dry_run = options.dry_run,
        "batch finished"
    );
    result
}

fn transfer(op: &PlannedOperation) -> Result<OutcomeStatus, TransferError> {
    let parent = op
        .destination
        .parent()
        .ok_or_else(|| TransferError::NoParent {
            path: op.destination.clone(),
        })?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|source| TransferError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    if fs::symlink_metadata(&op.destination).is_ok() {
        return Err(TransferError::DestinationExists {
            path: op.destination.clone(),
        });
    }

    match op.kind {
        TransferMode::Copy => {
            copy_preserving(&op.source, &op.destination)?;
            Ok(OutcomeStatus::Copied)
        }
        TransferMode::Move => {
            move_file(&op.source, &op.destination)?;
            Ok(OutcomeStatus::Moved)
        }
    }
}

fn copy_preserving(source: &Path, destination: &Path) -> Result<(), TransferError> {
    let copy_err = |source| TransferError::Copy {
        path: destination.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(source).map_err(copy_err)?;
    // fs::copy carries permission bits over; times are restored separately.
    fs::copy(source, destination).map_err(copy_err)?;
    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(|source| TransferError::PreserveTimes {
        path: destination.to_path_buf(),
        source,
    })
}

fn move_file(source: &Path, destination: &Path) -> Result<(), TransferError> {
    let rename_err = match fs::rename(source, destination) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    debug!(
        source = %source.display(),
        error = %rename_err,
        "rename failed, falling back to copy and remove"
    );

    if let Err(copy_err) = copy_preserving(source, destination) {
        if destination.exists() {
            if let Err(err) = fs::remove_file(destination) {
                warn!(
                    path = %destination.display(),
                    error = %err,
                    "cannot remove partial copy"
                );
            }
        }
        return Err(copy_err);
    }

    fs::remove_file(source).map_err(|source| TransferError::RemoveSource {
        path: destination.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{execute_plan, ExecuteOptions, OutcomeStatus};
    use crate::metadata::{ResolvedTimestamp, TimestampSource};
    use crate::planner::{PlanStats, PlannedOperation, TransferMode, TransferPlan};
    use chrono::Local;
    use filetime::{set_file_times, FileTime};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn plan_of(ops: Vec<(PathBuf, PathBuf)>, kind: TransferMode) -> TransferPlan {
        let now = Local::now();
        let operations = ops
            .into_iter()
            .map(|(source, destination)| {
                (
                    destination.clone(),
                    PlannedOperation {
                        source,
                        destination,
                        kind,
                        timestamp: ResolvedTimestamp {
                            source: TimestampSource::FileModified,
                            time: now,
                        },
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        TransferPlan {
            template: "%Y".to_string(),
            operations,
            errors: Vec::new(),
            stats: PlanStats::default(),
        }
    }

    fn write(path: &Path, body: &[u8]) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, body).expect("write fixture");
        path.to_path_buf()
    }

    #[test]
    fn copy_creates_directories_and_keeps_mtime() {
        let temp = tempdir().expect("tempdir");
        let source = write(&temp.path().join("in").join("a.jpg"), b"A");
        set_file_times(
            &source,
            FileTime::from_unix_time(1_100_000_000, 0),
            FileTime::from_unix_time(1_200_000_000, 0),
        )
        .expect("set times");
        let destination = temp.path().join("out").join("2020").join("a.jpg");

        let result = execute_plan(
            &plan_of(vec![(source.clone(), destination.clone())], TransferMode::Copy),
            &ExecuteOptions::default(),
        );

        assert!(!result.failed);
        assert_eq!(result.outcomes[0].status, OutcomeStatus::Copied);
        assert_eq!(
            result.outcomes[0].message(),
            format!("copied to {}", destination.display())
        );
        assert!(source.exists());
        assert_eq!(fs::read(&destination).expect("read copy"), b"A");
        let meta = fs::metadata(&destination).expect("metadata");
        assert_eq!(
            FileTime::from_last_modification_time(&meta).unix_seconds(),
            1_200_000_000
        );
    }

    #[test]
    fn move_relocates_the_file() {
        let temp = tempdir().expect("tempdir");
        let source = write(&temp.path().join("in").join("a.jpg"), b"A");
        let destination = temp.path().join("out").join("a.jpg");

        let result = execute_plan(
            &plan_of(vec![(source.clone(), destination.clone())], TransferMode::Move),
            &ExecuteOptions::default(),
        );

        assert_eq!(result.outcomes[0].status, OutcomeStatus::Moved);
        assert!(!source.exists());
        assert!(destination.exists());
    }

    #[test]
    fn operations_run_in_sorted_destination_order() {
        let temp = tempdir().expect("tempdir");
        let b = write(&temp.path().join("in").join("b.jpg"), b"B");
        let a = write(&temp.path().join("in").join("a.jpg"), b"A");
        let out = temp.path().join("2020");

        let result = execute_plan(
            &plan_of(
                vec![(b, out.join("b.jpg")), (a, out.join("a.jpg"))],
                TransferMode::Copy,
            ),
            &ExecuteOptions { dry_run: true },
        );

        let order: Vec<PathBuf> = result
            .outcomes
            .iter()
            .map(|o| o.destination.clone())
            .collect();
        assert_eq!(order, vec![out.join("a.jpg"), out.join("b.jpg")]);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let temp = tempdir().expect("tempdir");
        let source = write(&temp.path().join("in").join("a.jpg"), b"A");
        let out = temp.path().join("out");
        let destination = out.join("a.jpg");

        let result = execute_plan(
            &plan_of(vec![(source.clone(), destination.clone())], TransferMode::Move),
            &ExecuteOptions { dry_run: true },
        );

        assert_eq!(result.outcomes[0].status, OutcomeStatus::WouldMove);
        assert_eq!(
            result.outcomes[0].message(),
            format!("pretending to move to {}", destination.display())
        );
        assert!(source.exists());
        assert!(!out.exists());
    }

    #[test]
    fn failed_item_does_not_stop_the_batch() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("in").join("gone.jpg");
        let present = write(&temp.path().join("in").join("here.jpg"), b"H");
        let out = temp.path().join("out");

        let result = execute_plan(
            &plan_of(
                vec![
                    (missing, out.join("a-gone.jpg")),
                    (present, out.join("b-here.jpg")),
                ],
                TransferMode::Copy,
            ),
            &ExecuteOptions::default(),
        );

        assert!(result.failed);
        assert_eq!(result.failures(), 1);
        assert!(result.outcomes[0].is_failure());
        assert_eq!(result.outcomes[1].status, OutcomeStatus::Copied);
        assert!(out.join("b-here.jpg").exists());
        assert!(!out.join("a-gone.jpg").exists());
    }

    #[test]
    fn failed_move_reports_the_copy_error() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("in").join("gone.jpg");
        let destination = temp.path().join("out").join("gone.jpg");

        let result = execute_plan(
            &plan_of(vec![(missing, destination.clone())], TransferMode::Move),
            &ExecuteOptions::default(),
        );

        assert!(result.failed);
        assert!(result.outcomes[0]
            .message()
            .starts_with(&format!("cannot copy to {}", destination.display())));
        assert!(!destination.exists());
    }

    #[test]
    fn existing_destination_is_never_overwritten() {
        let temp = tempdir().expect("tempdir");
        let source = write(&temp.path().join("in").join("a.jpg"), b"new");
        let destination = write(&temp.path().join("out").join("a.jpg"), b"old");

        let result = execute_plan(
            &plan_of(vec![(source, destination.clone())], TransferMode::Move),
            &ExecuteOptions::default(),
        );

        assert!(result.failed);
        assert!(result.outcomes[0]
            .message()
            .starts_with("destination already exists"));
        assert_eq!(fs::read(&destination).expect("read"), b"old");
    }
}
