use crate::metadata::{ResolvedTimestamp, TagReader};
use crate::probe::{DestinationProbe, EntryKind};
use crate::resolver::TimestampResolver;
use crate::sanitize::sanitize_component;
use crate::template::{parse_template, render_template, DestinationTemplate};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const DEFAULT_SEPARATOR: &str = "_";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub template: String,
    pub include_dir_prefix: bool,
    pub separator: String,
    pub mode: TransferMode,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            template: "%Y/%m".to_string(),
            include_dir_prefix: false,
            separator: DEFAULT_SEPARATOR.to_string(),
            mode: TransferMode::Copy,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlannedOperation {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: TransferMode,
    pub timestamp: ResolvedTimestamp,
}

// `Display` is the status text printed next to the source path.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    #[error("cannot be read: {reason}")]
    Unreadable { reason: String },
    #[error("is already in {}", .dir.display())]
    AlreadyAtDestination { dir: PathBuf },
    #[error("has similar file below {}", .dir.display())]
    SimilarFileBelow { dir: PathBuf },
    #[error("cannot use {} as a directory: not a directory", .path.display())]
    NotADirectory { path: PathBuf },
    #[error("cannot scan {}: {reason}", .dir.display())]
    ScanFailed { dir: PathBuf, reason: String },
    #[error("duplicate copy to {} (already planned from {})", .destination.display(), .first.display())]
    DuplicateCopy { destination: PathBuf, first: PathBuf },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    pub source: PathBuf,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub inputs: usize,
    pub skipped_non_file: usize,
    pub planned: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransferPlan {
    pub template: String,
    pub operations: BTreeMap<PathBuf, PlannedOperation>,
    pub errors: Vec<ValidationError>,
    pub stats: PlanStats,
}

impl TransferPlan {
    /// Operations in execution order: ascending by the raw destination path,
    /// independent of input order.
    pub fn ordered_operations(&self) -> Vec<&PlannedOperation> {
        let mut ops: Vec<&PlannedOperation> = self.operations.values().collect();
        ops.sort_by(|a, b| a.destination.as_os_str().cmp(b.destination.as_os_str()));
        ops
    }

    pub(crate) fn reject_unwalkable(&mut self, errors: Vec<ValidationError>) {
        self.stats.inputs += errors.len();
        self.stats.rejected += errors.len();
        self.errors.splice(0..0, errors);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    pub files: Vec<PathBuf>,
    pub errors: Vec<ValidationError>,
}

// Directory inputs are only expanded with `recursive`; anything else passes
// through and the planner decides what to skip.
pub fn collect_sources(inputs: &[PathBuf], recursive: bool) -> SourceSet {
    let mut set = SourceSet::default();
    for input in inputs {
        if !(recursive && input.is_dir()) {
            set.files.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input).follow_links(true).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => set.files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => {
                    let source = err.path().unwrap_or(input.as_path()).to_path_buf();
                    debug!(path = %source.display(), error = %err, "cannot walk entry");
                    set.errors.push(ValidationError {
                        source,
                        kind: ValidationErrorKind::Unreadable {
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }
    }
    set
}

pub fn generate_plan<R: TagReader, P: DestinationProbe>(
    sources: &[PathBuf],
    options: &PlanOptions,
    resolver: &TimestampResolver<R>,
    probe: &P,
) -> Result<TransferPlan> {
    let template = parse_template(&options.template)
        .with_context(|| format!("invalid destination format: {}", options.template))?;

    let mut checker = DestinationChecker {
        probe,
        scans: HashMap::new(),
        claimed: HashMap::new(),
    };
    let mut operations = BTreeMap::new();
    let mut errors = Vec::new();
    let mut stats = PlanStats::default();

    for source in sources {
        stats.inputs += 1;
        match fs::metadata(source) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                debug!(path = %source.display(), "skipping non-regular file");
                stats.skipped_non_file += 1;
                continue;
            }
            Err(err) => {
                stats.rejected += 1;
                errors.push(ValidationError {
                    source: source.clone(),
                    kind: ValidationErrorKind::Unreadable {
                        reason: err.to_string(),
                    },
                });
                continue;
            }
        }

        let Some(name) = destination_name(source, options) else {
            stats.skipped_non_file += 1;
            continue;
        };
        let timestamp = resolver.resolve(source);
        let dir = destination_dir(&template, &timestamp);
        let destination = dir.join(&name);

        match checker.check(source, &dir, &destination, &name) {
            Ok(()) => {
                checker.claim(&destination, source);
                stats.planned += 1;
                operations.insert(
                    destination.clone(),
                    PlannedOperation {
                        source: source.clone(),
                        destination,
                        kind: options.mode,
                        timestamp,
                    },
                );
            }
            Err(kind) => {
                debug!(path = %source.display(), error = %kind, "source rejected");
                stats.rejected += 1;
                errors.push(ValidationError {
                    source: source.clone(),
                    kind,
                });
            }
        }
    }

    info!(
        inputs = stats.inputs,
        planned = stats.planned,
        rejected = stats.rejected,
        skipped = stats.skipped_non_file,
        "plan generated"
    );

    Ok(TransferPlan {
        template: options.template.clone(),
        operations,
        errors,
        stats,
    })
}

fn destination_dir(template: &DestinationTemplate, timestamp: &ResolvedTimestamp) -> PathBuf {
    PathBuf::from(render_template(template, &timestamp.time))
}

fn destination_name(source: &Path, options: &PlanOptions) -> Option<OsString> {
    let file_name = source.file_name()?;
    if !options.include_dir_prefix {
        return Some(file_name.to_os_string());
    }
    let Some(parent) = parent_dir_name(source) else {
        return Some(file_name.to_os_string());
    };
    let mut name = OsString::from(sanitize_component(&format!(
        "{}{}",
        parent, options.separator
    )));
    name.push(file_name);
    Some(name)
}

fn parent_dir_name(source: &Path) -> Option<String> {
    let parent = source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = match parent.file_name() {
        Some(name) => name.to_os_string(),
        None => fs::canonicalize(parent).ok()?.file_name()?.to_os_string(),
    };
    Some(name.to_string_lossy().into_owned())
}

struct DestinationChecker<'a, P> {
    probe: &'a P,
    scans: HashMap<PathBuf, HashSet<String>>,
    claimed: HashMap<String, PathBuf>,
}

impl<P: DestinationProbe> DestinationChecker<'_, P> {
    fn check(
        &mut self,
        source: &Path,
        dir: &Path,
        destination: &Path,
        name: &OsStr,
    ) -> Result<(), ValidationErrorKind> {
        if let Some(blocker) = self.blocking_ancestor(dir) {
            return Err(ValidationErrorKind::NotADirectory { path: blocker });
        }

        if self.probe.entry_kind(dir) == EntryKind::Directory {
            if self.probe.is_same_file(source, destination) {
                return Err(ValidationErrorKind::AlreadyAtDestination {
                    dir: dir.to_path_buf(),
                });
            }
            let names = match self.scans.entry(dir.to_path_buf()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let names = self.probe.names_below(dir).map_err(|err| {
                        ValidationErrorKind::ScanFailed {
                            dir: dir.to_path_buf(),
                            reason: err.to_string(),
                        }
                    })?;
                    entry.insert(names)
                }
            };
            if names.contains(&name.to_string_lossy().to_lowercase()) {
                return Err(ValidationErrorKind::SimilarFileBelow {
                    dir: dir.to_path_buf(),
                });
            }
        }

        if let Some(first) = self.claimed.get(&claim_key(destination)) {
            return Err(ValidationErrorKind::DuplicateCopy {
                destination: destination.to_path_buf(),
                first: first.clone(),
            });
        }

        Ok(())
    }

    fn claim(&mut self, destination: &Path, source: &Path) {
        self.claimed
            .insert(claim_key(destination), source.to_path_buf());
    }

    // The nearest existing ancestor decides whether the directory can be created.
    fn blocking_ancestor(&self, dir: &Path) -> Option<PathBuf> {
        for ancestor in dir.ancestors().filter(|p| !p.as_os_str().is_empty()) {
            match self.probe.entry_kind(ancestor) {
                EntryKind::Missing => continue,
                EntryKind::Directory => return None,
                EntryKind::Other => return Some(ancestor.to_path_buf()),
            }
        }
        None
    }
}

// Case-folded so that `IMG.JPG` and `img.jpg` cannot both land in one directory.
fn claim_key(destination: &Path) -> String {
    destination.to_string_lossy().to_lowercase()
}
