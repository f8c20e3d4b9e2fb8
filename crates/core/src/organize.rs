use crate::executor::{execute_plan, BatchResult, ExecuteOptions};
use crate::metadata::TagReader;
use crate::planner::{collect_sources, generate_plan, PlanOptions, TransferPlan};
use crate::probe::DestinationProbe;
use crate::report::ReportLine;
use crate::resolver::TimestampResolver;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub plan: PlanOptions,
    pub dry_run: bool,
    pub ignore_errors: bool,
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizeReport {
    pub plan: TransferPlan,
    // `None` when validation errors stopped the run before execution.
    pub batch: Option<BatchResult>,
    pub lines: Vec<ReportLine>,
}

impl OrganizeReport {
    pub fn has_errors(&self) -> bool {
        !self.plan.errors.is_empty() || self.batch.as_ref().is_some_and(|b| b.failed)
    }

    pub fn executed(&self) -> bool {
        self.batch.is_some()
    }
}

pub fn organize<R: TagReader, P: DestinationProbe>(
    inputs: &[PathBuf],
    options: &OrganizeOptions,
    resolver: &TimestampResolver<R>,
    probe: &P,
) -> Result<OrganizeReport> {
    let sources = collect_sources(inputs, options.recursive);
    let mut plan = generate_plan(&sources.files, &options.plan, resolver, probe)?;
    plan.reject_unwalkable(sources.errors);

    let mut lines: Vec<ReportLine> = plan
        .errors
        .iter()
        .map(|err| ReportLine::error(&err.source, err.kind.to_string()))
        .collect();

    if !plan.errors.is_empty() && !options.ignore_errors {
        warn!(
            errors = plan.errors.len(),
            "validation failed, nothing was copied or moved"
        );
        return Ok(OrganizeReport {
            plan,
            batch: None,
            lines,
        });
    }

    let batch = execute_plan(
        &plan,
        &ExecuteOptions {
            dry_run: options.dry_run,
        },
    );
    lines.extend(
        batch
            .outcomes
            .iter()
            .map(|outcome| ReportLine::new(&outcome.source, outcome.message(), outcome.is_failure())),
    );

    Ok(OrganizeReport {
        plan,
        batch: Some(batch),
        lines,
    })
}
