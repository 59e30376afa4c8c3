//! Sequential, best-effort application of many orders to one sheet.
//!
//! Each order is validated, extracted and merged in turn, so later orders
//! see the effects of earlier ones. A failing order is recorded and skipped;
//! nothing already merged is rolled back.

use fiscalsheet_core::{Dataset, SheetLayout};
use fiscalsheet_extract::{ExtractOptions, extract, validate};
use serde::Serialize;
use tracing::{info, warn};

use crate::diff::{DiffReport, diff};
use crate::merge::{MergeAction, MergeError, MergeOptions, MergeRequest, MergeWarning, merge};

/// One HTML order, named after its source file.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub html: String,
}

impl Fragment {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub extract: ExtractOptions,
    pub merge: MergeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FragmentStatus {
    /// Rejected by the pre-validator; never extracted.
    Invalid { message: String },
    /// Passed validation but could not be extracted.
    ExtractFailed { error: String },
    Merged {
        contract: String,
        #[serde(flatten)]
        action: MergeAction,
        warnings: Vec<MergeWarning>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: FragmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// The dataset before the first order was applied.
    #[serde(skip)]
    pub snapshot: Dataset,
    pub outcomes: Vec<FragmentOutcome>,
    /// Combined changes of the whole batch.
    pub diff: DiffReport,
    /// Contracts that could not be merged because of a conflict.
    pub conflicts: Vec<String>,
}

impl BatchReport {
    /// Whether the dataset differs from the snapshot and should be saved.
    pub fn changed(&self) -> bool {
        !self.diff.is_empty()
    }
}

/// Apply `fragments` to `dataset` in order.
///
/// Fails up front, before anything is written, when the layout does not fit
/// the sheet. Everything else is recorded per fragment.
pub fn run_batch(
    dataset: &mut Dataset,
    layout: &SheetLayout,
    fragments: &[Fragment],
    options: &BatchOptions,
) -> Result<BatchReport, MergeError> {
    let layout = layout.resolve(dataset.columns())?;
    let snapshot = dataset.clone();
    let mut outcomes = Vec::with_capacity(fragments.len());
    let mut conflicts = Vec::new();

    for fragment in fragments {
        let status = apply_one(dataset, &layout, fragment, options)?;
        if let FragmentStatus::Merged {
            action: MergeAction::Conflict(conflict),
            ..
        } = &status
        {
            conflicts.push(conflict.contract().to_string());
        }
        outcomes.push(FragmentOutcome {
            name: fragment.name.clone(),
            status,
        });
    }

    let diff = diff(&snapshot, dataset);
    info!(
        fragments = fragments.len(),
        changed_rows = diff.changed.len(),
        added_rows = diff.added.len(),
        conflicts = conflicts.len(),
        "batch complete"
    );

    Ok(BatchReport {
        snapshot,
        outcomes,
        diff,
        conflicts,
    })
}

fn apply_one(
    dataset: &mut Dataset,
    layout: &SheetLayout,
    fragment: &Fragment,
    options: &BatchOptions,
) -> Result<FragmentStatus, MergeError> {
    let validation = validate(&fragment.html, options.extract.contract_pattern);
    if !validation.valid {
        warn!(fragment = %fragment.name, reason = %validation.message, "skipping invalid order");
        return Ok(FragmentStatus::Invalid {
            message: validation.message,
        });
    }

    let extraction = match extract(&fragment.html, &options.extract) {
        Ok(ex) => ex,
        Err(e) => {
            warn!(fragment = %fragment.name, error = %e, "skipping unreadable order");
            return Ok(FragmentStatus::ExtractFailed {
                error: e.to_string(),
            });
        }
    };

    let request = MergeRequest::from(&extraction);
    let outcome = merge(dataset, layout, &request, options.merge)?;
    Ok(FragmentStatus::Merged {
        contract: extraction.contract,
        action: outcome.action,
        warnings: outcome.warnings,
    })
}
