//! Before/after comparison of a dataset.

use fiscalsheet_core::{CellValue, Dataset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellChange {
    pub column: String,
    pub old: CellValue,
    pub new: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedRow {
    pub index: usize,
    pub changes: Vec<CellChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedRow {
    pub index: usize,
    pub cells: Vec<(String, CellValue)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    pub changed: Vec<ChangedRow>,
    pub added: Vec<AddedRow>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty()
    }

    /// Total number of changed cells plus added rows.
    pub fn len(&self) -> usize {
        self.changed.iter().map(|r| r.changes.len()).sum::<usize>() + self.added.len()
    }
}

/// Compare two versions of the same dataset.
///
/// Rows are matched by position. With the same header on both sides cells
/// are compared by position; otherwise columns are taken from `after` and
/// a column that did not exist before reads as empty there. Rows beyond the
/// end of `before` are reported whole as added.
pub fn diff(before: &Dataset, after: &Dataset) -> DiffReport {
    let mut report = DiffReport::default();
    let same_header = before.columns() == after.columns();

    for (index, row) in after.rows().iter().enumerate() {
        if index >= before.len() {
            report.added.push(AddedRow {
                index,
                cells: after
                    .columns()
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect(),
            });
            continue;
        }

        let changes: Vec<CellChange> = after
            .columns()
            .iter()
            .zip(row)
            .enumerate()
            .filter_map(|(col, (column, new))| {
                let old = if same_header {
                    before.row(index).and_then(|r| r.get(col))
                } else {
                    before.get(index, column)
                }
                .cloned()
                .unwrap_or_default();
                (old != *new).then(|| CellChange {
                    column: column.clone(),
                    old,
                    new: new.clone(),
                })
            })
            .collect();
        if !changes.is_empty() {
            report.changed.push(ChangedRow { index, changes });
        }
    }

    report
}
