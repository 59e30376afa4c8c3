//! Person lookup across a whole sheet.
//!
//! A person designated in one contract usually already appears somewhere
//! else in the sheet, next to the value linked to them (registration number,
//! e-mail). The index finds that first appearance.

use fiscalsheet_core::{CellValue, Dataset, Normalizer, SheetLayout};

/// Normalized, column-major view of a dataset.
///
/// Built once per merge from the pre-merge snapshot. Non-text cells are
/// stored as `None` and never match a name.
pub struct PersonIndex<'a> {
    dataset: &'a Dataset,
    normalizer: Normalizer,
    columns: Vec<Vec<Option<String>>>,
}

impl<'a> PersonIndex<'a> {
    pub fn new(dataset: &'a Dataset, normalizer: Normalizer) -> Self {
        let columns = (0..dataset.columns().len())
            .map(|col| {
                dataset
                    .rows()
                    .iter()
                    .map(|row| row[col].as_str().map(|s| normalizer.apply(s)))
                    .collect()
            })
            .collect();
        Self {
            dataset,
            normalizer,
            columns,
        }
    }

    /// First `(row, column)` whose folded text equals the folded `name`,
    /// scanning column by column, then row by row.
    fn locate(&self, name: &str) -> Option<(usize, usize)> {
        let needle = self.normalizer.apply(name);
        if needle.is_empty() {
            return None;
        }
        self.columns.iter().enumerate().find_map(|(col, cells)| {
            cells
                .iter()
                .position(|c| c.as_deref() == Some(needle.as_str()))
                .map(|row| (row, col))
        })
    }

    /// Cell immediately to the right of the first match. A match in the last
    /// column has no neighbour and counts as not found.
    pub fn find(&self, name: &str) -> Option<&'a CellValue> {
        let (row, col) = self.locate(name)?;
        self.dataset.rows()[row].get(col + 1)
    }

    /// Like [`find`](Self::find), but a match inside a role column returns
    /// that role's derived column from the layout.
    pub fn find_paired(&self, name: &str, layout: &SheetLayout) -> Option<&'a CellValue> {
        let (row, col) = self.locate(name)?;
        let column = &self.dataset.columns()[col];
        let paired = layout
            .role_for_column(column)
            .and_then(|role| layout.derived_column(role))
            .and_then(|derived| self.dataset.column_index(derived));
        let target = match paired {
            Some(idx) => idx,
            None => col + 1,
        };
        self.dataset.rows()[row].get(target)
    }
}
