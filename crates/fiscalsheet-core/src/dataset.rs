//! Tabular data: positional [`Sheet`] grids and header-keyed [`Dataset`]s.

use std::collections::HashSet;

use serde::Serialize;

use crate::value::CellValue;

/// A positional grid of cells, as read from a worksheet.
///
/// Rows may have different lengths; missing cells read as [`CellValue::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Write a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let r = &mut self.rows[row];
        if r.len() <= col {
            r.resize(col + 1, CellValue::Empty);
        }
        r[col] = value;
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }
}

/// Named sheets in workbook order. The first sheet is the active one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<(String, Sheet)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[(String, Sheet)] {
        &self.sheets
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(n, _)| n.as_str())
    }

    pub fn first(&self) -> Option<&Sheet> {
        self.sheets.first().map(|(_, s)| s)
    }

    pub fn first_mut(&mut self) -> Option<&mut Sheet> {
        self.sheets.first_mut().map(|(_, s)| s)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Add a sheet, replacing any sheet with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, sheet: Sheet) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = sheet,
            None => self.sheets.push((name, sheet)),
        }
    }

    /// The named sheet, appended empty if absent.
    pub fn sheet_or_insert(&mut self, name: &str) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.sheets.push((name.to_string(), Sheet::default()));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx].1
    }
}

/// An ordered sequence of records keyed by column name.
///
/// Every row holds exactly one cell per column. Column names are unique:
/// a repeated name gets a `.1`, `.2`, ... suffix, so `MATRÍCULA` after each
/// role column reads as `MATRÍCULA`, `MATRÍCULA.1` and so on. Column order
/// is preserved from the source so the dataset writes back in the same
/// shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Create an empty dataset with the given header.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: unique_columns(columns.into_iter().map(Into::into)),
            rows: Vec::new(),
        }
    }

    /// Build a dataset from a sheet whose first row is the header.
    ///
    /// Blank header cells get a positional name (`Unnamed: N`) so no column
    /// is lost, and repeated names are made unique. Trailing rows that are
    /// entirely blank are dropped.
    pub fn from_sheet(sheet: &Sheet) -> Self {
        let Some(header) = sheet.rows().first() else {
            return Self::default();
        };
        let width = sheet.width();
        let columns = unique_columns((0..width).map(|i| match header.get(i) {
            Some(cell) if !cell.is_blank() => cell.to_text().trim().to_string(),
            _ => format!("Unnamed: {i}"),
        }));

        let mut rows: Vec<Vec<CellValue>> = sheet.rows()[1..]
            .iter()
            .map(|r| {
                let mut row = r.clone();
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        while rows
            .last()
            .is_some_and(|r| r.iter().all(|c| matches!(c, CellValue::Empty)))
        {
            rows.pop();
        }

        Self { columns, rows }
    }

    /// Convert back to a positional sheet with the header as the first row.
    pub fn to_sheet(&self) -> Sheet {
        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        rows.push(self.columns.iter().map(|c| CellValue::text(c.as_str())).collect());
        rows.extend(self.rows.iter().cloned());
        Sheet::new(rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `(row, column)`, or `None` if either is out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Overwrite a cell. Returns `false` if the row or column does not exist.
    pub fn set(&mut self, row: usize, column: &str, value: CellValue) -> bool {
        let Some(col) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row) {
            Some(r) => {
                r[col] = value;
                true
            }
            None => false,
        }
    }

    /// Append a row from `(column, value)` pairs. Columns not named are left
    /// empty; names that are not columns of the dataset are ignored.
    ///
    /// Returns the index of the new row.
    pub fn push_record<'a>(
        &mut self,
        cells: impl IntoIterator<Item = (&'a str, CellValue)>,
    ) -> usize {
        let mut row = vec![CellValue::Empty; self.columns.len()];
        for (name, value) in cells {
            if let Some(col) = self.column_index(name) {
                row[col] = value;
            }
        }
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Append a positional row, padded or truncated to the column count.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) -> usize {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Iterate `(column, cell)` pairs of one row.
    pub fn record(&self, index: usize) -> impl Iterator<Item = (&str, &CellValue)> {
        self.rows
            .get(index)
            .into_iter()
            .flat_map(move |r| self.columns.iter().map(String::as_str).zip(r.iter()))
    }
}

/// Suffix repeated names with `.1`, `.2`, ... skipping any suffix that is
/// already taken.
fn unique_columns(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let mut candidate = name.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
