//! Presentation of the assignment sheet.
//!
//! The sheet is read by people on narrow screens, so every cell wraps, names
//! are upper case and rows are tall enough for three or four lines.

use fiscalsheet_core::{CellValue, Sheet};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Worksheet, XlsxError};

use crate::xlsx::write_cell;

const HEADER_FILL: u32 = 0xD3D3D3;

/// Column widths by zero-based column range, inclusive.
const COLUMN_WIDTHS: [(u16, u16, f64); 2] = [(0, 3, 25.0), (4, 16, 40.0)];
const BODY_ROW_HEIGHT: f64 = 75.0;

#[derive(Debug, Clone)]
pub struct Formatter {
    header: Format,
    body: Format,
    uppercase_text: bool,
}

impl Default for Formatter {
    fn default() -> Self {
        let base = Format::new()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin);
        Self {
            header: base
                .clone()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_FILL)),
            body: base,
            uppercase_text: true,
        }
    }
}

impl Formatter {
    /// Text of a body cell as it will be persisted. Formulas are kept as
    /// written.
    pub fn body_cell(&self, cell: &CellValue) -> CellValue {
        match cell {
            CellValue::Text(s) if self.uppercase_text && !s.starts_with('=') => {
                CellValue::Text(s.to_uppercase())
            }
            other => other.clone(),
        }
    }

    /// Width of a zero-based column, if it has a fixed one.
    pub fn column_width(col: u16) -> Option<f64> {
        COLUMN_WIDTHS
            .iter()
            .find(|(first, last, _)| (*first..=*last).contains(&col))
            .map(|(_, _, w)| *w)
    }

    /// Write `sheet` to `ws` with the first row as a styled header.
    pub fn write_sheet(&self, ws: &mut Worksheet, sheet: &Sheet) -> Result<(), XlsxError> {
        for (r, row) in sheet.rows().iter().enumerate() {
            let r = r as u32;
            let format = if r == 0 { &self.header } else { &self.body };
            for (c, cell) in row.iter().enumerate() {
                let cell = if r == 0 { cell.clone() } else { self.body_cell(cell) };
                write_cell(ws, r, c as u16, &cell, Some(format))?;
            }
            if r > 0 {
                ws.set_row_height(r, BODY_ROW_HEIGHT)?;
            }
        }
        let last = COLUMN_WIDTHS.iter().map(|(_, last, _)| *last).max().unwrap_or(0);
        for col in 0..=last {
            if let Some(width) = Self::column_width(col) {
                ws.set_column_width(col, width)?;
            }
        }
        Ok(())
    }
}
