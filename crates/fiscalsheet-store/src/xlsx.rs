//! XLSX encoding: calamine for reading, rust_xlsxwriter for writing.
//!
//! Formulas survive a round trip: on read a formula cell becomes text
//! starting with `=`, and such text is written back as a formula.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use fiscalsheet_core::{CellValue, Dataset, Sheet, Workbook};
use rust_xlsxwriter::{Format, Worksheet, XlsxError};
use tracing::debug;

use crate::StoreError;
use crate::format::Formatter;

/// Sheet name used when a dataset is written on its own.
pub const DEFAULT_SHEET: &str = "Sheet1";

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const DATE_FORMAT: &str = "dd/mm/yyyy";
const DATETIME_FORMAT: &str = "dd/mm/yyyy hh:mm:ss";

/// Read every sheet of an XLSX document.
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, StoreError> {
    let mut xlsx: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let mut book = Workbook::new();

    for name in xlsx.sheet_names() {
        let range = xlsx.worksheet_range(&name)?;
        let mut sheet = Sheet::default();
        if let Some((row0, col0)) = range.start() {
            for (r, c, value) in range.cells() {
                let cell = from_data(value);
                if !matches!(cell, CellValue::Empty) {
                    sheet.set(row0 as usize + r, col0 as usize + c, cell);
                }
            }
        }

        // Not every sheet carries formula records.
        if let Ok(formulas) = xlsx.worksheet_formula(&name) {
            let (row0, col0) = formulas.start().unwrap_or((0, 0));
            for (r, c, formula) in formulas.cells() {
                if formula.trim().is_empty() {
                    continue;
                }
                let text = if formula.starts_with('=') {
                    formula.clone()
                } else {
                    format!("={formula}")
                };
                sheet.set(row0 as usize + r, col0 as usize + c, CellValue::Text(text));
            }
        }

        debug!(sheet = %name, rows = sheet.height(), "read worksheet");
        book.insert(name, sheet);
    }

    Ok(book)
}

/// Read the first sheet as a dataset with its first row as header.
pub fn read_dataset(bytes: &[u8]) -> Result<Dataset, StoreError> {
    let book = read_workbook(bytes)?;
    let sheet = book.first().ok_or(StoreError::NoSheets)?;
    Ok(Dataset::from_sheet(sheet))
}

/// Encode a workbook. With a formatter every sheet is styled.
pub fn write_workbook(book: &Workbook, formatter: Option<&Formatter>) -> Result<Vec<u8>, StoreError> {
    let mut out = rust_xlsxwriter::Workbook::new();
    for (name, sheet) in book.sheets() {
        let ws = out.add_worksheet();
        ws.set_name(name)?;
        match formatter {
            Some(f) => f.write_sheet(ws, sheet)?,
            None => write_plain(ws, sheet)?,
        }
    }
    Ok(out.save_to_buffer()?)
}

/// Encode a dataset as a single formatted sheet.
pub fn write_dataset(dataset: &Dataset, formatter: &Formatter) -> Result<Vec<u8>, StoreError> {
    let mut book = Workbook::new();
    book.insert(DEFAULT_SHEET, dataset.to_sheet());
    write_workbook(&book, Some(formatter))
}

fn write_plain(ws: &mut Worksheet, sheet: &Sheet) -> Result<(), XlsxError> {
    for (r, row) in sheet.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(ws, r as u32, c as u16, cell, None)?;
        }
    }
    Ok(())
}

pub(crate) fn write_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    let blank = Format::new();
    let format = match (cell, format) {
        (CellValue::Empty, None) => return Ok(()),
        (_, Some(f)) => f,
        (_, None) => &blank,
    };
    match cell {
        CellValue::Empty => ws.write_blank(row, col, format)?,
        CellValue::Bool(b) => ws.write_boolean_with_format(row, col, *b, format)?,
        CellValue::Number(n) => ws.write_number_with_format(row, col, *n, format)?,
        CellValue::Text(s) if s.starts_with('=') => {
            ws.write_formula_with_format(row, col, s.as_str(), format)?
        }
        CellValue::Text(s) => ws.write_string_with_format(row, col, s, format)?,
        CellValue::DateTime(_) => {
            let serial = cell.excel_serial().unwrap_or_default();
            let pattern = if serial.fract() == 0.0 {
                DATE_FORMAT
            } else {
                DATETIME_FORMAT
            };
            let format = format.clone().set_num_format(pattern);
            ws.write_number_with_format(row, col, serial, &format)?
        }
    };
    Ok(())
}

fn from_data(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            CellValue::from_excel_serial(dt.as_f64()).unwrap_or(CellValue::Number(dt.as_f64()))
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignments() -> Dataset {
        let mut ds = Dataset::new(["UNIDADE", "Nº CONTRATO", "GESTOR TITULAR"]);
        ds.push_row(vec!["abc/sp".into(), "0005/2024".into(), "maria silva".into()]);
        ds.push_row(vec!["XYZ".into(), CellValue::Number(12.0), CellValue::Empty]);
        ds
    }

    #[test]
    fn dataset_roundtrip_uppercases_body() {
        let bytes = write_dataset(&assignments(), &Formatter::default()).unwrap();
        let back = read_dataset(&bytes).unwrap();
        assert_eq!(back.columns(), assignments().columns());
        assert_eq!(back.get(0, "UNIDADE"), Some(&CellValue::text("ABC/SP")));
        assert_eq!(back.get(0, "GESTOR TITULAR"), Some(&CellValue::text("MARIA SILVA")));
        assert_eq!(back.get(1, "Nº CONTRATO"), Some(&CellValue::Number(12.0)));
        assert_eq!(back.get(1, "GESTOR TITULAR"), Some(&CellValue::Empty));
    }

    #[test]
    fn formulas_and_sheets_survive_plain_write() {
        let mut book = Workbook::new();
        let mut base = Sheet::default();
        base.set(0, 0, "Última atualização".into());
        base.set(4, 14, "=150.0+50.5".into());
        book.insert("Orçamento", base);
        let mut log = Sheet::default();
        log.push_row(vec!["Tipo".into(), "Nota de Empenho".into()]);
        book.insert("Log de Alterações", log);

        let bytes = write_workbook(&book, None).unwrap();
        let back = read_workbook(&bytes).unwrap();
        assert_eq!(
            back.names().collect::<Vec<_>>(),
            ["Orçamento", "Log de Alterações"]
        );
        let base = back.first().unwrap();
        assert_eq!(base.get(4, 14), &CellValue::text("=150.0+50.5"));
        assert_eq!(base.get(0, 0), &CellValue::text("Última atualização"));
    }

    #[test]
    fn dates_keep_a_date_format() {
        let feb = CellValue::from_excel_serial(45693.0).unwrap();
        let stamp = CellValue::from_excel_serial(45693.75).unwrap();

        let mut sheet = Sheet::default();
        sheet.set(0, 0, "Data".into());
        sheet.set(1, 0, feb.clone());
        sheet.set(2, 0, stamp.clone());
        let mut book = Workbook::new();
        book.insert("Pagamentos", sheet);

        // Read back as dates only if the cells carry a date number format.
        let back = read_workbook(&write_workbook(&book, None).unwrap()).unwrap();
        let sheet = back.first().unwrap();
        assert_eq!(sheet.get(1, 0), &feb);
        assert_eq!(sheet.get(2, 0), &stamp);
        assert_eq!(sheet.get(1, 0).to_text(), "05/02/2025");

        let mut ds = Dataset::new(["PRAZO"]);
        ds.push_row(vec![feb.clone()]);
        let back = read_dataset(&write_dataset(&ds, &Formatter::default()).unwrap()).unwrap();
        assert_eq!(back.get(0, "PRAZO"), Some(&feb));
    }

    #[test]
    fn garbage_is_a_read_error() {
        assert!(matches!(read_workbook(b"not a zip"), Err(StoreError::Read(_))));
    }
}
