//! Budget workbook refresh from a commitment-note report.
//!
//! The base workbook lists one commitment note ("nota de empenho") per row:
//! the short note number (its last eight characters) in column E, the
//! committed value in column F, a status in column K and one payment cell
//! per month in columns O to Z. The report is exported by the finance
//! system with two title rows above its header.
//!
//! Every cell that changes is logged to a dedicated sheet so the history
//! survives in the workbook itself.

use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use fiscalsheet_core::{CellValue, Dataset, Sheet, Workbook};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const LOG_SHEET: &str = "Log de Alterações";
const LOG_HEADER: [&str; 6] = [
    "Tipo",
    "Nota de Empenho",
    "Campo",
    "Valor Antigo",
    "Valor Novo",
    "Data da Alteração",
];

const NOTE_COL: usize = 4;
const VALUE_COL: usize = 5;
const STATUS_COL: usize = 10;
const FIRST_MONTH_COL: usize = 14;
const MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// First base row holding a balance, and first holding payments.
const BALANCE_FIRST_ROW: usize = 4;
const PAYMENT_FIRST_ROW: usize = 1;

const REPORT_HEADER_ROW: usize = 2;
const REPORT_NOTE: &str = "Número da Nota de Empenho";
const REPORT_BALANCE: &str = "Saldo - R$ (Item Informação)";
const REPORT_DATE: &str = "Métrica";
const REPORT_PAID_COL: usize = 13;
const NOTE_KEY_LEN: usize = 8;

/// Statuses whose payments are adjusted by the rate in `Am6`.
const ADJUSTABLE_STATUSES: [&str; 3] = [
    "não pediu, mas pode solicitar.",
    "solicitado - em análise",
    "não solicitou, mas pode pedir",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BudgetError {
    #[error("report has no column {0}")]
    MissingReportColumn(String),
    #[error("budget workbook has no sheets")]
    EmptyWorkbook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    #[serde(rename = "Empenho")]
    Balance,
    #[serde(rename = "Pagamento")]
    Payment,
}

impl ChangeKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Balance => "Empenho",
            Self::Payment => "Pagamento",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetChange {
    pub kind: ChangeKind,
    pub note: String,
    pub field: String,
    pub old: CellValue,
    pub new: CellValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetReport {
    pub changes: Vec<BudgetChange>,
}

impl BudgetReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Commitment-note report keyed by the last eight characters of the note.
#[derive(Debug, Default)]
struct NoteReport {
    balances: HashMap<String, CellValue>,
    /// Paid amounts per note, per month (0 = January).
    payments: HashMap<String, [Vec<f64>; 12]>,
}

impl NoteReport {
    fn parse(sheet: &Sheet) -> Result<Self, BudgetError> {
        let rows = sheet.rows().get(REPORT_HEADER_ROW..).unwrap_or_default();
        let table = Dataset::from_sheet(&Sheet::new(rows.to_vec()));
        let col = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| BudgetError::MissingReportColumn(name.to_string()))
        };
        let note_col = col(REPORT_NOTE)?;
        let balance_col = col(REPORT_BALANCE)?;
        let date_col = col(REPORT_DATE)?;
        if table.columns().len() <= REPORT_PAID_COL {
            return Err(BudgetError::MissingReportColumn(format!(
                "at index {REPORT_PAID_COL}"
            )));
        }

        let mut report = NoteReport::default();

        // Balances come from the report as exported, later rows winning.
        for row in table.rows() {
            if row[note_col].is_blank() {
                continue;
            }
            report
                .balances
                .insert(note_key(&row[note_col]), row[balance_col].clone());
        }

        // Payments skip subtotal rows; merged cells leave blanks below the
        // first row of each group, which take the value above them.
        let mut carried: Vec<CellValue> = vec![CellValue::Empty; table.columns().len()];
        for row in table.rows() {
            if row.iter().any(|c| c.to_text().contains("Total")) {
                continue;
            }
            for (slot, cell) in carried.iter_mut().zip(row) {
                if !cell.is_blank() {
                    *slot = cell.clone();
                }
            }

            let note = note_key(&carried[note_col]);
            let months = report.payments.entry(note.clone()).or_default();
            let Some(date) = payment_date(&carried[date_col]) else {
                debug!(note = %note, date = %carried[date_col], "payment row without a date");
                continue;
            };
            match amount(&carried[REPORT_PAID_COL]) {
                Some(v) => months[date.month0() as usize].push(v),
                None => warn!(note = %note, value = %carried[REPORT_PAID_COL], "unreadable paid amount"),
            }
        }

        Ok(report)
    }
}

/// Refresh `workbook` in place from a commitment-note `report` sheet.
///
/// The first sheet is the budget. Changes are appended to the
/// [`LOG_SHEET`] sheet, created with its header when missing, and A1 of the
/// budget is stamped with `now`.
pub fn update_budget(
    workbook: &mut Workbook,
    report: &Sheet,
    now: NaiveDateTime,
) -> Result<BudgetReport, BudgetError> {
    let notes = NoteReport::parse(report)?;
    let base = workbook.first_mut().ok_or(BudgetError::EmptyWorkbook)?;

    let mut changes = update_balances(base, &notes);
    changes.extend(update_payments(base, &notes));

    base.set(
        0,
        0,
        CellValue::Text(now.format("Última atualização: %d/%m/%Y às %H:%M").to_string()),
    );

    let log = workbook.sheet_or_insert(LOG_SHEET);
    if log.height() == 0 {
        log.push_row(LOG_HEADER.iter().map(|h| CellValue::text(*h)).collect());
    }
    let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    for change in &changes {
        log.push_row(vec![
            CellValue::text(change.kind.label()),
            CellValue::text(change.note.as_str()),
            CellValue::text(change.field.as_str()),
            change.old.clone(),
            change.new.clone(),
            CellValue::text(stamp.as_str()),
        ]);
    }

    info!(changes = changes.len(), "budget updated");
    Ok(BudgetReport { changes })
}

fn update_balances(base: &mut Sheet, notes: &NoteReport) -> Vec<BudgetChange> {
    let mut changes = Vec::new();
    for row in BALANCE_FIRST_ROW..base.height() {
        let note = base.get(row, NOTE_COL).to_text().trim().to_string();
        if note.is_empty() {
            continue;
        }
        let Some(new) = notes.balances.get(&note) else {
            continue;
        };
        let old = base.get(row, VALUE_COL).clone();
        if old.to_text().trim() != new.to_text().trim() {
            debug!(note = %note, old = %old, new = %new, "balance changed");
            base.set(row, VALUE_COL, new.clone());
            changes.push(BudgetChange {
                kind: ChangeKind::Balance,
                note,
                field: "Valor Empenhado".into(),
                old,
                new: new.clone(),
            });
        }
    }
    changes
}

fn update_payments(base: &mut Sheet, notes: &NoteReport) -> Vec<BudgetChange> {
    let mut changes = Vec::new();
    for row in PAYMENT_FIRST_ROW..base.height() {
        let note = base.get(row, NOTE_COL).to_text().trim().to_string();
        if note.is_empty() {
            continue;
        }
        let Some(months) = notes.payments.get(&note) else {
            continue;
        };
        let adjustable = is_adjustable(base.get(row, STATUS_COL));

        for (m, values) in months.iter().enumerate() {
            if values.is_empty() {
                continue;
            }
            let col = FIRST_MONTH_COL + m;
            let formula = payment_formula(values, adjustable);
            let old = base.get(row, col).clone();
            if old.to_text().trim() == formula {
                continue;
            }
            base.set(row, col, CellValue::text(formula.as_str()));
            changes.push(BudgetChange {
                kind: ChangeKind::Payment,
                note: note.clone(),
                field: format!("Pagamento {}", MONTHS[m]),
                old,
                new: CellValue::Text(formula),
            });
        }
    }
    changes
}

fn is_adjustable(status: &CellValue) -> bool {
    let status = status.to_text().trim().to_lowercase();
    ADJUSTABLE_STATUSES.iter().any(|s| status.starts_with(s))
}

/// `=a+b`, `=a` for a single value, or `=(a+b)+((a+b)*Am6)` when adjusted.
fn payment_formula(values: &[f64], adjustable: bool) -> String {
    let sum = values
        .iter()
        .map(|v| formula_number(*v))
        .collect::<Vec<_>>()
        .join("+");
    if adjustable {
        format!("=({sum})+(({sum})*Am6)")
    } else {
        format!("={sum}")
    }
}

/// Whole amounts keep a trailing `.0` so formulas written by earlier runs
/// compare equal.
fn formula_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

fn note_key(cell: &CellValue) -> String {
    let text = cell.to_text();
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(NOTE_KEY_LEN);
    text.chars().skip(skip).collect()
}

fn amount(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(v) => Some(*v),
        CellValue::Text(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Date cells, day-first text dates, or spreadsheet date serials.
fn payment_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Number(serial) if *serial >= 1.0 => {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            epoch.checked_add_days(Days::new(serial.trunc() as u64))
        }
        CellValue::Text(s) => {
            let s = s.trim();
            ["%d/%m/%Y", "%d/%m/%Y %H:%M:%S", "%Y-%m-%d", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| {
                    NaiveDate::parse_from_str(s, fmt)
                        .ok()
                        .or_else(|| NaiveDateTime::parse_from_str(s, fmt).ok().map(|d| d.date()))
                })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap()
    }

    /// Base row with note, value and status; other cells empty.
    fn base_row(note: &str, value: f64, status: &str) -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; 26];
        row[NOTE_COL] = note.into();
        row[VALUE_COL] = CellValue::Number(value);
        row[STATUS_COL] = status.into();
        row
    }

    fn budget() -> Workbook {
        let mut rows = vec![vec![CellValue::Empty; 26]; 4];
        rows[0][0] = "Última atualização: antiga".into();
        rows.push(base_row("NE000101", 1000.0, "Pago"));
        rows.push(base_row("NE000202", 500.0, "Solicitado - em análise"));
        rows.push(base_row("NE000303", 70.0, ""));
        let mut wb = Workbook::new();
        wb.insert("Orçamento", Sheet::new(rows));
        wb
    }

    fn report_row(note: &str, balance: CellValue, date: &str, paid: CellValue) -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; 14];
        row[0] = note.into();
        row[1] = balance;
        row[2] = date.into();
        row[REPORT_PAID_COL] = paid;
        row
    }

    fn report(rows: Vec<Vec<CellValue>>) -> Sheet {
        let mut header = vec![CellValue::Empty; 14];
        header[0] = REPORT_NOTE.into();
        header[1] = REPORT_BALANCE.into();
        header[2] = REPORT_DATE.into();
        let mut all = vec![vec!["Relatório".into()], vec![]];
        all.push(header);
        all.extend(rows);
        Sheet::new(all)
    }

    #[test]
    fn balance_changes_and_payment_formulas_are_logged() {
        let mut wb = budget();
        let rep = report(vec![
            report_row("2024NE000101", CellValue::Number(800.0), "05/02/2025", CellValue::Number(150.0)),
            report_row("", CellValue::Empty, "20/02/2025", CellValue::Number(50.5)),
            report_row("2024NE000202", CellValue::Number(500.0), "10/01/2025", CellValue::Number(30.0)),
            report_row("Total", CellValue::Number(1300.0), "", CellValue::Number(230.5)),
        ]);

        let out = update_budget(&mut wb, &rep, now()).unwrap();
        let base = wb.first().unwrap();

        assert_eq!(base.get(4, VALUE_COL), &CellValue::Number(800.0));
        // February for 000101: forward-filled note, two payments.
        assert_eq!(base.get(4, FIRST_MONTH_COL + 1), &CellValue::text("=150.0+50.5"));
        // Adjustable status on 000202.
        assert_eq!(
            base.get(5, FIRST_MONTH_COL),
            &CellValue::text("=(30.0)+((30.0)*Am6)")
        );
        assert_eq!(base.get(0, 0), &CellValue::text("Última atualização: 14/03/2025 às 09:05"));

        let kinds: Vec<(ChangeKind, &str)> = out
            .changes
            .iter()
            .map(|c| (c.kind, c.field.as_str()))
            .collect();
        assert_eq!(
            kinds,
            [
                (ChangeKind::Balance, "Valor Empenhado"),
                (ChangeKind::Payment, "Pagamento fev"),
                (ChangeKind::Payment, "Pagamento jan"),
            ]
        );

        let log = wb.sheet(LOG_SHEET).unwrap();
        assert_eq!(log.height(), 4);
        assert_eq!(log.get(0, 0), &CellValue::text("Tipo"));
        assert_eq!(log.get(1, 1), &CellValue::text("NE000101"));
        assert_eq!(log.get(1, 3), &CellValue::Number(1000.0));
        assert_eq!(log.get(1, 5), &CellValue::text("2025-03-14 09:05:00"));
    }

    #[test]
    fn unchanged_values_are_not_logged() {
        let mut wb = budget();
        let rep = report(vec![report_row(
            "2024NE000303",
            CellValue::Number(70.0),
            "01/12/2024",
            CellValue::Number(70.0),
        )]);
        update_budget(&mut wb, &rep, now()).unwrap();
        let again = update_budget(&mut wb, &rep, now()).unwrap();
        assert!(again.is_empty());
        // Header plus the single December payment from the first run.
        assert_eq!(wb.sheet(LOG_SHEET).unwrap().height(), 2);
    }

    #[test]
    fn existing_log_sheet_is_appended() {
        let mut wb = budget();
        let mut log = Sheet::default();
        log.push_row(LOG_HEADER.iter().map(|h| CellValue::text(*h)).collect());
        log.push_row(vec!["Empenho".into()]);
        wb.insert(LOG_SHEET, log);

        let rep = report(vec![report_row(
            "2024NE000101",
            CellValue::Number(1.0),
            "",
            CellValue::Empty,
        )]);
        update_budget(&mut wb, &rep, now()).unwrap();
        assert_eq!(wb.sheet(LOG_SHEET).unwrap().height(), 3);
    }

    #[test]
    fn missing_report_column_errors() {
        let mut wb = budget();
        let rep = Sheet::new(vec![vec![], vec![], vec!["Outra".into()]]);
        assert_eq!(
            update_budget(&mut wb, &rep, now()).unwrap_err(),
            BudgetError::MissingReportColumn(REPORT_NOTE.into())
        );
    }

    #[test]
    fn formula_shapes() {
        assert_eq!(payment_formula(&[12.5], false), "=12.5");
        assert_eq!(payment_formula(&[1.0, 2.25], false), "=1.0+2.25");
        assert_eq!(payment_formula(&[1.0, 2.0], true), "=(1.0+2.0)+((1.0+2.0)*Am6)");
    }

    #[test]
    fn note_key_is_last_eight_chars() {
        assert_eq!(note_key(&" 158123000012024NE000101 ".into()), "NE000101");
        assert_eq!(note_key(&"NE01".into()), "NE01");
    }

    #[test]
    fn dates_day_first_or_serial() {
        let feb = NaiveDate::from_ymd_opt(2025, 2, 5);
        assert_eq!(payment_date(&"05/02/2025".into()), feb);
        assert_eq!(payment_date(&"2025-02-05 00:00:00".into()), feb);
        assert_eq!(payment_date(&CellValue::Number(45693.0)), feb);
        assert_eq!(payment_date(&CellValue::from_excel_serial(45693.25).unwrap()), feb);
        assert_eq!(payment_date(&"ontem".into()), None);
    }

    #[test]
    fn status_prefix_match_ignores_case() {
        assert!(is_adjustable(&"NÃO SOLICITOU, MAS PODE PEDIR até junho".into()));
        assert!(!is_adjustable(&"Pago".into()));
        assert!(!is_adjustable(&CellValue::Empty));
    }
}
