//! Contract number normalisation.
//!
//! Contracts are identified by `number/year`. Publications write them with
//! or without leading zeros ("5/2024", "05/2024"); the sheets store them
//! zero-padded to four digits on each side ("0005/2024"), which is the form
//! compared during reconciliation.

use crate::value::CellValue;

/// Zero-pad a `digits/digits` contract number to `NNNN/NNNN`.
///
/// Input: "5/2024", " 12/24 ", "0005/2024"
/// Output: "0005/2024", "0012/0024", "0005/2024"
///
/// Anything that is not exactly two digit groups around one slash is
/// returned trimmed but otherwise untouched, so free-text cells in the
/// contract column never compare equal to a real contract by accident.
/// Groups longer than four digits are kept as they are.
pub fn format_contract_number(s: &str) -> String {
    let s = s.trim();
    match s.split_once('/') {
        Some((number, year)) if is_digits(number) && is_digits(year) => {
            format!("{number:0>4}/{year:0>4}")
        }
        _ => s.to_string(),
    }
}

/// Contract key of a sheet cell. Numeric cells cannot hold a slash, so only
/// text is padded; everything else is rendered as displayed.
pub fn contract_key(cell: &CellValue) -> String {
    match cell {
        CellValue::Text(s) => format_contract_number(s),
        other => other.to_text(),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
