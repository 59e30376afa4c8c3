//! Spreadsheet storage: XLSX codec, sheet formatting, and storage backends.

mod error;
pub use error::StoreError;

pub mod format;
mod store;
pub mod xlsx;

pub use format::Formatter;
pub use store::{LocalStore, SpreadsheetStore};
pub use xlsx::{XLSX_MIME, read_dataset, read_workbook, write_dataset, write_workbook};
