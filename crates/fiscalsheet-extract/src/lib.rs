mod html;

pub mod extractor;
pub mod pattern;
pub mod validate;

pub use extractor::{ExtractError, ExtractOptions, Extraction, extract};
pub use html::{ORDER_MARKER, SUMMARY_MARKER};
pub use pattern::ContractPattern;
pub use validate::{Validation, validate};
