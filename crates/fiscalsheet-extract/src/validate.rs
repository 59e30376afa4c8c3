//! Cheap structural check run before an order is queued for reconciliation.

use serde::Serialize;
use tracing::debug;

use crate::html::{self, ORDER_MARKER, SUMMARY_MARKER};
use crate::pattern::ContractPattern;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    /// Zero-padded contract number, when one was found.
    pub contract: Option<String>,
    pub valid: bool,
    pub message: String,
}

impl Validation {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            contract: None,
            valid: false,
            message: message.into(),
        }
    }
}

/// Check that both marker elements exist and the summary cites a contract.
pub fn validate(html: &str, pattern: ContractPattern) -> Validation {
    let doc = html::parse(html);

    if html::order_element(&doc).is_none() {
        return Validation::invalid(format!("missing element with class {ORDER_MARKER}"));
    }
    let Some(summary) = html::summary_element(&doc).map(html::text_of) else {
        return Validation::invalid(format!("missing element with class {SUMMARY_MARKER}"));
    };

    match pattern.find_contract(&summary) {
        Some(contract) => {
            debug!(contract = %contract, "order passed validation");
            Validation {
                message: format!("contract {contract}"),
                contract: Some(contract),
                valid: true,
            }
        }
        None => Validation::invalid("summary cites no contract number"),
    }
}
