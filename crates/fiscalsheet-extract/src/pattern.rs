//! Contract reference patterns.
//!
//! The summary paragraph of an appointment order cites the order itself and
//! the contract, e.g. "Designa fiscais para o Contrato nº 5/2024, processo
//! ...". Two spellings of the "number" abbreviation circulate.

use std::sync::LazyLock;

use fiscalsheet_core::format_contract_number;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LENIENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:nº|n\.°|n°)\s*([\d/]+)").expect("static regex"));

static STRICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"nº\s([\d/]+)").expect("static regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractPattern {
    /// `nº`, `n.°` or `n°`, optional whitespace before the number.
    #[default]
    Lenient,
    /// Only `nº` followed by exactly one whitespace character.
    Strict,
}

impl ContractPattern {
    fn regex(&self) -> &'static Regex {
        match self {
            Self::Lenient => &LENIENT,
            Self::Strict => &STRICT,
        }
    }

    /// All raw `digits/digits` references in `text`, in order.
    pub fn references<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.regex()
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// The contract number cited in `text`, zero-padded.
    ///
    /// When the text cites two numbers the first is the order's own number
    /// and the second the contract, so the second match is preferred;
    /// otherwise the first is used.
    pub fn find_contract(&self, text: &str) -> Option<String> {
        let refs = self.references(text);
        refs.get(1)
            .or_else(|| refs.first())
            .map(|r| format_contract_number(r))
    }
}
