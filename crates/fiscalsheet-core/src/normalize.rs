//! Text folding for fuzzy comparison of names, units and role labels.
//!
//! Publications and spreadsheets spell the same person or unit with varying
//! accents, case, spacing and gender markers: "Fiscal Técnico(a)",
//! "FISCAL TECNICO", "fiscal  técnico". Everything is folded to one canonical
//! form before comparing.
//!
//! # Steps
//!
//! 1. Trim.
//! 2. Fold case (lower or upper, see [`CaseFold`]).
//! 3. Decompose (NFD) and drop combining marks, which strips diacritics.
//! 4. Remove parenthetical gender markers `(a)`, repeatedly.
//! 5. Collapse whitespace to single spaces, or remove it entirely.
//!
//! The result is a fixed point: folding it again returns the same string.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::value::CellValue;

static GENDER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(a\)\s*").expect("static regex"));

/// Case direction. Both are in use across the existing sheets; comparisons
/// only need both sides folded the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseFold {
    #[default]
    Lower,
    Upper,
}

/// Whitespace treatment after folding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Spacing {
    /// Runs of whitespace become a single space (units, names).
    #[default]
    Collapse,
    /// All whitespace is removed (role labels).
    Strip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    pub case: CaseFold,
    pub spacing: Spacing,
}

impl Normalizer {
    pub const fn new(case: CaseFold, spacing: Spacing) -> Self {
        Self { case, spacing }
    }

    /// Fold `text` into its canonical comparable form.
    pub fn apply(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let folded = match self.case {
            CaseFold::Lower => trimmed.to_lowercase(),
            CaseFold::Upper => trimmed.to_uppercase(),
        };

        // Diacritics go first so "(á)" is caught as a marker too.
        let mut out: String = folded.nfd().filter(|c| !is_combining_mark(*c)).collect();

        // Removing a marker, or whitespace in the strip variant, can expose
        // another marker, e.g. "((a)a)" or "(a(a))".
        loop {
            let next = self.respace(&GENDER_MARKER.replace_all(&out, " "));
            if next == out {
                return out;
            }
            out = next;
        }
    }

    fn respace(&self, text: &str) -> String {
        match self.spacing {
            Spacing::Collapse => text.split_whitespace().collect::<Vec<_>>().join(" "),
            Spacing::Strip => text.split_whitespace().collect(),
        }
    }

    /// Fold text cells; other cells pass through unchanged.
    pub fn apply_cell(&self, cell: &CellValue) -> CellValue {
        match cell {
            CellValue::Text(s) => CellValue::Text(self.apply(s)),
            other => other.clone(),
        }
    }
}

/// Fold free text for unit and name comparison (lower case, single spaces).
pub fn comparable(text: &str) -> String {
    Normalizer::default().apply(text)
}

/// Fold a role label for table lookup: "Fiscal Técnico Substituto(a)"
/// becomes `fiscaltecnicosubstituto`.
pub fn role_key(text: &str) -> String {
    Normalizer::new(CaseFold::Lower, Spacing::Strip).apply(text)
}

/// Fold a cell with the default normalizer. Non-text cells are unchanged.
pub fn normalize_cell(cell: &CellValue) -> CellValue {
    Normalizer::default().apply_cell(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accents_case_markers_and_spacing() {
        assert_eq!(comparable(" João   (a) "), comparable("joao"));
        assert_eq!(comparable(" João   (a) "), "joao");
        assert_eq!(comparable("Ação  Social\tNorte"), "acao social norte");
    }

    #[test]
    fn upper_fold() {
        let n = Normalizer::new(CaseFold::Upper, Spacing::Collapse);
        assert_eq!(n.apply("maria  da conceição"), "MARIA DA CONCEICAO");
        assert_eq!(n.apply("Gestor(A)"), "GESTOR");
    }

    #[test]
    fn role_labels() {
        assert_eq!(role_key("Gestor(a)"), "gestor");
        assert_eq!(role_key("Gestor(a) Substituto(a)"), "gestorsubstituto");
        assert_eq!(role_key("Fiscal Técnico Substituto"), "fiscaltecnicosubstituto");
        assert_eq!(
            role_key("  FISCAL ADMINISTRATIVO (A)  "),
            "fiscaladministrativo"
        );
    }

    #[test]
    fn marker_inside_word_is_kept_apart() {
        // The marker is replaced by a space, so adjacent words stay separate
        // in the collapsing variant.
        assert_eq!(comparable("fiscal(a)tecnico"), "fiscal tecnico");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            " João   (a) ",
            "((a)a)",
            "(á)",
            "(a(a))",
            "İstanbul",
            "ÁÉÍÓÚ ãõ ç",
            "",
            "   ",
            "Fiscal Técnico(a) Substituto(a)",
        ];
        for case in [CaseFold::Lower, CaseFold::Upper] {
            for spacing in [Spacing::Collapse, Spacing::Strip] {
                let n = Normalizer::new(case, spacing);
                for input in inputs {
                    let once = n.apply(input);
                    assert_eq!(n.apply(&once), once, "not a fixed point for {input:?}");
                }
            }
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(comparable(""), "");
        assert_eq!(role_key("   "), "");
    }

    #[test]
    fn non_text_cells_pass_through() {
        assert_eq!(normalize_cell(&CellValue::Number(3.0)), CellValue::Number(3.0));
        assert_eq!(normalize_cell(&CellValue::Empty), CellValue::Empty);
        assert_eq!(
            normalize_cell(&CellValue::text("São Paulo")),
            CellValue::text("sao paulo")
        );
    }
}
