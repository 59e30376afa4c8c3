//! Role extraction from an appointment order.
//!
//! The order designates people for a contract in a table whose rows read
//! `[unit, name, role]`, under a header row. Below the text, after the third
//! horizontal rule, a signature table carries the process number and the
//! document number of the order.

use std::sync::LazyLock;

use fiscalsheet_core::{Role, RoleAssignments};
use regex::Regex;
use scraper::ElementRef;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::html::{self, ORDER_MARKER, SUMMARY_MARKER, TD_SEL, TR_SEL};
use crate::pattern::ContractPattern;

static SITE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:DPU)?/?").expect("static regex"));
static LEADING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+").expect("static regex"));

/// Number of `<hr>` elements preceding the process/document table.
const SIGNATURE_HR: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("HTML has no element with class {0}")]
    MissingMarker(&'static str),
    #[error("no contract reference in summary: {0:?}")]
    NoContractReference(String),
    #[error("no designation row with a unit")]
    MissingUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub contract_pattern: ContractPattern,
    /// Upper-case person names, as the sheets store them.
    pub uppercase_names: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            contract_pattern: ContractPattern::Lenient,
            uppercase_names: true,
        }
    }
}

/// Everything one appointment order contributes to the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub roles: RoleAssignments,
    /// Order title up to the first comma, e.g. "PORTARIA Nº 120".
    pub order: String,
    /// Zero-padded contract number.
    pub contract: String,
    pub unit: String,
    pub process: Option<String>,
    /// Leading digits of the document number.
    pub document: Option<String>,
}

/// Parse an appointment order.
///
/// Fails when a marker element is missing, the summary cites no contract or
/// there is no designation row. Rows that cannot be used are logged and
/// skipped.
pub fn extract(html: &str, options: &ExtractOptions) -> Result<Extraction, ExtractError> {
    let doc = html::parse(html);

    let order_text = html::order_element(&doc)
        .map(html::text_of)
        .ok_or(ExtractError::MissingMarker(ORDER_MARKER))?;
    let order = order_text
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    let summary = html::summary_element(&doc)
        .map(html::text_of)
        .ok_or(ExtractError::MissingMarker(SUMMARY_MARKER))?;
    let contract = options
        .contract_pattern
        .find_contract(&summary)
        .ok_or_else(|| ExtractError::NoContractReference(summary.clone()))?;

    let mut roles = RoleAssignments::new();
    let mut unit = None;
    for (i, row) in doc.select(&TR_SEL).enumerate().skip(1) {
        let cells: Vec<ElementRef<'_>> = row.select(&TD_SEL).collect();
        if cells.len() < 3 {
            continue;
        }
        if unit.is_none() {
            unit = Some(strip_site_prefix(&html::text_of(cells[0])));
        }
        match parse_row(&cells, options) {
            Ok(Some((role, name))) => roles.set(role, name),
            Ok(None) => {}
            Err(reason) => warn!(row = i, reason, "skipping designation row"),
        }
    }
    let unit = unit.ok_or(ExtractError::MissingUnit)?;

    let (process, document) = signature_ids(&doc);

    info!(
        contract = %contract,
        unit = %unit,
        assigned = roles.assigned().count(),
        "extracted appointment order"
    );

    Ok(Extraction {
        roles,
        order,
        contract,
        unit,
        process,
        document,
    })
}

/// One designation row. `Ok(None)` for rows naming a role outside the six.
fn parse_row(
    cells: &[ElementRef<'_>],
    options: &ExtractOptions,
) -> Result<Option<(Role, String)>, &'static str> {
    let label = html::text_of(cells[2]);
    if label.is_empty() {
        return Err("empty role cell");
    }
    let Some(role) = Role::from_label(&label) else {
        debug!(label = %label, "ignoring unknown role label");
        return Ok(None);
    };

    let name = html::text_of(cells[1]);
    if name.is_empty() {
        return Err("empty name cell");
    }
    let name = if options.uppercase_names {
        name.to_uppercase()
    } else {
        name
    };
    Ok(Some((role, name)))
}

/// "DPU/ABC/SP" → "ABC/SP".
fn strip_site_prefix(unit: &str) -> String {
    SITE_PREFIX.replace(unit, "").trim().to_string()
}

/// Process and document ids from the first two cells of the signature
/// table. Missing pieces are logged and left empty.
fn signature_ids(doc: &scraper::Html) -> (Option<String>, Option<String>) {
    let Some(table) = html::table_after_hr(doc, SIGNATURE_HR) else {
        warn!("no signature table after hr #{SIGNATURE_HR}; process and document left empty");
        return (None, None);
    };
    let cells: Vec<String> = table.select(&TD_SEL).map(html::text_of).collect();
    if cells.len() < 2 {
        warn!(cells = cells.len(), "signature table too short; process and document left empty");
        return (None, None);
    }

    let process = Some(cells[0].clone()).filter(|s| !s.is_empty());
    let document = LEADING_DIGITS.find(&cells[1]).map(|m| m.as_str().to_string());
    if document.is_none() {
        warn!(cell = %cells[1], "document cell has no leading number");
    }
    (process, document)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A trimmed-down appointment order as published.
    fn order_html(rows: &[(&str, &str, &str)]) -> String {
        let mut body = String::new();
        for (unit, name, role) in rows {
            body.push_str(&format!(
                "<tr><td>{unit}</td><td>{name}</td><td>{role}</td></tr>"
            ));
        }
        format!(
            r#"<p class="Texto_Centralizado_Maiusculas">PORTARIA Nº 120, DE 3 DE MAIO DE 2024</p>
<p class="Texto_Ementa">Designa, nos termos da Portaria nº 44/2021, os fiscais do Contrato nº 5/2024.</p>
<table>
  <tr><th>Unidade</th><th>Nome</th><th>Função</th></tr>
  {body}
</table>
<hr><p>assinatura</p><hr><p>rodapé</p><hr>
<table><tr><td>08038.000123/2024-11</td><td>6543210 v1</td></tr></table>"#
        )
    }

    #[test]
    fn full_order() {
        let html = order_html(&[
            ("DPU/ABC/SP", "Maria Silva", "Gestor(a)"),
            ("DPU/ABC/SP", "João Souza", "Gestor(a) Substituto(a)"),
            ("DPU/ABC/SP", "Ana Lima", "Fiscal Técnico(a)"),
        ]);
        let ex = extract(&html, &ExtractOptions::default()).unwrap();

        assert_eq!(ex.order, "PORTARIA Nº 120");
        assert_eq!(ex.contract, "0005/2024");
        assert_eq!(ex.unit, "ABC/SP");
        assert_eq!(ex.roles.get(Role::TitularManager), "MARIA SILVA");
        assert_eq!(ex.roles.get(Role::SubstituteManager), "JOÃO SOUZA");
        assert_eq!(ex.roles.get(Role::TechnicalInspector), "ANA LIMA");
        assert_eq!(ex.roles.get(Role::AdministrativeInspector), "");
        assert_eq!(ex.process.as_deref(), Some("08038.000123/2024-11"));
        assert_eq!(ex.document.as_deref(), Some("6543210"));
    }

    #[test]
    fn names_kept_as_printed_when_not_uppercasing() {
        let html = order_html(&[("ABC", "Maria Silva", "Gestor")]);
        let options = ExtractOptions {
            uppercase_names: false,
            ..ExtractOptions::default()
        };
        let ex = extract(&html, &options).unwrap();
        assert_eq!(ex.roles.get(Role::TitularManager), "Maria Silva");
    }

    #[test]
    fn last_row_for_a_role_wins() {
        let html = order_html(&[
            ("ABC", "Primeira", "Fiscal Administrativo"),
            ("ABC", "Segunda", "Fiscal Administrativo(a)"),
        ]);
        let ex = extract(&html, &ExtractOptions::default()).unwrap();
        assert_eq!(ex.roles.get(Role::AdministrativeInspector), "SEGUNDA");
    }

    #[test]
    fn unknown_roles_and_blank_rows_skipped() {
        let html = order_html(&[
            ("ABC", "Carlos", "Fiscal Setorial"),
            ("ABC", "", "Gestor"),
            ("ABC", "Bia", ""),
            ("ABC", "Dora", "Fiscal Técnico Substituto"),
        ]);
        let ex = extract(&html, &ExtractOptions::default()).unwrap();
        assert_eq!(ex.roles.assigned().count(), 1);
        assert_eq!(ex.roles.get(Role::TechnicalInspectorSubstitute), "DORA");
    }

    #[test]
    fn unit_comes_from_first_data_row() {
        let html = order_html(&[
            ("DPU/XYZ/RJ", "Maria", "Gestor"),
            ("DPU/OUTRA", "João", "Fiscal Técnico"),
        ]);
        let ex = extract(&html, &ExtractOptions::default()).unwrap();
        assert_eq!(ex.unit, "XYZ/RJ");
    }

    #[test]
    fn site_prefix_variants() {
        assert_eq!(strip_site_prefix("DPU/ABC/SP"), "ABC/SP");
        assert_eq!(strip_site_prefix("DPU ABC"), "ABC");
        assert_eq!(strip_site_prefix("/ABC"), "ABC");
        assert_eq!(strip_site_prefix("ABC/SP"), "ABC/SP");
    }

    #[test]
    fn missing_markers_error() {
        let html = "<p class='Texto_Ementa'>Contrato nº 1/2024</p><table><tr><td>a</td></tr></table>";
        assert_eq!(
            extract(html, &ExtractOptions::default()).unwrap_err(),
            ExtractError::MissingMarker(ORDER_MARKER)
        );

        let html = "<p class='Texto_Centralizado_Maiusculas'>PORTARIA</p>";
        assert_eq!(
            extract(html, &ExtractOptions::default()).unwrap_err(),
            ExtractError::MissingMarker(SUMMARY_MARKER)
        );
    }

    #[test]
    fn missing_contract_reference_errors() {
        let html = order_html(&[("ABC", "Maria", "Gestor")])
            .replace("Portaria nº 44/2021", "Portaria")
            .replace("Contrato nº 5/2024", "Contrato");
        assert!(matches!(
            extract(&html, &ExtractOptions::default()),
            Err(ExtractError::NoContractReference(_))
        ));
    }

    #[test]
    fn no_designation_rows_errors() {
        let html = order_html(&[]).replace(
            "<table><tr><td>08038.000123/2024-11</td><td>6543210 v1</td></tr></table>",
            "",
        );
        assert_eq!(
            extract(&html, &ExtractOptions::default()).unwrap_err(),
            ExtractError::MissingUnit
        );
    }

    #[test]
    fn missing_signature_table_leaves_ids_empty() {
        let html = order_html(&[("ABC", "Maria", "Gestor")]).replace("<hr>", "");
        let ex = extract(&html, &ExtractOptions::default()).unwrap();
        assert_eq!(ex.process, None);
        assert_eq!(ex.document, None);
    }
}
