//! Apply one appointment order to the assignment sheet.
//!
//! Rows are keyed by (contract, unit). The contract is compared zero-padded
//! and the unit folded; neither is rewritten in the sheet for the comparison.
//! A key that matches more than one row, or a contract already filed under a
//! different unit, is reported as a conflict and leaves the sheet untouched.

use fiscalsheet_core::contract::contract_key;
use fiscalsheet_core::{
    CaseFold, CellValue, Dataset, LayoutError, Normalizer, Role, RoleAssignments, SheetLayout,
    Spacing, format_contract_number,
};
use fiscalsheet_extract::Extraction;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::lookup::PersonIndex;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MergeError {
    #[error("column not found in sheet: {0}")]
    MissingColumn(String),
    #[error("role column {0} has no paired column")]
    NoDerivedColumn(String),
}

impl From<LayoutError> for MergeError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::MissingColumn(c) => Self::MissingColumn(c),
            LayoutError::NoDerivedColumn(c) => Self::NoDerivedColumn(c),
        }
    }
}

/// What one order asks to be recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequest {
    pub contract: String,
    pub unit: String,
    pub roles: RoleAssignments,
    pub order: String,
    pub process: Option<String>,
    pub document: Option<String>,
}

impl From<&Extraction> for MergeRequest {
    fn from(ex: &Extraction) -> Self {
        Self {
            contract: ex.contract.clone(),
            unit: ex.unit.clone(),
            roles: ex.roles.clone(),
            order: ex.order.clone(),
            process: ex.process.clone(),
            document: ex.document.clone(),
        }
    }
}

impl MergeRequest {
    /// `"{order} ({document})"`, or just the order without a document.
    /// `None` when there is no order label at all.
    pub fn order_reference(&self) -> Option<String> {
        let order = self.order.trim();
        if order.is_empty() {
            return None;
        }
        Some(match self.document.as_deref().map(str::trim) {
            Some(doc) if !doc.is_empty() => format!("{order} ({doc})"),
            _ => order.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Case direction used when comparing units and names.
    pub case: CaseFold,
}

impl MergeOptions {
    fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.case, Spacing::Collapse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// The contract is already filed under other unit spellings.
    UnitMismatch {
        contract: String,
        unit: String,
        existing_units: Vec<String>,
    },
    /// More than one row carries the same (contract, unit).
    DuplicateRows { contract: String, rows: Vec<usize> },
}

impl Conflict {
    pub fn contract(&self) -> &str {
        match self {
            Self::UnitMismatch { contract, .. } | Self::DuplicateRows { contract, .. } => contract,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MergeAction {
    Updated { row: usize },
    Inserted { row: usize },
    Conflict(Conflict),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeWarning {
    /// Nobody with this name appears in the sheet, so the derived column
    /// was left empty.
    PersonNotFound { role: Role, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The dataset as it was before this merge.
    pub snapshot: Dataset,
    pub action: MergeAction,
    pub warnings: Vec<MergeWarning>,
}

impl MergeOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self.action, MergeAction::Conflict(_))
    }
}

/// Merge one request into `dataset` in place.
///
/// Errors only when the layout does not fit the sheet, before anything is
/// written. Conflicts are an outcome, not an error.
pub fn merge(
    dataset: &mut Dataset,
    layout: &SheetLayout,
    request: &MergeRequest,
    options: MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let layout = layout.resolve(dataset.columns())?;
    let snapshot = dataset.clone();
    let normalizer = options.normalizer();

    let contract = format_contract_number(&request.contract);
    let unit = normalizer.apply(&request.unit);

    let contract_col = column(dataset, &layout.contract)?;
    let unit_col = column(dataset, &layout.unit)?;

    let mut exact = Vec::new();
    let mut other_units: Vec<String> = Vec::new();
    for (i, row) in dataset.rows().iter().enumerate() {
        if contract_key(&row[contract_col]) != contract {
            continue;
        }
        let row_unit = &row[unit_col];
        if normalizer.apply(&row_unit.to_text()) == unit {
            exact.push(i);
        } else {
            let spelling = row_unit.to_text();
            if !other_units.contains(&spelling) {
                other_units.push(spelling);
            }
        }
    }

    let index = PersonIndex::new(&snapshot, normalizer);
    let mut warnings = Vec::new();

    let action = match exact.as_slice() {
        [row] => {
            update_row(dataset, &layout, &index, *row, request, &mut warnings);
            info!(contract = %contract, row, "updated contract row");
            MergeAction::Updated { row: *row }
        }
        [] if !other_units.is_empty() => {
            warn!(
                contract = %contract,
                unit = %request.unit,
                existing = ?other_units,
                "contract filed under another unit; not merging"
            );
            MergeAction::Conflict(Conflict::UnitMismatch {
                contract,
                unit: request.unit.clone(),
                existing_units: other_units,
            })
        }
        [] => {
            let row = insert_row(dataset, &layout, &index, &contract, request, &mut warnings);
            info!(contract = %contract, row, "appended contract row");
            MergeAction::Inserted { row }
        }
        rows => {
            warn!(contract = %contract, rows = ?rows, "duplicate contract rows; not merging");
            MergeAction::Conflict(Conflict::DuplicateRows {
                contract,
                rows: rows.to_vec(),
            })
        }
    };

    Ok(MergeOutcome {
        snapshot,
        action,
        warnings,
    })
}

fn column(dataset: &Dataset, name: &str) -> Result<usize, MergeError> {
    dataset
        .column_index(name)
        .ok_or_else(|| MergeError::MissingColumn(name.to_string()))
}

/// Linked value for `name`, or `Empty` with a warning when the name is not
/// in the sheet. Empty names resolve to `Empty` silently.
fn derived_value(
    index: &PersonIndex<'_>,
    layout: &SheetLayout,
    role: Role,
    name: &str,
    warnings: &mut Vec<MergeWarning>,
) -> CellValue {
    if name.is_empty() {
        return CellValue::Empty;
    }
    match index.find_paired(name, layout) {
        Some(value) => value.clone(),
        None => {
            warn!(role = %role, name, "person not found in sheet; derived column cleared");
            warnings.push(MergeWarning::PersonNotFound {
                role,
                name: name.to_string(),
            });
            CellValue::Empty
        }
    }
}

fn update_row(
    dataset: &mut Dataset,
    layout: &SheetLayout,
    index: &PersonIndex<'_>,
    row: usize,
    request: &MergeRequest,
    warnings: &mut Vec<MergeWarning>,
) {
    for (role, name) in request.roles.iter() {
        let name = name.trim();
        let value = derived_value(index, layout, role, name, warnings);
        if let Some(derived) = layout.derived_column(role) {
            let current = dataset.get(row, derived);
            // A blank text cell and an empty cell are the same to a reader.
            if !(value.is_blank() && current.is_some_and(CellValue::is_blank)) {
                dataset.set(row, derived, value);
            }
        }

        let role_column = layout.role_column(role);
        let current = dataset
            .get(row, role_column)
            .map(|c| c.to_text().trim().to_string())
            .unwrap_or_default();
        if current != name {
            debug!(role = %role, old = %current, new = name, "role holder changed");
            dataset.set(row, role_column, name_cell(name));
        }
    }

    if let Some(reference) = request.order_reference() {
        dataset.set(row, &layout.order_reference, CellValue::Text(reference));
    }
}

fn insert_row(
    dataset: &mut Dataset,
    layout: &SheetLayout,
    index: &PersonIndex<'_>,
    contract: &str,
    request: &MergeRequest,
    warnings: &mut Vec<MergeWarning>,
) -> usize {
    let mut cells: Vec<(&str, CellValue)> = vec![
        (layout.unit.as_str(), CellValue::text(request.unit.trim())),
        (layout.contract.as_str(), CellValue::text(contract)),
    ];
    if let Some(process) = &request.process {
        cells.push((layout.process.as_str(), CellValue::text(process.as_str())));
    }
    for (role, name) in request.roles.iter() {
        let name = name.trim();
        let value = derived_value(index, layout, role, name, warnings);
        cells.push((layout.role_column(role), name_cell(name)));
        if let Some(derived) = layout.derived_column(role) {
            cells.push((derived, value));
        }
    }
    if let Some(reference) = request.order_reference() {
        cells.push((layout.order_reference.as_str(), CellValue::Text(reference)));
    }
    dataset.push_record(cells)
}

fn name_cell(name: &str) -> CellValue {
    if name.is_empty() {
        CellValue::Empty
    } else {
        CellValue::text(name)
    }
}

#[cfg(test)]
mod tests {
    use fiscalsheet_core::Sheet;

    use super::*;
    use crate::diff::diff;

    const ROLE_COLUMNS: [(&str, &str); 6] = [
        ("GESTOR TITULAR", "MATRÍCULA GT"),
        ("GESTOR SUBSTITUTO", "MATRÍCULA GS"),
        ("FISCAL ADMINISTRATIVO", "MATRÍCULA FA"),
        ("FISCAL ADMINISTRATIVO SUBSTITUTO", "MATRÍCULA FAS"),
        ("FISCAL TÉCNICO", "MATRÍCULA FT"),
        ("FISCAL TÉCNICO SUBSTITUTO", "MATRÍCULA FTS"),
    ];

    fn header() -> Vec<String> {
        let mut cols = vec![
            "UNIDADE".to_string(),
            "Nº CONTRATO".to_string(),
            "Nº PROCESSO".to_string(),
        ];
        for (role, derived) in ROLE_COLUMNS {
            cols.push(role.to_string());
            cols.push(derived.to_string());
        }
        cols.push("Nº PORTARIA (Nº SEI)".to_string());
        cols.push("OBSERVAÇÃO".to_string());
        cols
    }

    fn sheet() -> Dataset {
        let mut ds = Dataset::new(header());
        ds.push_record([
            ("UNIDADE", "Unit A".into()),
            ("Nº CONTRATO", "1/2024".into()),
            ("GESTOR TITULAR", "ANA LIMA".into()),
            ("MATRÍCULA GT", "111".into()),
            ("FISCAL TÉCNICO", "BRUNO COSTA".into()),
            ("MATRÍCULA FT", CellValue::Number(222.0)),
            ("OBSERVAÇÃO", "keep me".into()),
        ]);
        ds
    }

    fn request(contract: &str, unit: &str, roles: &[(Role, &str)]) -> MergeRequest {
        MergeRequest {
            contract: contract.into(),
            unit: unit.into(),
            roles: roles.iter().map(|(r, n)| (*r, *n)).collect(),
            order: "PORTARIA Nº 9".into(),
            process: Some("08038.000001/2024-00".into()),
            document: Some("123456".into()),
        }
    }

    #[test]
    fn conflicting_unit_leaves_dataset_unchanged() {
        let mut ds = sheet();
        let before = ds.clone();
        let out = merge(
            &mut ds,
            &SheetLayout::default(),
            &request("0001/2024", "Unit B", &[(Role::TitularManager, "ZÉ")]),
            MergeOptions::default(),
        )
        .unwrap();

        assert!(out.is_conflict());
        assert_eq!(
            out.action,
            MergeAction::Conflict(Conflict::UnitMismatch {
                contract: "0001/2024".into(),
                unit: "Unit B".into(),
                existing_units: vec!["Unit A".into()],
            })
        );
        assert_eq!(ds, before);
    }

    /// Sheet whose derived columns all share the `MATRÍCULA` header.
    fn sheet_with_repeated_headers() -> Dataset {
        let mut header: Vec<CellValue> =
            vec!["UNIDADE".into(), "Nº CONTRATO".into(), "Nº PROCESSO".into()];
        for role in Role::ALL {
            header.push(role.label().into());
            header.push("MATRÍCULA".into());
        }
        header.push("Nº PORTARIA (Nº SEI)".into());

        let mut row = vec![CellValue::Empty; header.len()];
        row[0] = "Unit A".into();
        row[1] = "0009/2024".into();
        row[3] = "ANA LIMA".into();
        row[4] = CellValue::Number(111.0);
        row[5] = "BRUNO COSTA".into();
        row[6] = CellValue::Number(222.0);
        Dataset::from_sheet(&Sheet::new(vec![header, row]))
    }

    #[test]
    fn repeated_derived_headers_keep_each_role_apart() {
        let mut ds = sheet_with_repeated_headers();
        let req = request(
            "10/2024",
            "Unit B",
            &[
                (Role::TitularManager, "ANA LIMA"),
                (Role::SubstituteManager, "BRUNO COSTA"),
            ],
        );
        let out = merge(&mut ds, &SheetLayout::default(), &req, MergeOptions::default()).unwrap();

        assert_eq!(out.action, MergeAction::Inserted { row: 1 });
        assert!(out.warnings.is_empty());
        assert_eq!(ds.get(1, "GESTOR TITULAR"), Some(&CellValue::text("ANA LIMA")));
        assert_eq!(ds.get(1, "MATRÍCULA"), Some(&CellValue::Number(111.0)));
        assert_eq!(ds.get(1, "GESTOR SUBSTITUTO"), Some(&CellValue::text("BRUNO COSTA")));
        assert_eq!(ds.get(1, "MATRÍCULA.1"), Some(&CellValue::Number(222.0)));
        assert_eq!(ds.get(1, "MATRÍCULA.2"), Some(&CellValue::Empty));

        // Applying it again touches nothing.
        let before = ds.clone();
        merge(&mut ds, &SheetLayout::default(), &req, MergeOptions::default()).unwrap();
        assert!(diff(&before, &ds).is_empty());
    }

    #[test]
    fn duplicate_rows_are_a_conflict() {
        let mut ds = sheet();
        ds.push_record([("UNIDADE", "UNIT A".into()), ("Nº CONTRATO", "0001/2024".into())]);
        let before = ds.clone();
        let out = merge(
            &mut ds,
            &SheetLayout::default(),
            &request("1/2024", "unit a", &[]),
            MergeOptions::default(),
        )
        .unwrap();
        assert_eq!(
            out.action,
            MergeAction::Conflict(Conflict::DuplicateRows {
                contract: "0001/2024".into(),
                rows: vec![0, 1],
            })
        );
        assert_eq!(ds, before);
    }

    #[test]
    fn insert_appends_one_row_with_stamp() {
        let mut ds = sheet();
        let out = merge(
            &mut ds,
            &SheetLayout::default(),
            &request(
                "7/2024",
                "Unit C",
                &[(Role::TitularManager, "ana lima"), (Role::SubstituteManager, "NOVA PESSOA")],
            ),
            MergeOptions::default(),
        )
        .unwrap();

        assert_eq!(out.action, MergeAction::Inserted { row: 1 });
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1, "UNIDADE"), Some(&CellValue::text("Unit C")));
        assert_eq!(ds.get(1, "Nº CONTRATO"), Some(&CellValue::text("0007/2024")));
        assert_eq!(
            ds.get(1, "Nº PROCESSO"),
            Some(&CellValue::text("08038.000001/2024-00"))
        );
        assert_eq!(ds.get(1, "GESTOR TITULAR"), Some(&CellValue::text("ana lima")));
        // Found in the existing row, next to ANA LIMA.
        assert_eq!(ds.get(1, "MATRÍCULA GT"), Some(&CellValue::text("111")));
        assert_eq!(ds.get(1, "MATRÍCULA GS"), Some(&CellValue::Empty));
        assert_eq!(
            ds.get(1, "Nº PORTARIA (Nº SEI)"),
            Some(&CellValue::text("PORTARIA Nº 9 (123456)"))
        );
        assert_eq!(ds.get(1, "OBSERVAÇÃO"), Some(&CellValue::Empty));
        assert_eq!(
            out.warnings,
            vec![MergeWarning::PersonNotFound {
                role: Role::SubstituteManager,
                name: "NOVA PESSOA".into(),
            }]
        );
    }

    #[test]
    fn update_touches_only_changed_role_and_its_derived_column() {
        let mut ds = sheet();
        ds.set(0, "Nº PORTARIA (Nº SEI)", "PORTARIA Nº 9 (123456)".into());
        let out = merge(
            &mut ds,
            &SheetLayout::default(),
            &request(
                "1/2024",
                "  unit   a ",
                &[(Role::TitularManager, "BRUNO COSTA"), (Role::TechnicalInspector, "BRUNO COSTA")],
            ),
            MergeOptions::default(),
        )
        .unwrap();

        assert_eq!(out.action, MergeAction::Updated { row: 0 });
        assert!(out.warnings.is_empty());

        let report = diff(&out.snapshot, &ds);
        assert!(report.added.is_empty());
        assert_eq!(report.changed.len(), 1);
        let columns: Vec<&str> = report.changed[0]
            .changes
            .iter()
            .map(|c| c.column.as_str())
            .collect();
        assert_eq!(columns, ["GESTOR TITULAR", "MATRÍCULA GT"]);
        assert_eq!(ds.get(0, "MATRÍCULA GT"), Some(&CellValue::Number(222.0)));
        assert_eq!(ds.get(0, "UNIDADE"), Some(&CellValue::text("Unit A")));
        assert_eq!(ds.get(0, "Nº CONTRATO"), Some(&CellValue::text("1/2024")));
    }

    #[test]
    fn same_merge_twice_is_a_no_op() {
        let mut ds = sheet();
        let req = request(
            "0001/2024",
            "Unit A",
            &[(Role::TitularManager, "CARLA DIAS"), (Role::TechnicalInspector, "BRUNO COSTA")],
        );
        merge(&mut ds, &SheetLayout::default(), &req, MergeOptions::default()).unwrap();
        let second = merge(&mut ds, &SheetLayout::default(), &req, MergeOptions::default()).unwrap();
        assert!(diff(&second.snapshot, &ds).is_empty());
    }

    #[test]
    fn upper_fold_compares_like_lower_fold() {
        let mut ds = sheet();
        let options = MergeOptions {
            case: CaseFold::Upper,
        };
        let out = merge(
            &mut ds,
            &SheetLayout::default(),
            &request("1/2024", "ÜNIT a", &[(Role::TitularManager, "ANA LIMA")]),
            options,
        )
        .unwrap();
        assert_eq!(out.action, MergeAction::Updated { row: 0 });
    }

    #[test]
    fn missing_layout_column_writes_nothing() {
        let mut ds = Dataset::new(["UNIDADE", "Nº CONTRATO"]);
        let err = merge(
            &mut ds,
            &SheetLayout::default(),
            &request("1/2024", "A", &[]),
            MergeOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, MergeError::MissingColumn("Nº PROCESSO".into()));
        assert!(ds.is_empty());
    }

    #[test]
    fn order_reference_forms() {
        let mut req = request("1/2024", "A", &[]);
        assert_eq!(req.order_reference().as_deref(), Some("PORTARIA Nº 9 (123456)"));
        req.document = None;
        assert_eq!(req.order_reference().as_deref(), Some("PORTARIA Nº 9"));
        req.order = " ".into();
        assert_eq!(req.order_reference(), None);
    }
}
