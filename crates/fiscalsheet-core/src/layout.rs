//! Column layout of a fiscal assignment sheet.
//!
//! Each role column has a paired "derived" column holding a value linked to
//! the person (their registration, e-mail, ...). The pairing is explicit:
//! either configured by name or resolved once from a loaded header, after
//! which nothing depends on column positions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::role::Role;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("column not found in sheet: {0}")]
    MissingColumn(String),
    #[error("role column {0} has no column to its right to pair with")]
    NoDerivedColumn(String),
}

/// Column names for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColumns {
    pub name: String,
    /// Paired column. `None` means "resolve from the header".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub unit: String,
    pub contract: String,
    pub process: String,
    pub order_reference: String,
    pub roles: BTreeMap<Role, RoleColumns>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            unit: "UNIDADE".into(),
            contract: "Nº CONTRATO".into(),
            process: "Nº PROCESSO".into(),
            order_reference: "Nº PORTARIA (Nº SEI)".into(),
            roles: Role::ALL
                .into_iter()
                .map(|r| {
                    (
                        r,
                        RoleColumns {
                            name: r.label().to_string(),
                            derived: None,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl SheetLayout {
    /// Column holding the person name for `role`.
    pub fn role_column(&self, role: Role) -> &str {
        self.roles
            .get(&role)
            .map(|c| c.name.as_str())
            .unwrap_or(role.label())
    }

    /// Paired column for `role`, if known.
    pub fn derived_column(&self, role: Role) -> Option<&str> {
        self.roles.get(&role).and_then(|c| c.derived.as_deref())
    }

    /// Role whose name column is `column`.
    pub fn role_for_column(&self, column: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|r| self.role_column(*r) == column)
    }

    /// True once every role has an explicit derived column.
    pub fn is_resolved(&self) -> bool {
        Role::ALL.iter().all(|r| self.derived_column(*r).is_some())
    }

    /// Resolve against a sheet header.
    ///
    /// Every named column must exist. Roles without a configured derived
    /// column are paired with the column immediately to the right of their
    /// name column in this header.
    pub fn resolve(&self, columns: &[String]) -> Result<SheetLayout, LayoutError> {
        let position = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| LayoutError::MissingColumn(name.to_string()))
        };

        for name in [&self.unit, &self.contract, &self.process, &self.order_reference] {
            position(name)?;
        }

        let mut resolved = self.clone();
        for role in Role::ALL {
            let name = self.role_column(role).to_string();
            let idx = position(&name)?;
            let derived = match self.derived_column(role) {
                Some(d) => {
                    position(d)?;
                    d.to_string()
                }
                None => columns
                    .get(idx + 1)
                    .cloned()
                    .ok_or_else(|| LayoutError::NoDerivedColumn(name.clone()))?,
            };
            resolved.roles.insert(
                role,
                RoleColumns {
                    name,
                    derived: Some(derived),
                },
            );
        }
        Ok(resolved)
    }

    /// Every column the layout writes to. Derived columns are included only
    /// once resolved.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = vec![
            self.unit.as_str(),
            self.contract.as_str(),
            self.process.as_str(),
            self.order_reference.as_str(),
        ];
        for role in Role::ALL {
            out.push(self.role_column(role));
            if let Some(d) = self.derived_column(role) {
                out.push(d);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        let mut cols = vec![
            "UNIDADE".to_string(),
            "Nº CONTRATO".to_string(),
            "Nº PROCESSO".to_string(),
        ];
        for role in Role::ALL {
            cols.push(role.label().to_string());
            cols.push(format!("MATRÍCULA {}", role.label()));
        }
        cols.push("Nº PORTARIA (Nº SEI)".to_string());
        cols
    }

    #[test]
    fn resolves_derived_from_right_neighbour() {
        let layout = SheetLayout::default().resolve(&header()).unwrap();
        assert!(layout.is_resolved());
        assert_eq!(
            layout.derived_column(Role::TechnicalInspector),
            Some("MATRÍCULA FISCAL TÉCNICO")
        );
    }

    #[test]
    fn explicit_derived_kept() {
        let mut layout = SheetLayout::default();
        layout.roles.get_mut(&Role::TitularManager).unwrap().derived =
            Some("Nº PROCESSO".to_string());
        let resolved = layout.resolve(&header()).unwrap();
        assert_eq!(
            resolved.derived_column(Role::TitularManager),
            Some("Nº PROCESSO")
        );
    }

    #[test]
    fn missing_column_errors() {
        let mut cols = header();
        cols.retain(|c| c != "UNIDADE");
        assert_eq!(
            SheetLayout::default().resolve(&cols),
            Err(LayoutError::MissingColumn("UNIDADE".into()))
        );
    }

    #[test]
    fn last_role_column_without_neighbour_errors() {
        let mut cols: Vec<String> = header()
            .into_iter()
            .filter(|c| c != "MATRÍCULA FISCAL TÉCNICO SUBSTITUTO")
            .collect();
        // Move the last role column to the very end.
        cols.retain(|c| c != "FISCAL TÉCNICO SUBSTITUTO");
        cols.push("FISCAL TÉCNICO SUBSTITUTO".to_string());
        assert_eq!(
            SheetLayout::default().resolve(&cols),
            Err(LayoutError::NoDerivedColumn(
                "FISCAL TÉCNICO SUBSTITUTO".into()
            ))
        );
    }

    #[test]
    fn role_for_column_lookup() {
        let layout = SheetLayout::default();
        assert_eq!(
            layout.role_for_column("GESTOR SUBSTITUTO"),
            Some(Role::SubstituteManager)
        );
        assert_eq!(layout.role_for_column("UNIDADE"), None);
    }

    #[test]
    fn json_roundtrip_with_partial_override() {
        let json = r#"{ "unit": "UNIDADE GESTORA" }"#;
        let layout: SheetLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.unit, "UNIDADE GESTORA");
        assert_eq!(layout.contract, "Nº CONTRATO");
        assert_eq!(layout.roles.len(), 6);
    }
}
