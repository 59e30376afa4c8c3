//! The six contract oversight roles and per-publication assignments.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::normalize::role_key;

/// A contract oversight role. The set is closed: appointment orders only
/// ever designate these six.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    TitularManager,
    SubstituteManager,
    AdministrativeInspector,
    AdministrativeInspectorSubstitute,
    TechnicalInspector,
    TechnicalInspectorSubstitute,
}

impl Role {
    /// All roles in sheet column order.
    pub const ALL: [Role; 6] = [
        Role::TitularManager,
        Role::SubstituteManager,
        Role::AdministrativeInspector,
        Role::AdministrativeInspectorSubstitute,
        Role::TechnicalInspector,
        Role::TechnicalInspectorSubstitute,
    ];

    /// Canonical label, which is also the default sheet column header.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TitularManager => "GESTOR TITULAR",
            Self::SubstituteManager => "GESTOR SUBSTITUTO",
            Self::AdministrativeInspector => "FISCAL ADMINISTRATIVO",
            Self::AdministrativeInspectorSubstitute => "FISCAL ADMINISTRATIVO SUBSTITUTO",
            Self::TechnicalInspector => "FISCAL TÉCNICO",
            Self::TechnicalInspectorSubstitute => "FISCAL TÉCNICO SUBSTITUTO",
        }
    }

    /// Lookup key of the role label as printed in publications, after
    /// [`role_key`] folding. A titular manager is printed as just "Gestor".
    fn key(&self) -> &'static str {
        match self {
            Self::TitularManager => "gestor",
            Self::SubstituteManager => "gestorsubstituto",
            Self::AdministrativeInspector => "fiscaladministrativo",
            Self::AdministrativeInspectorSubstitute => "fiscaladministrativosubstituto",
            Self::TechnicalInspector => "fiscaltecnico",
            Self::TechnicalInspectorSubstitute => "fiscaltecnicosubstituto",
        }
    }

    /// Resolve a printed role label ("Fiscal Técnico(a) Substituto(a)").
    /// Returns `None` for labels outside the six known roles.
    pub fn from_label(label: &str) -> Option<Role> {
        let key = role_key(label);
        Self::ALL.into_iter().find(|r| r.key() == key)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Person name per role, as designated by one publication.
///
/// Every role is always present; roles the publication does not mention
/// hold an empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignments {
    names: [String; 6],
}

impl RoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: Role) -> &str {
        &self.names[Self::slot(role)]
    }

    /// Assign a name, replacing any earlier assignment of the same role.
    pub fn set(&mut self, role: Role, name: impl Into<String>) {
        self.names[Self::slot(role)] = name.into();
    }

    /// `(role, name)` pairs in column order, including empty names.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        Role::ALL.into_iter().map(|r| (r, self.get(r)))
    }

    /// Roles with a non-empty name.
    pub fn assigned(&self) -> impl Iterator<Item = (Role, &str)> {
        self.iter().filter(|(_, name)| !name.trim().is_empty())
    }

    // Variants are declared in `Role::ALL` order.
    fn slot(role: Role) -> usize {
        role as usize
    }
}

/// Serialised as `{ "GESTOR TITULAR": "...", ... }` in column order.
impl Serialize for RoleAssignments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Role::ALL.len()))?;
        for (role, name) in self.iter() {
            map.serialize_entry(role.label(), name)?;
        }
        map.end()
    }
}

impl<S: Into<String>> FromIterator<(Role, S)> for RoleAssignments {
    fn from_iter<I: IntoIterator<Item = (Role, S)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (role, name) in iter {
            out.set(role, name);
        }
        out
    }
}
