pub mod auth;
pub mod config;
pub mod contract;
pub mod dataset;
pub mod layout;
pub mod normalize;
pub mod role;
pub mod value;

pub use auth::{AuthContext, AuthError};
pub use config::{AppConfig, ConfigEditor, ConfigError};
pub use contract::format_contract_number;
pub use dataset::{Dataset, Sheet, Workbook};
pub use layout::{LayoutError, RoleColumns, SheetLayout};
pub use normalize::{CaseFold, Normalizer, Spacing};
pub use role::{Role, RoleAssignments};
pub use value::CellValue;
