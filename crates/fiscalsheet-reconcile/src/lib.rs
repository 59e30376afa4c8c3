pub mod batch;
pub mod budget;
pub mod diff;
pub mod lookup;
pub mod merge;

pub use batch::{BatchOptions, BatchReport, Fragment, FragmentOutcome, FragmentStatus, run_batch};
pub use budget::{BudgetChange, BudgetError, BudgetReport, ChangeKind, LOG_SHEET, update_budget};
pub use diff::{AddedRow, CellChange, ChangedRow, DiffReport, diff};
pub use lookup::PersonIndex;
pub use merge::{
    Conflict, MergeAction, MergeError, MergeOptions, MergeOutcome, MergeRequest, MergeWarning,
    merge,
};
