pub mod ledger;
pub mod types;

pub use ledger::ConstraintLedger;
pub use types::{ConstraintProgress, LedgerSnapshot, RunStatus};
