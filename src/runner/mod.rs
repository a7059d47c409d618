pub mod progress;
pub mod run_loop;
pub mod state;

pub use progress::{DecisionRecord, ProgressSnapshot};
pub use run_loop::{RunLoop, RunLoopConfig};
pub use state::RunState;
