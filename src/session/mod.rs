pub mod error;
pub mod http;
pub mod ports;
pub mod retry;
pub mod scripted;
pub mod types;

pub use error::{BoundaryError, BoundaryErrorKind};
pub use http::{HttpSession, HttpSessionConfig};
pub use ports::SessionPort;
pub use retry::FetchRetry;
pub use scripted::{ScriptedFailure, ScriptedSession};
pub use types::{ConstraintSpec, ProviderStatus, SessionAck, SessionStart};
