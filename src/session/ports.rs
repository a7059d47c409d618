use async_trait::async_trait;

use crate::{
    profile::Arrival,
    session::{
        error::BoundaryError,
        types::{SessionAck, SessionStart},
    },
};

/// Boundary to whoever presents arrivals and takes verdicts.
///
/// Calls must alternate strictly: one `fetch_next`, then exactly one
/// `submit_verdict`, before the next `fetch_next`. Implementations report a
/// `ProtocolViolation` when that order is broken.
#[async_trait]
pub trait SessionPort: Send {
    async fn start(&mut self) -> Result<SessionStart, BoundaryError>;

    /// `Ok(None)` means the provider has no more arrivals for this session.
    async fn fetch_next(&mut self) -> Result<Option<Arrival>, BoundaryError>;

    async fn submit_verdict(&mut self, admitted: bool) -> Result<SessionAck, BoundaryError>;
}

#[async_trait]
impl<T: SessionPort + ?Sized> SessionPort for Box<T> {
    async fn start(&mut self) -> Result<SessionStart, BoundaryError> {
        (**self).start().await
    }

    async fn fetch_next(&mut self) -> Result<Option<Arrival>, BoundaryError> {
        (**self).fetch_next().await
    }

    async fn submit_verdict(&mut self, admitted: bool) -> Result<SessionAck, BoundaryError> {
        (**self).submit_verdict(admitted).await
    }
}
