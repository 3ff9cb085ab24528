//! Request orchestration
//!
//! A request moves through
//! `Created → AuthorityResolved → CacheChecked → AuthorizationObtained →
//! TokenExchanged → ResultPersisted → Done`, or ends in `Failed`.

mod cancel;
mod context;
mod orchestrator;
mod parameters;
mod result;

pub(crate) use cancel::with_cancellation;
pub use context::ClientContext;
pub use orchestrator::{RequestOrchestrator, RequestState, TELEMETRY_TARGET};
pub use parameters::{RequestFlags, RequestParameters};
