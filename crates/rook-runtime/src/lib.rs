//! # rook-runtime
//!
//! Session lifecycle and concurrency control.
//!
//! - [`SessionRegistry`]: owns live sessions, cache-aside over the store
//! - [`ConnectionBinding`]: which connection sits in which seat
//! - [`MoveCoordinator`]: applies moves one at a time per session
//! - [`StateReconciler`]: cold loads and write-through
//! - [`BroadcastRouter`]: ordered fan-out through a [`Transport`]
//! - [`GameHub`]: the façade the transport layer drives
//! - [`IdleReaper`]: evicts unattended sessions

#![deny(unsafe_code)]

pub mod binding;
pub mod coordinator;
pub mod hub;
pub mod reaper;
pub mod reconciler;
pub mod registry;
pub mod router;
pub mod session;
pub mod testing;

pub use binding::{Bound, ConnectionBinding, Unbound};
pub use coordinator::MoveCoordinator;
pub use hub::GameHub;
pub use reaper::IdleReaper;
pub use reconciler::StateReconciler;
pub use registry::SessionRegistry;
pub use router::{BroadcastRouter, MoveOutcome, Transport};
pub use session::{Session, SessionState};
