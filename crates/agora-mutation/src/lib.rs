//! Optimistic mutation controller.
//!
//! Every user-initiated write runs the same four-phase protocol:
//!
//! 1. **Begin** — cancel in-flight reads for the touched cache keys and
//!    snapshot their current values.
//! 2. **Apply-locally** — write the optimistic value (synthesizing a
//!    temporary entity for creations), emit the immediate success toast,
//!    dispatch the network request.
//! 3. **Reconcile** — on success replace temporary entities with the
//!    server entity; on failure restore the snapshot verbatim and emit
//!    one failure toast naming the operation.
//! 4. **Settle** — invalidate the authoritative keys so the next read
//!    re-syncs from the source of truth.
//!
//! Removal mutations defer their settle behind a bounded-lifetime
//! [`PendingReversal`] token with explicit `commit`/`revert` entry points.

pub mod apply;
pub mod context;
pub mod controller;
pub mod request;
pub mod reversal;

pub use controller::{ControllerConfig, MutationApi, MutationSuccess, OptimisticController};
pub use request::MutationRequest;
pub use reversal::PendingReversal;
