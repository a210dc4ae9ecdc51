//! Shared types for the Agora storefront synchronization engine.
//!
//! The other crates in this workspace build on three things defined here:
//! the [`SyncError`] taxonomy, the [`EventEnvelope`] delivered by the push
//! transport, and the [`FeedbackEmitter`] seam through which the engine
//! signals user-visible success and failure.

pub mod error;
pub mod event;
pub mod feedback;

pub use error::SyncError;
pub use event::EventEnvelope;
pub use feedback::{FeedbackEmitter, FeedbackHandle, NullEmitter, ToastTier};
#[cfg(any(test, feature = "test-util"))]
pub use feedback::{RecordedToast, RecordingEmitter};
