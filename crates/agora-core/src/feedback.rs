//! User-facing feedback seam.
//!
//! The engine decides *when* to signal success or failure; rendering the
//! toast belongs to the UI layer behind the [`FeedbackEmitter`] trait.
//! The only value the engine keeps from an emission is an opaque
//! [`FeedbackHandle`] used later to dismiss an undo-capable toast.

#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;

use uuid::Uuid;

/// Severity tier of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTier {
    Success,
    Error,
    Warning,
    Info,
}

/// Opaque handle identifying an emitted notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedbackHandle(Uuid);

impl FeedbackHandle {
    /// Allocate a fresh handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FeedbackHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink for user-visible success/error signaling.
///
/// Fire-and-forget: implementations must not block, and no return value
/// is consumed by the engine except the handle.
pub trait FeedbackEmitter: Send + Sync {
    /// Emit a notification at the given tier, returning a dismiss handle.
    fn emit(&self, tier: ToastTier, message: &str) -> FeedbackHandle;

    /// Dismiss a previously emitted notification.
    fn dismiss(&self, handle: FeedbackHandle);

    fn success(&self, message: &str) -> FeedbackHandle {
        self.emit(ToastTier::Success, message)
    }

    fn error(&self, message: &str) -> FeedbackHandle {
        self.emit(ToastTier::Error, message)
    }

    fn warning(&self, message: &str) -> FeedbackHandle {
        self.emit(ToastTier::Warning, message)
    }

    fn info(&self, message: &str) -> FeedbackHandle {
        self.emit(ToastTier::Info, message)
    }
}

/// Emitter that drops everything. Default for headless use.
#[derive(Debug, Default)]
pub struct NullEmitter;

impl FeedbackEmitter for NullEmitter {
    fn emit(&self, _tier: ToastTier, _message: &str) -> FeedbackHandle {
        FeedbackHandle::new()
    }

    fn dismiss(&self, _handle: FeedbackHandle) {}
}

/// A recorded notification, kept by [`RecordingEmitter`] for assertions.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedToast {
    pub tier: ToastTier,
    pub message: String,
    pub handle: FeedbackHandle,
    pub dismissed: bool,
}

/// Emitter that records every emission. Test-only: gated behind the
/// `test-util` feature so downstream test suites can share it without
/// linking it into production builds.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    toasts: Mutex<Vec<RecordedToast>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded toasts, in emission order.
    pub fn toasts(&self) -> Vec<RecordedToast> {
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded toasts at one tier.
    pub fn toasts_at(&self, tier: ToastTier) -> Vec<RecordedToast> {
        self.toasts()
            .into_iter()
            .filter(|t| t.tier == tier)
            .collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl FeedbackEmitter for RecordingEmitter {
    fn emit(&self, tier: ToastTier, message: &str) -> FeedbackHandle {
        let handle = FeedbackHandle::new();
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedToast {
                tier,
                message: message.to_string(),
                handle,
                dismissed: false,
            });
        handle
    }

    fn dismiss(&self, handle: FeedbackHandle) {
        let mut toasts = self
            .toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(toast) = toasts.iter_mut().find(|t| t.handle == handle) {
            toast.dismissed = true;
        }
    }
}
