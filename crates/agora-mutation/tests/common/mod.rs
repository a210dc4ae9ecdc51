//! Shared fakes for controller tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use agora_core::SyncError;
use agora_mutation::{MutationApi, MutationRequest};

/// Scripted API double: pops one pre-queued response per call and
/// records the kind of every executed request.
pub struct FakeApi {
    responses: Mutex<VecDeque<Result<Value, SyncError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_err(&self, err: SyncError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MutationApi for FakeApi {
    async fn execute(&self, request: &MutationRequest) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(request.kind().to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"id": "srv-default"})))
    }
}

/// API double whose calls block until the test releases them, for
/// observing mid-flight state and ordering concurrent reconciles.
pub struct GatedApi {
    gates: Mutex<VecDeque<oneshot::Receiver<Result<Value, SyncError>>>>,
}

impl GatedApi {
    /// Create a gated API with `n` pending gates; the returned senders
    /// release the calls in submission order.
    pub fn new(n: usize) -> (Self, Vec<oneshot::Sender<Result<Value, SyncError>>>) {
        let mut gates = VecDeque::new();
        let mut senders = Vec::new();
        for _ in 0..n {
            let (tx, rx) = oneshot::channel();
            gates.push_back(rx);
            senders.push(tx);
        }
        (
            Self {
                gates: Mutex::new(gates),
            },
            senders,
        )
    }
}

#[async_trait]
impl MutationApi for GatedApi {
    async fn execute(&self, _request: &MutationRequest) -> Result<Value, SyncError> {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .pop_front()
            .expect("more calls than gates");
        gate.await.expect("gate sender dropped")
    }
}
