//! Mock collaborators for flow and persistence tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::agent::{AgentGateway, InvokeOptions};
use crate::db::snapshot_repository::{MemorySnapshotStore, SnapshotStore};
use crate::errors::AppError;
use crate::models::Conversation;
use crate::service::activity::ActivityObserver;

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub text: String,
    pub agent_id: String,
    pub session_id: String,
}

/// Gateway that returns queued results in order.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<Value, AppError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_reply(&self, reply: Value) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn queue_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(AppError::gateway(message)));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentGateway for ScriptedGateway {
    async fn invoke(
        &self,
        text: &str,
        agent_id: &str,
        options: &InvokeOptions,
    ) -> Result<Value, AppError> {
        self.calls.lock().unwrap().push(RecordedCall {
            text: text.to_string(),
            agent_id: agent_id.to_string(),
            session_id: options.session_id.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::gateway("No scripted reply queued")))
    }
}

/// Gateway that blocks every call until released.
pub struct GatedGateway {
    pub entered: Notify,
    pub release: Notify,
    reply: Value,
}

impl GatedGateway {
    pub fn new(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            reply,
        })
    }
}

#[async_trait]
impl AgentGateway for GatedGateway {
    async fn invoke(&self, _: &str, _: &str, _: &InvokeOptions) -> Result<Value, AppError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverEvent {
    Processing(bool),
    Reset,
}

/// Observer recording every notification; optionally misbehaves after
/// recording.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
    fail: bool,
    panic: bool,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, ..Self::default() })
    }

    pub fn panicking() -> Arc<Self> {
        Arc::new(Self { panic: true, ..Self::default() })
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: ObserverEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        if self.panic {
            panic!("observer panic");
        }
        if self.fail {
            anyhow::bail!("observer failure");
        }
        Ok(())
    }
}

impl ActivityObserver for RecordingObserver {
    fn set_processing(&self, processing: bool) -> anyhow::Result<()> {
        self.record(ObserverEvent::Processing(processing))
    }

    fn reset(&self) -> anyhow::Result<()> {
        self.record(ObserverEvent::Reset)
    }
}

/// Store whose every operation fails.
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<Conversation>>, AppError> {
        Err(AppError::Unexpected("storage offline".to_string()))
    }

    async fn save(&self, _: &[Conversation]) -> Result<(), AppError> {
        Err(AppError::Unexpected("storage offline".to_string()))
    }
}

/// In-memory store whose loads take `delay` to complete.
pub struct SlowSnapshotStore {
    inner: MemorySnapshotStore,
    delay: Duration,
}

impl SlowSnapshotStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner: MemorySnapshotStore::new(), delay })
    }
}

#[async_trait]
impl SnapshotStore for SlowSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<Conversation>>, AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.load().await
    }

    async fn save(&self, conversations: &[Conversation]) -> Result<(), AppError> {
        self.inner.save(conversations).await
    }
}
