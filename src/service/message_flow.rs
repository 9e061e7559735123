use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::agent::{AgentGateway, InvokeOptions};
use crate::db::snapshot_repository::SnapshotStore;
use crate::db::writer::SnapshotWriter;
use crate::demo;
use crate::errors::AppError;
use crate::models::{Conversation, Message};
use crate::normalizer::normalize;
use crate::service::activity::{notify, ActivityObserver};
use crate::store::ConversationStore;

/// Shown in place of a reply when the agent call fails. Details are logged.
pub const GATEWAY_FAILURE_TEXT: &str =
    "Sorry, I couldn't get recommendations right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Sending,
}

/// Result of a completed turn: the assistant (or error) message and the
/// conversation it was written to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub message: Message,
}

impl TurnOutcome {
    pub fn is_error(&self) -> bool {
        self.message.error
    }
}

struct Session {
    store: ConversationStore,
    state: FlowState,
    demo_mode: bool,
}

/// Target of an in-flight turn, captured when the turn starts so a late
/// reply lands in the conversation it was issued for.
struct PendingTurn {
    conversation_id: String,
    session_id: String,
    text: String,
}

/// Returns the flow to `Idle` and clears the activity indicator however the
/// turn ends, including when its future is dropped mid-call.
struct TurnGuard<'a> {
    controller: &'a MessageFlowController,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.controller.session().state = FlowState::Idle;
        let observer = &self.controller.observer;
        notify("set_processing(false)", || observer.set_processing(false));
    }
}

/// Orchestrates turns: user message, agent call, normalization, reply.
///
/// All state sits behind one mutex that is never held across the agent
/// call, so reads, selection and demo toggling remain available while a turn
/// is in flight. Submissions during a turn are rejected, not queued.
#[derive(Clone)]
pub struct MessageFlowController {
    session: Arc<Mutex<Session>>,
    gateway: Arc<dyn AgentGateway>,
    observer: Arc<dyn ActivityObserver>,
    persistence: Arc<dyn SnapshotStore>,
    writer: SnapshotWriter,
    /// Held for a whole demo toggle so overlapping toggles apply in order.
    demo_toggle: Arc<AsyncMutex<()>>,
    agent_id: String,
}

impl MessageFlowController {
    /// Must be called inside a Tokio runtime (spawns the snapshot writer).
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        observer: Arc<dyn ActivityObserver>,
        persistence: Arc<dyn SnapshotStore>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                store: ConversationStore::new(),
                state: FlowState::Idle,
                demo_mode: false,
            })),
            gateway,
            observer,
            writer: SnapshotWriter::spawn(persistence.clone()),
            demo_toggle: Arc::new(AsyncMutex::new(())),
            persistence,
            agent_id: agent_id.into(),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a snapshot unless demo data is showing.
    fn persist(&self, session: &Session) {
        if !session.demo_mode {
            self.writer.save(session.store.conversations().to_vec());
        }
    }

    fn notify_reset(&self) {
        notify("reset", || self.observer.reset());
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn state(&self) -> FlowState {
        self.session().state
    }

    pub fn is_processing(&self) -> bool {
        self.state() == FlowState::Sending
    }

    pub fn is_demo_mode(&self) -> bool {
        self.session().demo_mode
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.session().store.conversations().to_vec()
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.session().store.get(id).cloned()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.session().store.active_id().map(str::to_string)
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.session().store.active().cloned()
    }

    // ── Conversation management ──────────────────────────────────────────────

    /// Replaces the store with persisted conversations. Missing or
    /// unreadable storage yields an empty collection.
    pub async fn load_persisted(&self) {
        let conversations = self.load_snapshot().await;
        info!("Loaded {} persisted conversations", conversations.len());
        self.session().store.replace_all(conversations);
        self.notify_reset();
    }

    async fn load_snapshot(&self) -> Vec<Conversation> {
        match self.persistence.load().await {
            Ok(Some(conversations)) => conversations,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load conversations, starting empty: {e}");
                Vec::new()
            }
        }
    }

    pub fn new_conversation(&self) -> Conversation {
        let conversation = {
            let mut session = self.session();
            let conversation = session.store.create_conversation(None).clone();
            self.persist(&session);
            conversation
        };
        info!("Created conversation {}", conversation.id);
        self.notify_reset();
        conversation
    }

    /// Makes `conversation_id` active. Returns `false` for unknown ids.
    pub fn select(&self, conversation_id: &str) -> bool {
        let selected = self.session().store.select(conversation_id);
        if selected {
            self.notify_reset();
        }
        selected
    }

    /// Swaps between persisted conversations and the built-in demo dataset.
    /// Persistence writes are suspended while demo data is showing.
    pub async fn set_demo_mode(&self, enabled: bool) {
        let _toggle = self.demo_toggle.lock().await;
        if self.is_demo_mode() == enabled {
            return;
        }
        if enabled {
            let mut session = self.session();
            session.demo_mode = true;
            session.store.replace_all(demo::conversations());
        } else {
            self.writer.flush().await;
            let conversations = self.load_snapshot().await;
            let mut session = self.session();
            session.demo_mode = false;
            session.store.replace_all(conversations);
        }
        info!(enabled, "Demo mode toggled");
        self.notify_reset();
    }

    /// Waits for all queued snapshot writes.
    pub async fn flush_persistence(&self) {
        self.writer.flush().await;
    }

    // ── Turns ────────────────────────────────────────────────────────────────

    /// Submits user text, creating a conversation when none is active.
    ///
    /// Blank text is rejected with [`AppError::EmptyField`] and a submission
    /// while another turn is in flight with [`AppError::TurnInFlight`]; in both
    /// cases nothing changes. Agent failures are not errors here: they produce
    /// an error-flagged assistant message.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyField { field_name: "message".to_string() });
        }

        let (turn, created) = {
            let mut session = self.session();
            if session.state == FlowState::Sending {
                return Err(AppError::TurnInFlight);
            }

            let active = session
                .store
                .active()
                .map(|c| (c.id.clone(), c.session_id.clone()));
            let (conversation_id, session_id, created) = match active {
                Some((id, session_id)) => (id, session_id, false),
                None => {
                    let conversation = session.store.create_conversation(Some(text));
                    (conversation.id.clone(), conversation.session_id.clone(), true)
                }
            };

            session
                .store
                .append_message(&conversation_id, Message::user(text));
            session.state = FlowState::Sending;
            self.persist(&session);

            let turn = PendingTurn { conversation_id, session_id, text: text.to_string() };
            (turn, created)
        };

        if created {
            info!("Created conversation {} for new submission", turn.conversation_id);
            self.notify_reset();
        }
        Ok(self.run_turn(turn).await)
    }

    /// Re-asks the last user question of the active conversation after
    /// discarding its error messages. Returns `None` unless the conversation
    /// ends in a failed turn.
    pub async fn retry(&self) -> Result<Option<TurnOutcome>, AppError> {
        let turn = {
            let mut session = self.session();
            if session.state == FlowState::Sending {
                return Err(AppError::TurnInFlight);
            }
            let Some(conversation) = session.store.active() else {
                return Ok(None);
            };
            // Only a failed turn (trailing error message) can be retried.
            if conversation.messages.len() < 2
                || !conversation.messages.last().is_some_and(|m| m.error)
            {
                return Ok(None);
            }
            let Some(last_user) = conversation.messages.iter().rev().find(|m| m.is_user()) else {
                return Ok(None);
            };
            let turn = PendingTurn {
                conversation_id: conversation.id.clone(),
                session_id: conversation.session_id.clone(),
                text: last_user.content.clone(),
            };

            session.store.remove_error_messages(&turn.conversation_id);
            session.state = FlowState::Sending;
            self.persist(&session);
            turn
        };

        info!("Retrying last turn of conversation {}", turn.conversation_id);
        Ok(Some(self.run_turn(turn).await))
    }

    /// Runs the agent call for a turn already in `Sending`.
    async fn run_turn(&self, turn: PendingTurn) -> TurnOutcome {
        let _guard = TurnGuard { controller: self };
        notify("set_processing(true)", || self.observer.set_processing(true));

        let options = InvokeOptions { session_id: turn.session_id.clone() };
        let message = match self.gateway.invoke(&turn.text, &self.agent_id, &options).await {
            Ok(reply) => Message::assistant(normalize(Some(&reply))),
            Err(e) => {
                error!(
                    conversation_id = %turn.conversation_id,
                    session_id = %turn.session_id,
                    "Agent call failed: {e}"
                );
                Message::error(GATEWAY_FAILURE_TEXT)
            }
        };

        {
            let mut session = self.session();
            if !session
                .store
                .append_message(&turn.conversation_id, message.clone())
            {
                warn!(
                    "Reply for conversation {} dropped: conversation no longer loaded",
                    turn.conversation_id
                );
            }
            self.persist(&session);
        }

        TurnOutcome {
            conversation_id: turn.conversation_id,
            message,
        }
    }
}
