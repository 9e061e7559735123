use async_trait::async_trait;
use rig::client::Nothing;
use rig::completion::Chat;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::ollama;
use serde_json::{json, Value};
use tracing::{error, info_span, Instrument};

use crate::errors::AppError;

const PREAMBLE: &str = "You are a product recommendation assistant. \
                        Reply with a single JSON object and nothing else. \
                        Put your prose answer in \"response\" (markdown headings, bullets and bold are allowed). \
                        When recommending, add \"products\": a list of objects with \"name\", \"description\", \
                        \"features\" (list of strings), \"price\" and \"rationale\". \
                        When comparing, add \"comparison\": an object with \"attributes\" (list of row labels) \
                        and \"products\" (list of {\"name\", \"values\"} with values aligned to attributes). \
                        Never invent prices or features you are unsure of; omit them instead.";

/// Per-call options forwarded to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOptions {
    pub session_id: String,
}

/// Boundary to the hosted agent. The reply is an opaque, loosely-typed
/// payload; shaping it is the normalizer's job.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn invoke(
        &self,
        text: &str,
        agent_id: &str,
        options: &InvokeOptions,
    ) -> Result<Value, AppError>;
}

/// Gateway backed by the rig [`ollama::Client`]. Each call is a single,
/// history-free chat turn; the agent id selects the model.
#[derive(Clone)]
pub struct OllamaAgentGateway {
    client: ollama::Client,
    base_url: String,
}

impl OllamaAgentGateway {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| AppError::Unexpected(format!("Failed to build agent client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

/// Maps a rig error message onto an [`AppError`]. Callers turn every gateway
/// error into an error-flagged reply; the variant only sharpens the log line.
fn classify(base_url: &str, agent_id: &str, message: String) -> AppError {
    if message.contains("Connection refused") || message.contains("connect") {
        AppError::AgentUnavailable { host: base_url.to_string() }
    } else if message.contains("model") {
        AppError::ModelNotFound { agent_id: agent_id.to_string() }
    } else {
        AppError::gateway(message)
    }
}

#[async_trait]
impl AgentGateway for OllamaAgentGateway {
    async fn invoke(
        &self,
        text: &str,
        agent_id: &str,
        options: &InvokeOptions,
    ) -> Result<Value, AppError> {
        let span = info_span!("agent_invoke", agent_id, session_id = %options.session_id);
        async {
            let agent = self.client.agent(agent_id).preamble(PREAMBLE).build();

            let content = agent
                .chat(text, Vec::<RigMessage>::new())
                .await
                .map_err(|e| {
                    error!("Agent inference failed: {e}");
                    classify(&self.base_url, agent_id, e.to_string())
                })?;

            Ok::<_, AppError>(json!({
                "result": content,
                "sessionId": options.session_id,
            }))
        }
        .instrument(span)
        .await
    }
}
