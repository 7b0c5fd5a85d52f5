//! # Conversation
//!
//! One session: a transcript plus the registry and agent its turns run
//! against. Turns are applied atomically. A turn that fails or is cancelled
//! leaves the transcript exactly as it was.

use crate::application::agent::{Agent, AgentError, AgentOutcome};
use crate::application::tooling::ToolRegistry;
use crate::application::transcript::{Compaction, Transcript, TranscriptPolicy};
use crate::infrastructure::model::ModelProvider;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStatus {
    pub session_id: String,
    pub provider: String,
    pub model: String,
    pub turns: usize,
    pub tools: usize,
    pub providers: usize,
}

pub struct Conversation<P: ModelProvider> {
    id: String,
    agent: Arc<Agent<P>>,
    registry: Arc<ToolRegistry>,
    transcript: Transcript,
}

impl<P: ModelProvider> Conversation<P> {
    pub fn new(agent: Arc<Agent<P>>, registry: Arc<ToolRegistry>, policy: TranscriptPolicy) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), agent, registry, policy)
    }

    pub fn with_id(
        id: impl Into<String>,
        agent: Arc<Agent<P>>,
        registry: Arc<ToolRegistry>,
        policy: TranscriptPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            agent,
            registry,
            transcript: Transcript::new(policy),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Swap in another registry. Takes effect from the next turn.
    pub fn set_registry(&mut self, registry: Arc<ToolRegistry>) {
        self.registry = registry;
    }

    /// Re-list every provider and use the resulting registry from now on.
    pub async fn reload_tools(&mut self) -> usize {
        let reloaded = self.registry.reload().await;
        let count = reloaded.len();
        info!(session = %self.id, tools = count, "Reloaded tool registry");
        self.registry = Arc::new(reloaded);
        count
    }

    pub async fn run_turn(&mut self, prompt: &str) -> Result<AgentOutcome, AgentError> {
        self.run_turn_until(prompt, std::future::pending::<()>()).await
    }

    /// Run one user turn, abandoning it as soon as `cancel` resolves.
    ///
    /// Abandoning drops any in-flight model or tool futures. Nothing from the
    /// abandoned turn is committed.
    pub async fn run_turn_until<C>(
        &mut self,
        prompt: &str,
        cancel: C,
    ) -> Result<AgentOutcome, AgentError>
    where
        C: Future<Output = ()>,
    {
        if self.registry.is_stale() {
            debug!(session = %self.id, "Tool catalogue changed, reloading before turn");
            self.reload_tools().await;
        }

        let registry = Arc::clone(&self.registry);
        let outcome = {
            let run = self
                .agent
                .run(&registry, self.transcript.windowed(), prompt);
            tokio::select! {
                result = run => result?,
                _ = cancel => {
                    warn!(session = %self.id, "Turn cancelled, discarding staged turns");
                    return Err(AgentError::Cancelled);
                }
            }
        };

        self.transcript.commit(outcome.turns.clone());
        if let Some(Compaction { evicted, .. }) = self.transcript.compact() {
            debug!(session = %self.id, evicted, "Transcript compacted after turn");
        }
        Ok(outcome)
    }

    /// Forget the history and start a fresh session id.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.id = Uuid::new_v4().to_string();
        info!(session = %self.id, "Conversation cleared");
    }

    pub fn status(&self) -> ConversationStatus {
        let options = self.agent.options();
        ConversationStatus {
            session_id: self.id.clone(),
            provider: options.provider.clone(),
            model: options.model.clone(),
            turns: self.transcript.len(),
            tools: self.registry.len(),
            providers: self.registry.providers().len(),
        }
    }
}
