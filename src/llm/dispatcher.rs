//! Request dispatch with a single request in flight
//!
//! The dispatcher answers shortcut questions locally and sends everything
//! else to a worker thread that owns a tokio runtime and the model client.
//! Each request runs as its own task so a cancelled call never holds up the
//! next one. Completions come back as [`DispatchEvent`]s on the orchestrator's
//! channel.

use crate::llm::client::{InteractionMode, ModelClient, ModelRequest};
use crate::llm::prompts::PromptConfig;
use crate::llm::sanitizer::sanitize;
use crate::llm::shortcuts::ShortcutTable;
use crate::messages::Turn;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Assistant text recorded when the model could not produce a reply
pub const FALLBACK_REPLY: &str = "❌ Failed to fetch response";

pub type RequestId = Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a request is already in flight")]
    InFlight,

    #[error("history does not end with a user turn")]
    NoUserTurn,

    #[error("dispatch worker unavailable: {0}")]
    Channel(String),
}

/// Outcome of a successful `dispatch` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Answered locally; the model was not called
    Shortcut(String),
    /// Handed to the worker under this id
    Sent(RequestId),
}

/// The request currently awaiting a completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub text: String,
    pub mode: InteractionMode,
    pub cancelled: bool,
}

/// What the orchestrator should record for a finished request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Reply {
        text: String,
        mode: InteractionMode,
    },
    Failed {
        text: String,
        reason: String,
        mode: InteractionMode,
    },
    /// The request was cancelled before it finished; nothing is recorded
    Cancelled,
}

impl Completion {
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            Completion::Reply { text, .. } | Completion::Failed { text, .. } => Some(text),
            Completion::Cancelled => None,
        }
    }
}

/// Commands processed by the dispatch worker
#[derive(Debug)]
pub enum DispatchCommand {
    Send { id: RequestId, request: ModelRequest },
    /// Abort the task running this request
    Cancel { id: RequestId },
    Shutdown,
}

/// Events emitted by the dispatch worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchEvent {
    Completed {
        id: RequestId,
        result: std::result::Result<String, String>,
    },
    /// The worker could not start or has exited
    Stopped(String),
}

pub struct RequestDispatcher {
    shortcuts: ShortcutTable,
    prompts: PromptConfig,
    pending: Option<PendingRequest>,
    command_tx: Sender<DispatchCommand>,
}

impl RequestDispatcher {
    /// Create the dispatcher and spawn its worker thread
    pub fn new(
        client: Arc<dyn ModelClient>,
        shortcuts: ShortcutTable,
        prompts: PromptConfig,
        events: Sender<DispatchEvent>,
        buffer_size: usize,
    ) -> Self {
        let (command_tx, command_rx) = bounded(buffer_size.max(1));
        spawn_worker(client, command_rx, events);

        Self {
            shortcuts,
            prompts,
            pending: None,
            command_tx,
        }
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// A live (not cancelled) request is awaiting its completion
    pub fn is_in_flight(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.cancelled)
    }

    /// Dispatch the conversation whose last turn is the new user utterance
    pub fn dispatch(
        &mut self,
        history: &[Turn],
        mode: InteractionMode,
    ) -> std::result::Result<Dispatch, DispatchError> {
        if self.is_in_flight() {
            warn!("Dispatch rejected, request already in flight");
            return Err(DispatchError::InFlight);
        }

        let utterance = match history.last() {
            Some(turn) if turn.is_user() => turn.text().to_string(),
            _ => return Err(DispatchError::NoUserTurn),
        };

        if let Some(reply) = self.shortcuts.find(&utterance) {
            info!("Answering from shortcut table");
            return Ok(Dispatch::Shortcut(reply.to_string()));
        }

        let request = ModelRequest {
            system_instruction: self.prompts.system_for(mode).to_string(),
            turns: history.to_vec(),
            language_directive: self.prompts.language_directive.clone(),
        };
        let id = Uuid::new_v4();

        self.command_tx
            .try_send(DispatchCommand::Send { id, request })
            .map_err(|e| DispatchError::Channel(e.to_string()))?;

        debug!("Dispatched request {} ({} mode)", id, mode);
        self.pending = Some(PendingRequest {
            id,
            text: utterance,
            mode,
            cancelled: false,
        });
        Ok(Dispatch::Sent(id))
    }

    /// Resolve a worker completion; completions for other requests yield `None`
    pub fn complete(
        &mut self,
        id: RequestId,
        result: std::result::Result<String, String>,
    ) -> Option<Completion> {
        match &self.pending {
            Some(pending) if pending.id == id => {}
            _ => {
                debug!("Ignoring completion for unknown request {}", id);
                return None;
            }
        }
        let pending = self.pending.take()?;

        if pending.cancelled {
            debug!("Discarding completion for cancelled request {}", id);
            return Some(Completion::Cancelled);
        }

        let mode = pending.mode;
        let completion = match result {
            Ok(raw) => {
                let text = sanitize(&raw);
                if text.is_empty() {
                    Completion::Failed {
                        text: FALLBACK_REPLY.to_string(),
                        reason: "blank reply".to_string(),
                        mode,
                    }
                } else {
                    Completion::Reply { text, mode }
                }
            }
            Err(reason) => Completion::Failed {
                text: FALLBACK_REPLY.to_string(),
                reason,
                mode,
            },
        };

        if let Completion::Failed { reason, .. } = &completion {
            warn!("Request {} failed: {}", id, reason);
        }
        Some(completion)
    }

    /// Mark the pending request cancelled and abort its model call
    ///
    /// A completion that still arrives for it is discarded.
    pub fn cancel(&mut self) -> bool {
        let id = match self.pending.as_mut() {
            Some(pending) if !pending.cancelled => {
                pending.cancelled = true;
                pending.id
            }
            _ => return false,
        };

        info!("Cancelling request {}", id);
        if let Err(e) = self.command_tx.try_send(DispatchCommand::Cancel { id }) {
            warn!("Could not abort request {}: {}", id, e);
        }
        true
    }

    /// Ask the worker to abort outstanding requests and exit
    pub fn shutdown(&self) {
        let _ = self.command_tx.try_send(DispatchCommand::Shutdown);
    }
}

impl Drop for RequestDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("pending", &self.pending)
            .field("shortcuts", &self.shortcuts.rules().len())
            .finish()
    }
}

fn spawn_worker(
    client: Arc<dyn ModelClient>,
    command_rx: Receiver<DispatchCommand>,
    event_tx: Sender<DispatchEvent>,
) {
    std::thread::spawn(move || {
        info!("Dispatch worker starting");

        let runtime = match Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create tokio runtime: {}", e);
                let _ = event_tx.send(DispatchEvent::Stopped(format!(
                    "Runtime creation failed: {}",
                    e
                )));
                return;
            }
        };

        let mut tasks: HashMap<RequestId, AbortHandle> = HashMap::new();
        loop {
            match command_rx.recv() {
                Ok(DispatchCommand::Send { id, request }) => {
                    tasks.retain(|_, task| !task.is_finished());

                    let client = client.clone();
                    let event_tx = event_tx.clone();
                    let task = runtime.spawn(async move {
                        let result = client.complete(&request).await.map_err(|e| e.to_string());
                        if event_tx.send(DispatchEvent::Completed { id, result }).is_err() {
                            debug!("Completion for {} dropped, orchestrator is gone", id);
                        }
                    });
                    tasks.insert(id, task.abort_handle());
                }
                Ok(DispatchCommand::Cancel { id }) => {
                    if let Some(task) = tasks.remove(&id) {
                        task.abort();
                        debug!("Aborted request {}", id);
                    }
                }
                Ok(DispatchCommand::Shutdown) => {
                    info!("Dispatch worker shutting down");
                    break;
                }
                Err(_) => {
                    debug!("Dispatch command channel closed");
                    break;
                }
            }
        }

        for task in tasks.into_values() {
            task.abort();
        }
        runtime.shutdown_background();
    });
}
