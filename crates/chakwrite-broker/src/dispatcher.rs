//! Background-side handling of every message the page (or the hidden
//! context) sends to the broker.

use std::sync::Arc;

use serde::Serialize;

use chakwrite_common::{
    scoped_failure, AiActionData, AiRequest, ChakError, CompletionResult, Message, UserConfig,
};
use chakwrite_store::{load_config, remember_selection, ConfigStore};

use crate::commands::QuickCommand;
use crate::context::ContextManager;
use crate::correlator::Correlator;
use crate::metrics::BrokerMetrics;
use crate::transport::{Destination, Transport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialState {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<UserConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the sender of a message gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Completion(CompletionResult),
    InitialState(InitialState),
    /// Fire-and-forget message taken; there is no reply.
    Accepted,
    NotHandled,
}

pub struct Dispatcher {
    context: Arc<ContextManager>,
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    metrics: Arc<BrokerMetrics>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("correlator", &self.correlator)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        context: Arc<ContextManager>,
        store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
        correlator: Arc<Correlator>,
        metrics: Arc<BrokerMetrics>,
    ) -> Self {
        Self {
            context,
            store,
            transport,
            correlator,
            metrics,
        }
    }

    pub async fn handle(&self, message: Message) -> Dispatch {
        match message {
            Message::PerformAiAction { target: None, data } => {
                Dispatch::Completion(self.perform_ai_action(data).await)
            }
            Message::GetInitialState => Dispatch::InitialState(self.initial_state().await),
            Message::ApplyVisualChanges { settings } => {
                if let Err(e) = self
                    .transport
                    .send_and_forget(Destination::ActivePage, Message::UpdateVisuals { settings })
                {
                    tracing::warn!(error=%e, "failed to relay visual changes");
                }
                Dispatch::Accepted
            }
            Message::UpdateContext { data } => {
                match data.selected_text.as_deref().map(str::trim) {
                    Some(text) if !text.is_empty() => {
                        if let Err(e) = remember_selection(self.store.as_ref(), text).await {
                            tracing::warn!(error=%e, "failed to record selection");
                        }
                    }
                    _ => tracing::debug!("ignoring empty selection update"),
                }
                Dispatch::Accepted
            }
            Message::AiActionResponse { data } => {
                let id = data.original_request.correlation_id().map(str::to_string);
                self.correlator
                    .accept_response(id.as_deref(), data.into_result());
                Dispatch::Accepted
            }
            other => {
                tracing::debug!(action = other.action(), "message not handled by background");
                Dispatch::NotHandled
            }
        }
    }

    async fn perform_ai_action(&self, data: AiActionData) -> CompletionResult {
        BrokerMetrics::inc(&self.metrics.ai_actions_total);
        let operation = data.operation_type;
        if let Some(page_id) = data.request_id.as_deref() {
            tracing::debug!(operation=%operation, page_request_id=%page_id, "page supplied its own request id");
        }

        let result = match self.context.ensure_ready().await {
            Ok(()) => {
                let config = self.snapshot_config().await;
                let request = AiRequest::new(operation.clone(), data.payload, config);
                let result = self.transport.send_and_await_correlated(request).await;
                if result.success {
                    result
                } else {
                    let reason = result.error.unwrap_or_else(|| "no response".to_string());
                    tracing::warn!(operation=%operation, error=%reason, "AI action failed");
                    CompletionResult::failure(scoped_failure(&operation, reason))
                }
            }
            Err(e) => {
                tracing::error!(operation=%operation, error=%e, "hidden context unavailable");
                CompletionResult::failure(e.user_message(&operation))
            }
        };

        if !result.success {
            BrokerMetrics::inc(&self.metrics.ai_failures_total);
        }
        result
    }

    async fn snapshot_config(&self) -> UserConfig {
        match load_config(self.store.as_ref()).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error=%e, "failed to read config, using defaults");
                UserConfig::default()
            }
        }
    }

    async fn initial_state(&self) -> InitialState {
        match load_config(self.store.as_ref()).await {
            Ok(config) => InitialState {
                success: true,
                config: Some(config),
                error: None,
            },
            Err(e) => {
                let err = ChakError::Store(format!("{e:#}"));
                tracing::warn!(error=%err, "failed to read initial state");
                InitialState {
                    success: false,
                    config: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Relay a keyboard shortcut to the active page.
    pub fn run_command(&self, name: &str) -> Result<QuickCommand, ChakError> {
        let command: QuickCommand = name.parse()?;
        self.transport
            .send_and_forget(Destination::ActivePage, command.to_message())?;
        tracing::info!(command = command.name(), "relayed quick action to page");
        Ok(command)
    }
}
