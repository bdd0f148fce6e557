//! The hidden context: listens on the runtime bus for requests tagged for it,
//! runs them through the completion router and answers with the request id.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use chakwrite_ai::CompletionRouter;
use chakwrite_common::{
    AiActionData, AiActionResponseData, CompletionResult, Message, OriginalRequest, Target,
};

use crate::bus::MessageBus;
use crate::context::{ContextHost, ContextOptions};

pub struct OffscreenWorker {
    bus: MessageBus,
    router: Arc<CompletionRouter>,
}

impl OffscreenWorker {
    pub fn new(bus: MessageBus, router: Arc<CompletionRouter>) -> Self {
        Self { bus, router }
    }

    /// `rx` must be subscribed before the caller considers the context
    /// ready, or the first request could be missed.
    pub async fn run(self, mut rx: broadcast::Receiver<Message>) {
        loop {
            match rx.recv().await {
                Ok(Message::PerformAiAction {
                    target: Some(Target::Offscreen),
                    data,
                }) => {
                    let bus = self.bus.clone();
                    let router = self.router.clone();
                    tokio::spawn(async move {
                        let reply = handle_request(&router, data).await;
                        if let Err(e) = bus.publish(reply) {
                            tracing::warn!(error=%e, "failed to publish AI response");
                        }
                    });
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "hidden context lagged behind the runtime bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::info!("hidden context stopped");
    }
}

async fn handle_request(router: &CompletionRouter, data: AiActionData) -> Message {
    let config = data.config.unwrap_or_default();
    tracing::debug!(operation=%data.operation_type, request_id=?data.request_id, "AI request received");

    let result = match router
        .get_completion(&data.operation_type, &data.payload, &config)
        .await
    {
        Ok(text) => CompletionResult::ok(text),
        Err(e) => {
            tracing::warn!(operation=%data.operation_type, error=%e, "AI request rejected");
            CompletionResult::failure(e.to_string())
        }
    };

    Message::AiActionResponse {
        data: AiActionResponseData::new(
            result,
            OriginalRequest::new(data.request_id, Some(data.operation_type)),
        ),
    }
}

/// Context host that runs the hidden context as a task in this process.
pub struct InProcessContextHost {
    bus: MessageBus,
    router: Arc<CompletionRouter>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InProcessContextHost {
    pub fn new(bus: MessageBus, router: Arc<CompletionRouter>) -> Self {
        Self {
            bus,
            router,
            worker: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ContextHost for InProcessContextHost {
    async fn has_context(&self) -> anyhow::Result<bool> {
        Ok(self
            .worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished()))
    }

    async fn create_context(&self, options: &ContextOptions) -> anyhow::Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            anyhow::bail!("only a single hidden context ({}) may exist", options.url);
        }
        let rx = self.bus.subscribe();
        let w = OffscreenWorker::new(self.bus.clone(), self.router.clone());
        *worker = Some(tokio::spawn(w.run(rx)));
        Ok(())
    }

    async fn close_context(&self) -> anyhow::Result<()> {
        if let Some(handle) = self.worker.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}
