use std::sync::Arc;

use async_trait::async_trait;

use chakwrite_common::{AiRequest, ChakError, CompletionResult, Message};

use crate::bus::MessageBus;
use crate::correlator::Correlator;
use crate::page::PageChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Every extension context listening on the runtime bus.
    Runtime,
    /// The page currently attached to the broker.
    ActivePage,
}

/// Cross-context messaging as the background sees it.
#[async_trait]
pub trait Transport: Send + Sync {
    fn send_and_forget(&self, destination: Destination, message: Message) -> Result<(), ChakError>;

    /// Always resolves; failures and timeouts come back as `success: false`.
    async fn send_and_await_correlated(&self, request: AiRequest) -> CompletionResult;
}

#[derive(Debug, Clone)]
pub struct ExtensionTransport {
    bus: MessageBus,
    page: PageChannel,
    correlator: Arc<Correlator>,
}

impl ExtensionTransport {
    pub fn new(bus: MessageBus, page: PageChannel, correlator: Arc<Correlator>) -> Self {
        Self {
            bus,
            page,
            correlator,
        }
    }
}

#[async_trait]
impl Transport for ExtensionTransport {
    fn send_and_forget(&self, destination: Destination, message: Message) -> Result<(), ChakError> {
        match destination {
            Destination::Runtime => self.bus.publish(message).map(|_| ()),
            Destination::ActivePage => {
                // No attached page is not an error for fire-and-forget.
                self.page.relay(message);
                Ok(())
            }
        }
    }

    async fn send_and_await_correlated(&self, request: AiRequest) -> CompletionResult {
        self.correlator.send(request).await
    }
}
