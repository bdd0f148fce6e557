use tokio::sync::broadcast;

use chakwrite_common::{ChakError, Message};

const BUS_CAPACITY: usize = 1024;

/// Runtime message bus shared by the background broker and the hidden context.
///
/// Delivery is broadcast: every subscriber receives every message and filters
/// by target or request id itself. A slow subscriber may lose messages.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<Message>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Returns the number of listeners that will see the message.
    pub fn publish(&self, message: Message) -> Result<usize, ChakError> {
        let action = message.action();
        self.tx.send(message).map_err(|_| {
            ChakError::Transport(format!("no listener for '{action}' on the runtime bus"))
        })
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
