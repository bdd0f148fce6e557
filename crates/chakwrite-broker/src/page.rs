use tokio::sync::broadcast;

use chakwrite_common::Message;

const PAGE_CAPACITY: usize = 256;

/// Channel to the page currently attached to the broker.
#[derive(Debug, Clone)]
pub struct PageChannel {
    tx: broadcast::Sender<Message>,
}

impl PageChannel {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(PAGE_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Best effort: returns `false` when no page is attached.
    pub fn relay(&self, message: Message) -> bool {
        let action = message.action();
        match self.tx.send(message) {
            Ok(n) => {
                tracing::debug!(action, pages = n, "relayed message to page");
                true
            }
            Err(_) => {
                tracing::debug!(action, "no active page, message dropped");
                false
            }
        }
    }
}

impl Default for PageChannel {
    fn default() -> Self {
        Self::new()
    }
}
