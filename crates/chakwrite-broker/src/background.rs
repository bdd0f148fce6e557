use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast;

use chakwrite_common::{Message, Target};

use crate::dispatcher::{Dispatch, Dispatcher};

/// Background listener on the runtime bus.
///
/// Requests tagged for the hidden context are skipped; everything else goes
/// through the dispatcher. Replies have no sender to go back to on the bus,
/// so they are only logged.
pub async fn run(dispatcher: Arc<Dispatcher>, mut rx: broadcast::Receiver<Message>) {
    loop {
        match rx.recv().await {
            Ok(message) if message.is_for(Target::Offscreen) => {}
            Ok(message) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let action = message.action();
                    match dispatcher.handle(message).await {
                        Dispatch::NotHandled | Dispatch::Accepted => {}
                        reply => tracing::debug!(action, ?reply, "bus message produced a reply"),
                    }
                });
            }
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "background lagged behind the runtime bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("background listener stopped");
}
