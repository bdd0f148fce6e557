use std::sync::Arc;
use std::time::Duration;

use chakwrite_ai::{CapabilityHost, CompletionRouter, FallbackOrder, SessionAdapter};
use chakwrite_store::ConfigStore;

pub mod background;
pub mod bus;
pub mod commands;
pub mod context;
pub mod correlator;
pub mod dispatcher;
pub mod metrics;
pub mod offscreen;
pub mod page;
pub mod transport;

use bus::MessageBus;
use context::{ContextHost, ContextManager, ContextOptions};
use correlator::Correlator;
use dispatcher::Dispatcher;
use metrics::BrokerMetrics;
use offscreen::InProcessContextHost;
use page::PageChannel;
use transport::ExtensionTransport;

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub request_timeout: Duration,
    pub fallback_order: FallbackOrder,
    pub context: ContextOptions,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            request_timeout: correlator::DEFAULT_REQUEST_TIMEOUT,
            fallback_order: FallbackOrder::default(),
            context: ContextOptions::default(),
        }
    }
}

/// One background broker with everything it owns, wired together once.
pub struct Broker {
    pub bus: MessageBus,
    pub page: PageChannel,
    pub context: Arc<ContextManager>,
    pub correlator: Arc<Correlator>,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<BrokerMetrics>,
}

impl Broker {
    /// Broker whose hidden context runs in-process on `capabilities`.
    pub fn new(
        settings: BrokerSettings,
        store: Arc<dyn ConfigStore>,
        capabilities: Arc<dyn CapabilityHost>,
    ) -> Self {
        let bus = MessageBus::new();
        let router = Arc::new(CompletionRouter::new(SessionAdapter::new(
            capabilities,
            settings.fallback_order,
        )));
        let host = Arc::new(InProcessContextHost::new(bus.clone(), router));
        Self::with_context_host(settings, store, bus, host)
    }

    pub fn with_context_host(
        settings: BrokerSettings,
        store: Arc<dyn ConfigStore>,
        bus: MessageBus,
        host: Arc<dyn ContextHost>,
    ) -> Self {
        let metrics = Arc::new(BrokerMetrics::default());
        let page = PageChannel::new();
        let correlator = Correlator::new(bus.clone(), settings.request_timeout, metrics.clone());
        let context = Arc::new(ContextManager::new(host, settings.context, metrics.clone()));
        let transport = Arc::new(ExtensionTransport::new(
            bus.clone(),
            page.clone(),
            correlator.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            context.clone(),
            store,
            transport,
            correlator.clone(),
            metrics.clone(),
        ));

        Self {
            bus,
            page,
            context,
            correlator,
            dispatcher,
            metrics,
        }
    }

    /// Start the background listener on the runtime bus.
    pub fn spawn_background(&self) -> tokio::task::JoinHandle<()> {
        let rx = self.bus.subscribe();
        tokio::spawn(background::run(self.dispatcher.clone(), rx))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chakwrite_ai::backends::StubCapabilityHost;
    use chakwrite_ai::CapabilityKind;
    use chakwrite_common::{AiActionData, Message, NeuroFeature, Payload};
    use chakwrite_store::{install_defaults, MemoryConfigStore};
    use futures_util::future::join_all;
    use serde_json::json;

    use super::*;
    use crate::context::ContextState;
    use crate::dispatcher::Dispatch;

    fn ai_action(op: &str, text: &str, tone: Option<&str>) -> Message {
        Message::PerformAiAction {
            target: None,
            data: AiActionData {
                operation_type: op.to_string(),
                payload: Payload {
                    text: text.to_string(),
                    tone: tone.map(str::to_string),
                    ..Payload::default()
                },
                request_id: None,
                config: None,
            },
        }
    }

    async fn broker(kinds: &[CapabilityKind]) -> (Broker, Arc<MemoryConfigStore>) {
        let store = Arc::new(MemoryConfigStore::new());
        install_defaults(store.as_ref()).await.unwrap();
        let broker = Broker::new(
            BrokerSettings::default(),
            store.clone(),
            Arc::new(StubCapabilityHost::with(kinds)),
        );
        broker.spawn_background();
        (broker, store)
    }

    #[tokio::test]
    async fn rewrite_round_trip_through_hidden_context() {
        let (broker, _) = broker(&CapabilityKind::ALL).await;

        let reply = broker
            .dispatcher
            .handle(ai_action("rewriter", "hello wrold", Some("neutral")))
            .await;

        let Dispatch::Completion(result) = reply else {
            panic!("expected completion, got {reply:?}");
        };
        assert!(result.success, "{result:?}");
        assert_eq!(
            result.data.as_deref(),
            Some("[rewriter tone=neutral length=same] Rewrite this: \"hello wrold\"")
        );
        assert_eq!(broker.context.state().await, ContextState::Active);
        assert_eq!(broker.correlator.pending_count(), 0);
        assert_eq!(broker.metrics.contexts_created_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn rewriter_falls_back_to_generic_model() {
        let (broker, _) = broker(&[CapabilityKind::LanguageModel]).await;

        let Dispatch::Completion(result) = broker
            .dispatcher
            .handle(ai_action("rewriter", "hello wrold", Some("formal")))
            .await
        else {
            panic!("expected completion");
        };
        let text = result.data.unwrap();
        assert!(text.starts_with("[languageModel] Rewrite this: \"hello wrold\""));
        assert!(text.contains("formal tone"));
    }

    #[tokio::test]
    async fn missing_capabilities_still_answer_with_safe_text() {
        let (broker, _) = broker(&[]).await;

        let Dispatch::Completion(result) = broker
            .dispatcher
            .handle(ai_action("summarizer", "a long article", None))
            .await
        else {
            panic!("expected completion");
        };
        assert!(result.success);
        assert_eq!(
            result.data.as_deref(),
            Some("The summarizer operation failed. The AI model may not be available or an error occurred.")
        );
    }

    #[tokio::test]
    async fn unknown_operation_comes_back_as_failure() {
        let (broker, _) = broker(&CapabilityKind::ALL).await;

        let Dispatch::Completion(result) = broker
            .dispatcher
            .handle(ai_action("unknown-op", "x", None))
            .await
        else {
            panic!("expected completion");
        };
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("unknown-op failed: Invalid AI action type: unknown-op. Try again.")
        );
    }

    #[tokio::test]
    async fn stored_preferences_and_selection_reach_the_hidden_context() {
        let (broker, store) = broker(&CapabilityKind::ALL).await;
        let mut items = serde_json::Map::new();
        items.insert(
            "userPreferences".into(),
            json!({ "neuroFeature": NeuroFeature::Dyslexia }),
        );
        store.set(items).await.unwrap();
        broker
            .dispatcher
            .handle(Message::UpdateContext {
                data: chakwrite_common::ContextUpdate {
                    selected_text: Some("project brief".into()),
                },
            })
            .await;

        let Dispatch::Completion(result) = broker
            .dispatcher
            .handle(ai_action("prompt", "fix this", None))
            .await
        else {
            panic!("expected completion");
        };
        assert_eq!(
            result.data.as_deref(),
            Some("[prompt] Context: project brief\n\nfix this")
        );
    }

    #[tokio::test]
    async fn parallel_actions_share_one_context_and_resolve_independently() {
        let (broker, _) = broker(&CapabilityKind::ALL).await;

        let texts = ["one", "two", "three", "four"];
        let replies = join_all(texts.iter().map(|t| {
            broker
                .dispatcher
                .handle(ai_action("writer", t, None))
        }))
        .await;

        for (text, reply) in texts.iter().zip(replies) {
            let Dispatch::Completion(result) = reply else {
                panic!("expected completion");
            };
            assert_eq!(result.data.unwrap(), format!("[writer] {text}"));
        }
        assert_eq!(broker.metrics.contexts_created_total.load(Ordering::Relaxed), 1);
        assert_eq!(broker.correlator.pending_count(), 0);
    }
}
