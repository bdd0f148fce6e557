//! Correlated request/response over the broadcast runtime bus.
//!
//! Each outgoing request gets a fresh id and a pending entry holding the
//! caller's resolver and the timeout task. The entry is removed exactly once,
//! by whichever of response or timeout reaches [`Correlator::complete`] first;
//! the loser finds nothing to remove and does nothing.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use chakwrite_common::{now_ms, AiRequest, ChakError, CompletionResult, Target};

use crate::bus::MessageBus;
use crate::metrics::BrokerMetrics;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

struct PendingCall {
    resolver: oneshot::Sender<CompletionResult>,
    timer: AbortHandle,
}

pub struct Correlator {
    bus: MessageBus,
    pending: DashMap<String, PendingCall>,
    timeout: Duration,
    metrics: Arc<BrokerMetrics>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Millisecond timestamp plus 64 random bits.
fn new_request_id() -> String {
    let random = uuid::Uuid::new_v4().as_u128() as u64;
    format!("{}-{:016x}", now_ms(), random)
}

impl Correlator {
    pub fn new(bus: MessageBus, timeout: Duration, metrics: Arc<BrokerMetrics>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            pending: DashMap::new(),
            timeout,
            metrics,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Tag `request`, publish it for the hidden context and wait for its
    /// response or the timeout. Never fails: every outcome is a result.
    pub async fn send(self: &Arc<Self>, mut request: AiRequest) -> CompletionResult {
        let (resolver, rx) = oneshot::channel();
        let id = self.register(resolver);
        request.id = id.clone();

        tracing::debug!(request_id=%id, operation=%request.operation_type, "dispatching correlated request");

        if let Err(e) = self.bus.publish(request.into_message(Target::Offscreen)) {
            tracing::warn!(request_id=%id, error=%e, "failed to dispatch correlated request");
            self.complete(&id, CompletionResult::failure(e.to_string()));
        }

        rx.await.unwrap_or_else(|_| {
            CompletionResult::failure(
                ChakError::Transport("response channel closed".to_string()).to_string(),
            )
        })
    }

    fn register(self: &Arc<Self>, resolver: oneshot::Sender<CompletionResult>) -> String {
        loop {
            let id = new_request_id();
            match self.pending.entry(id.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!(request_id=%id, "request id collision, regenerating");
                    continue;
                }
                Entry::Vacant(slot) => {
                    let timer = self.arm_timeout(id.clone());
                    slot.insert(PendingCall { resolver, timer });
                    return id;
                }
            }
        }
    }

    fn arm_timeout(self: &Arc<Self>, id: String) -> AbortHandle {
        let this: Weak<Self> = Arc::downgrade(self);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(this) = this.upgrade() {
                this.expire(&id);
            }
        })
        .abort_handle()
    }

    fn expire(&self, id: &str) {
        let err = ChakError::RequestTimedOut {
            timeout_ms: self.timeout.as_millis() as u64,
        };
        if self.complete(id, CompletionResult::failure(err.to_string())) {
            BrokerMetrics::inc(&self.metrics.ai_timeouts_total);
            tracing::warn!(request_id=%id, timeout_ms = self.timeout.as_millis() as u64, "correlated request timed out");
        }
    }

    /// Resolve the pending call `id` with `result`.
    ///
    /// Returns `false` when no such call is pending (already answered, timed
    /// out, or never sent from this process); nothing else happens then.
    pub fn complete(&self, id: &str, result: CompletionResult) -> bool {
        let Some((_, call)) = self.pending.remove(id) else {
            return false;
        };
        call.timer.abort();
        if call.resolver.send(result).is_err() {
            tracing::debug!(request_id=%id, "caller went away before its response arrived");
        }
        true
    }

    /// Response path for `aiActionResponse` messages.
    pub fn accept_response(&self, id: Option<&str>, result: CompletionResult) -> bool {
        let Some(id) = id else {
            tracing::debug!("dropping response without request id");
            BrokerMetrics::inc(&self.metrics.late_responses_dropped_total);
            return false;
        };
        let delivered = self.complete(id, result);
        if !delivered {
            BrokerMetrics::inc(&self.metrics.late_responses_dropped_total);
            tracing::debug!(request_id=%id, "dropping response for unknown or expired request");
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::time::Instant;

    use chakwrite_common::{Message, Payload, UserConfig};

    use super::*;

    fn request(text: &str) -> AiRequest {
        AiRequest::new(
            "rewriter",
            Payload {
                text: text.to_string(),
                tone: Some("neutral".into()),
                ..Payload::default()
            },
            UserConfig::default(),
        )
    }

    async fn next_request_id(rx: &mut tokio::sync::broadcast::Receiver<Message>) -> String {
        loop {
            if let Message::PerformAiAction { target, data } = rx.recv().await.unwrap() {
                assert_eq!(target, Some(Target::Offscreen));
                return data.request_id.unwrap();
            }
        }
    }

    #[test]
    fn request_ids_are_time_prefixed_and_distinct() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        let (ms, suffix) = a.split_once('-').unwrap();
        assert!(ms.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 16);
    }

    #[tokio::test]
    async fn response_resolves_caller_once() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();
        let metrics = Arc::new(BrokerMetrics::default());
        let correlator = Correlator::new(bus, DEFAULT_REQUEST_TIMEOUT, metrics.clone());

        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send(request("hello wrold")).await });

        let id = next_request_id(&mut rx).await;
        assert_eq!(correlator.pending_count(), 1);
        assert!(correlator.accept_response(Some(&id), CompletionResult::ok("hello world")));
        assert!(!correlator.accept_response(Some(&id), CompletionResult::ok("again")));

        assert_eq!(call.await.unwrap(), CompletionResult::ok("hello world"));
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(metrics.late_responses_dropped_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.ai_timeouts_total.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resolves_failure_and_late_response_is_dropped() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();
        let metrics = Arc::new(BrokerMetrics::default());
        let correlator = Correlator::new(bus, DEFAULT_REQUEST_TIMEOUT, metrics.clone());

        let started = Instant::now();
        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send(request("slow")).await });
        let id = next_request_id(&mut rx).await;

        let result = call.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(15_000));
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(correlator.pending_count(), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!correlator.accept_response(Some(&id), CompletionResult::ok("too late")));
        assert_eq!(metrics.ai_timeouts_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.late_responses_dropped_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_delivery_is_a_no_op() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();
        let metrics = Arc::new(BrokerMetrics::default());
        let correlator = Correlator::new(bus, Duration::from_millis(50), metrics.clone());

        let c = correlator.clone();
        let call = tokio::spawn(async move { c.send(request("fast")).await });
        let id = next_request_id(&mut rx).await;
        assert!(correlator.complete(&id, CompletionResult::ok("done")));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(call.await.unwrap(), CompletionResult::ok("done"));
        assert_eq!(metrics.ai_timeouts_total.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn unknown_id_is_dropped_without_side_effects() {
        let bus = MessageBus::new();
        let _rx = bus.subscribe();
        let metrics = Arc::new(BrokerMetrics::default());
        let correlator = Correlator::new(bus, DEFAULT_REQUEST_TIMEOUT, metrics.clone());

        assert!(!correlator.accept_response(Some("nope"), CompletionResult::ok("x")));
        assert!(!correlator.accept_response(None, CompletionResult::ok("x")));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_complete_out_of_order() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();
        let correlator =
            Correlator::new(bus, DEFAULT_REQUEST_TIMEOUT, Arc::new(BrokerMetrics::default()));

        let c1 = correlator.clone();
        let first = tokio::spawn(async move { c1.send(request("one")).await });
        let id1 = next_request_id(&mut rx).await;
        let c2 = correlator.clone();
        let second = tokio::spawn(async move { c2.send(request("two")).await });
        let id2 = next_request_id(&mut rx).await;
        assert_ne!(id1, id2);

        correlator.complete(&id2, CompletionResult::ok("two"));
        correlator.complete(&id1, CompletionResult::ok("one"));

        assert_eq!(first.await.unwrap(), CompletionResult::ok("one"));
        assert_eq!(second.await.unwrap(), CompletionResult::ok("two"));
    }

    #[tokio::test]
    async fn missing_listener_fails_fast() {
        let correlator = Correlator::new(
            MessageBus::new(),
            DEFAULT_REQUEST_TIMEOUT,
            Arc::new(BrokerMetrics::default()),
        );
        let result = correlator.send(request("nobody home")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no listener"));
        assert_eq!(correlator.pending_count(), 0);
    }
}
