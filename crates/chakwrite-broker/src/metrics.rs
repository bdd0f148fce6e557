use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct BrokerMetrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub ai_actions_total: AtomicU64,
    pub ai_failures_total: AtomicU64,
    pub ai_timeouts_total: AtomicU64,
    pub late_responses_dropped_total: AtomicU64,
    pub contexts_created_total: AtomicU64,
    pub context_failures_total: AtomicU64,
}

impl BrokerMetrics {
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render(&self) -> String {
        format!(
            "chakwrite_broker_requests_total {}\n\
             chakwrite_broker_requests_inflight {}\n\
             chakwrite_broker_ai_actions_total {}\n\
             chakwrite_broker_ai_failures_total {}\n\
             chakwrite_broker_ai_timeouts_total {}\n\
             chakwrite_broker_late_responses_dropped_total {}\n\
             chakwrite_broker_contexts_created_total {}\n\
             chakwrite_broker_context_failures_total {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.requests_inflight.load(Ordering::Relaxed),
            self.ai_actions_total.load(Ordering::Relaxed),
            self.ai_failures_total.load(Ordering::Relaxed),
            self.ai_timeouts_total.load(Ordering::Relaxed),
            self.late_responses_dropped_total.load(Ordering::Relaxed),
            self.contexts_created_total.load(Ordering::Relaxed),
            self.context_failures_total.load(Ordering::Relaxed),
        )
    }
}
