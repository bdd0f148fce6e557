//! Lifecycle of the single hidden context that runs capability calls.
//!
//! Concurrent `ensure_ready` calls coalesce on one in-flight creation: the
//! first caller moves the slot to `Creating` and every later caller waits on
//! the same watch channel until the creation task publishes its outcome.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use chakwrite_common::ChakError;

use crate::metrics::BrokerMetrics;

/// Arguments handed to the host when a context has to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOptions {
    pub url: String,
    pub reason: String,
    pub justification: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            url: "offscreen.html".to_string(),
            reason: "WORKERS".to_string(),
            justification: "Run on-device AI models outside the page".to_string(),
        }
    }
}

/// Whatever actually owns hidden contexts (the browser, or the in-process worker).
#[async_trait]
pub trait ContextHost: Send + Sync {
    async fn has_context(&self) -> anyhow::Result<bool>;
    async fn create_context(&self, options: &ContextOptions) -> anyhow::Result<()>;
    async fn close_context(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Absent,
    Creating,
    Active,
}

type Outcome = Option<Result<(), String>>;

#[derive(Debug)]
enum Slot {
    Absent,
    Creating(watch::Receiver<Outcome>),
    Active,
}

pub struct ContextManager {
    host: Arc<dyn ContextHost>,
    options: ContextOptions,
    slot: Arc<Mutex<Slot>>,
    metrics: Arc<BrokerMetrics>,
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ContextManager {
    pub fn new(
        host: Arc<dyn ContextHost>,
        options: ContextOptions,
        metrics: Arc<BrokerMetrics>,
    ) -> Self {
        Self {
            host,
            options,
            slot: Arc::new(Mutex::new(Slot::Absent)),
            metrics,
        }
    }

    pub async fn state(&self) -> ContextState {
        match &*self.slot.lock().await {
            Slot::Absent => ContextState::Absent,
            Slot::Creating(_) => ContextState::Creating,
            Slot::Active => ContextState::Active,
        }
    }

    /// Make sure exactly one hidden context exists and is usable.
    pub async fn ensure_ready(&self) -> Result<(), ChakError> {
        loop {
            let mut rx = {
                let mut slot = self.slot.lock().await;
                match &*slot {
                    Slot::Active => match self.host.has_context().await {
                        Ok(true) => return Ok(()),
                        Ok(false) => {
                            tracing::warn!("hidden context vanished, recreating");
                            *slot = Slot::Absent;
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!(error=%e, "context check failed, trusting cached state");
                            return Ok(());
                        }
                    },
                    Slot::Creating(rx) => rx.clone(),
                    Slot::Absent => {
                        let rx = self.begin_creation();
                        *slot = Slot::Creating(rx.clone());
                        rx
                    }
                }
            };

            let waited = rx.wait_for(Option::is_some).await.map(|o| (*o).clone());
            let outcome = match waited {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.reset_if_stuck(&rx).await;
                    Some(Err("creation task ended without a result".to_string()))
                }
            };

            return match outcome {
                Some(Ok(())) => Ok(()),
                Some(Err(reason)) => Err(ChakError::ContextCreationFailed(reason)),
                None => Err(ChakError::ContextCreationFailed("no outcome".to_string())),
            };
        }
    }

    /// Runs on its own task so a caller that gives up does not abandon the
    /// creation half way.
    fn begin_creation(&self) -> watch::Receiver<Outcome> {
        let (tx, rx) = watch::channel(None);
        let host = self.host.clone();
        let options = self.options.clone();
        let slot = self.slot.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let outcome = create_or_adopt(host.as_ref(), &options).await;
            match &outcome {
                Ok(adopted) => {
                    if !adopted {
                        BrokerMetrics::inc(&metrics.contexts_created_total);
                    }
                    *slot.lock().await = Slot::Active;
                }
                Err(e) => {
                    BrokerMetrics::inc(&metrics.context_failures_total);
                    tracing::error!(error=%e, url=%options.url, "failed to create hidden context");
                    *slot.lock().await = Slot::Absent;
                }
            }
            let _ = tx.send(Some(outcome.map(|_| ()).map_err(|e| format!("{e:#}"))));
        });

        rx
    }

    async fn reset_if_stuck(&self, rx: &watch::Receiver<Outcome>) {
        let mut slot = self.slot.lock().await;
        if let Slot::Creating(current) = &*slot {
            if current.same_channel(rx) {
                *slot = Slot::Absent;
            }
        }
    }

    /// Tear the context down. Waits for an in-flight creation first.
    pub async fn close(&self) -> anyhow::Result<()> {
        let mut slot = self.slot.lock().await;
        let in_flight = match &*slot {
            Slot::Creating(rx) => Some(rx.clone()),
            _ => None,
        };
        if let Some(mut rx) = in_flight {
            drop(slot);
            let _ = rx.wait_for(Option::is_some).await;
            slot = self.slot.lock().await;
        }

        if matches!(*slot, Slot::Absent) {
            return Ok(());
        }
        self.host.close_context().await?;
        *slot = Slot::Absent;
        tracing::info!("hidden context closed");
        Ok(())
    }
}

/// Returns `true` when an existing context was adopted instead of created.
async fn create_or_adopt(host: &dyn ContextHost, options: &ContextOptions) -> anyhow::Result<bool> {
    match host.has_context().await {
        Ok(true) => {
            tracing::info!("adopting existing hidden context");
            return Ok(true);
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(error=%e, "context check failed, creating anyway"),
    }
    host.create_context(options).await?;
    tracing::info!(url=%options.url, reason=%options.reason, "hidden context created");
    Ok(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::join_all;

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct MockHost {
        pub(crate) present: AtomicBool,
        pub(crate) creations: AtomicUsize,
        pub(crate) failures_left: AtomicUsize,
        pub(crate) closes: AtomicUsize,
    }

    impl MockHost {
        pub(crate) fn failing(times: usize) -> Self {
            let host = Self::default();
            host.failures_left.store(times, Ordering::SeqCst);
            host
        }
    }

    #[async_trait]
    impl ContextHost for MockHost {
        async fn has_context(&self) -> anyhow::Result<bool> {
            Ok(self.present.load(Ordering::SeqCst))
        }

        async fn create_context(&self, _options: &ContextOptions) -> anyhow::Result<()> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                anyhow::bail!("document limit reached");
            }
            self.present.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn close_context(&self) -> anyhow::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.present.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager(host: Arc<MockHost>) -> Arc<ContextManager> {
        Arc::new(ContextManager::new(
            host,
            ContextOptions::default(),
            Arc::new(BrokerMetrics::default()),
        ))
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_creation() {
        let host = Arc::new(MockHost::default());
        let mgr = manager(host.clone());

        let calls = (0..8).map(|_| {
            let mgr = mgr.clone();
            async move { mgr.ensure_ready().await }
        });
        let results = join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(host.creations.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.state().await, ContextState::Active);
    }

    #[tokio::test]
    async fn failed_creation_reverts_and_next_call_retries() {
        let host = Arc::new(MockHost::failing(1));
        let mgr = manager(host.clone());

        let (a, b) = tokio::join!(mgr.ensure_ready(), mgr.ensure_ready());
        for r in [a, b] {
            match r {
                Err(ChakError::ContextCreationFailed(reason)) => {
                    assert!(reason.contains("document limit"))
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(mgr.state().await, ContextState::Absent);
        assert_eq!(host.creations.load(Ordering::SeqCst), 1);

        mgr.ensure_ready().await.unwrap();
        assert_eq!(host.creations.load(Ordering::SeqCst), 2);
        assert_eq!(mgr.state().await, ContextState::Active);
    }

    #[tokio::test]
    async fn existing_context_is_adopted() {
        let host = Arc::new(MockHost::default());
        host.present.store(true, Ordering::SeqCst);
        let mgr = manager(host.clone());

        mgr.ensure_ready().await.unwrap();
        assert_eq!(host.creations.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.state().await, ContextState::Active);
    }

    #[tokio::test]
    async fn vanished_context_is_recreated() {
        let host = Arc::new(MockHost::default());
        let mgr = manager(host.clone());
        mgr.ensure_ready().await.unwrap();

        host.present.store(false, Ordering::SeqCst);
        mgr.ensure_ready().await.unwrap();
        assert_eq!(host.creations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_returns_to_absent() {
        let host = Arc::new(MockHost::default());
        let mgr = manager(host.clone());

        mgr.close().await.unwrap();
        assert_eq!(host.closes.load(Ordering::SeqCst), 0);

        mgr.ensure_ready().await.unwrap();
        mgr.close().await.unwrap();
        assert_eq!(host.closes.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.state().await, ContextState::Absent);
    }
}
