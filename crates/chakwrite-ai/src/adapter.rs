use std::str::FromStr;
use std::sync::Arc;

use chakwrite_common::ChakError;

use crate::capability::{
    CapabilityHost, CapabilityKind, CapabilitySession, InvokeOptions, SessionOp,
};

/// Where the generic capability sits in a fallback chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackOrder {
    /// Dedicated capabilities first, `languageModel` last.
    #[default]
    DedicatedFirst,
    /// `languageModel` first, dedicated capabilities after it.
    GenericFirst,
}

impl FallbackOrder {
    pub fn name(self) -> &'static str {
        match self {
            FallbackOrder::DedicatedFirst => "dedicated-first",
            FallbackOrder::GenericFirst => "generic-first",
        }
    }

    /// Expand a handler's preferred kinds into the full chain to try.
    ///
    /// The generic model is placed by the policy alone. Listing it in
    /// `preferred` has no effect on its position.
    pub fn chain(self, preferred: &[CapabilityKind]) -> Vec<CapabilityKind> {
        let mut chain: Vec<CapabilityKind> = Vec::with_capacity(preferred.len() + 1);
        for kind in preferred {
            if *kind != CapabilityKind::GENERIC && !chain.contains(kind) {
                chain.push(*kind);
            }
        }
        match self {
            FallbackOrder::DedicatedFirst => chain.push(CapabilityKind::GENERIC),
            FallbackOrder::GenericFirst => chain.insert(0, CapabilityKind::GENERIC),
        }
        chain
    }
}

impl FromStr for FallbackOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dedicated-first" => Ok(FallbackOrder::DedicatedFirst),
            "generic-first" => Ok(FallbackOrder::GenericFirst),
            other => Err(format!(
                "unknown fallback order '{}', available: dedicated-first, generic-first",
                other
            )),
        }
    }
}

/// Instruction handed to a prompt-style capability standing in for a
/// dedicated one.
pub fn fallback_instruction(op: SessionOp, text: &str, options: &InvokeOptions) -> String {
    match op {
        SessionOp::Prompt | SessionOp::Write => text.to_string(),
        SessionOp::Rewrite => format!(
            "{text}\n\nUse a {} tone and keep the length {}. Return only the rewritten text.",
            options.tone(),
            match options.length() {
                "shorter" => "shorter than the original",
                "longer" => "longer than the original",
                _ => "about the same as the original",
            }
        ),
        SessionOp::Summarize => format!("{text}\n\nReturn only the summary."),
        SessionOp::Proofread => format!("{text}\n\nReturn only the corrected text."),
    }
}

/// Uniform `invoke` over whatever capabilities the host exposes.
///
/// Tries each kind of the fallback chain once and never retries a failed call.
#[derive(Clone)]
pub struct SessionAdapter {
    host: Arc<dyn CapabilityHost>,
    order: FallbackOrder,
}

impl std::fmt::Debug for SessionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAdapter")
            .field("order", &self.order.name())
            .finish()
    }
}

impl SessionAdapter {
    pub fn new(host: Arc<dyn CapabilityHost>, order: FallbackOrder) -> Self {
        Self { host, order }
    }

    pub fn order(&self) -> FallbackOrder {
        self.order
    }

    pub async fn invoke(
        &self,
        op: SessionOp,
        text: &str,
        options: &InvokeOptions,
        preferred: &[CapabilityKind],
    ) -> Result<String, ChakError> {
        let chain = self.order.chain(preferred);
        let mut attempted: Vec<String> = Vec::with_capacity(chain.len());
        let mut construction_error: Option<ChakError> = None;

        for kind in chain {
            attempted.push(kind.to_string());

            if !self.host.is_available(kind) {
                tracing::debug!(capability=%kind, "capability not present, trying next");
                continue;
            }

            let session = match self.host.create_session(kind).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(capability=%kind, error=%e, "failed to create capability session");
                    construction_error = Some(ChakError::CapabilityUnavailable {
                        kind: kind.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !preferred.contains(&kind) || (kind.is_prompt_style() && op != SessionOp::Prompt) {
                tracing::info!(capability=%kind, ?op, "falling back to generic capability");
            }

            return run(session.as_ref(), kind, op, text, options)
                .await
                .map_err(|e| ChakError::InvocationFailed {
                    kind: kind.to_string(),
                    message: e.to_string(),
                });
        }

        match construction_error {
            Some(err) if attempted.len() == 1 => Err(err),
            _ => Err(ChakError::NoCapabilityAvailable { attempted }),
        }
    }
}

async fn run(
    session: &dyn CapabilitySession,
    kind: CapabilityKind,
    op: SessionOp,
    text: &str,
    options: &InvokeOptions,
) -> anyhow::Result<String> {
    if kind.is_prompt_style() {
        return session.prompt(&fallback_instruction(op, text, options)).await;
    }
    match op {
        SessionOp::Prompt => session.prompt(text).await,
        SessionOp::Write => session.write(text).await,
        SessionOp::Rewrite => session.rewrite(text, options).await,
        SessionOp::Summarize => session.summarize(text).await,
        SessionOp::Proofread => session.proofread(text).await,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;

    /// Host with scripted availability that records every call.
    #[derive(Default)]
    pub(crate) struct ScriptedHost {
        pub present: HashSet<CapabilityKind>,
        pub broken: HashSet<CapabilityKind>,
        pub failing_calls: bool,
        pub sessions_created: AtomicUsize,
        pub calls: Arc<Mutex<Vec<(CapabilityKind, &'static str, String)>>>,
    }

    impl ScriptedHost {
        pub(crate) fn with(present: &[CapabilityKind]) -> Self {
            Self {
                present: present.iter().copied().collect(),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<(CapabilityKind, &'static str, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct ScriptedSession {
        kind: CapabilityKind,
        fail: bool,
        calls: Arc<Mutex<Vec<(CapabilityKind, &'static str, String)>>>,
    }

    impl ScriptedSession {
        fn record(&self, method: &'static str, input: &str) -> anyhow::Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((self.kind, method, input.to_string()));
            if self.fail {
                return Err(anyhow!("model crashed"));
            }
            Ok(format!("{}:{method}", self.kind))
        }
    }

    #[async_trait]
    impl CapabilitySession for ScriptedSession {
        async fn prompt(&self, input: &str) -> anyhow::Result<String> {
            self.record("prompt", input)
        }

        async fn rewrite(&self, input: &str, _options: &InvokeOptions) -> anyhow::Result<String> {
            self.record("rewrite", input)
        }

        async fn summarize(&self, input: &str) -> anyhow::Result<String> {
            self.record("summarize", input)
        }
    }

    #[async_trait]
    impl CapabilityHost for ScriptedHost {
        fn is_available(&self, kind: CapabilityKind) -> bool {
            self.present.contains(&kind)
        }

        async fn create_session(
            &self,
            kind: CapabilityKind,
        ) -> anyhow::Result<Box<dyn CapabilitySession>> {
            if self.broken.contains(&kind) {
                return Err(anyhow!("model not downloaded"));
            }
            self.sessions_created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                kind,
                fail: self.failing_calls,
                calls: self.calls.clone(),
            }))
        }
    }

    fn adapter(host: Arc<ScriptedHost>, order: FallbackOrder) -> SessionAdapter {
        SessionAdapter::new(host, order)
    }

    #[test]
    fn chain_places_generic_by_policy() {
        let preferred = [CapabilityKind::Rewriter, CapabilityKind::LanguageModel];
        assert_eq!(
            FallbackOrder::DedicatedFirst.chain(&preferred),
            vec![CapabilityKind::Rewriter, CapabilityKind::LanguageModel]
        );
        assert_eq!(
            FallbackOrder::GenericFirst.chain(&preferred),
            vec![CapabilityKind::LanguageModel, CapabilityKind::Rewriter]
        );
        assert_eq!(
            FallbackOrder::DedicatedFirst.chain(&[CapabilityKind::LanguageModel, CapabilityKind::Prompt]),
            vec![CapabilityKind::Prompt, CapabilityKind::LanguageModel]
        );
        assert!("reverse".parse::<FallbackOrder>().is_err());
    }

    #[tokio::test]
    async fn dedicated_capability_uses_dedicated_method() {
        let host = Arc::new(ScriptedHost::with(&CapabilityKind::ALL));
        let out = adapter(host.clone(), FallbackOrder::DedicatedFirst)
            .invoke(
                SessionOp::Rewrite,
                "Rewrite this",
                &InvokeOptions::default(),
                &[CapabilityKind::Rewriter],
            )
            .await
            .unwrap();
        assert_eq!(out, "rewriter:rewrite");
        assert_eq!(host.calls()[0].2, "Rewrite this");
    }

    #[tokio::test]
    async fn missing_capability_falls_back_to_generic_with_template() {
        let host = Arc::new(ScriptedHost::with(&[CapabilityKind::LanguageModel]));
        let options = InvokeOptions {
            tone: Some("formal".into()),
            length: Some("shorter".into()),
        };
        let out = adapter(host.clone(), FallbackOrder::DedicatedFirst)
            .invoke(
                SessionOp::Rewrite,
                "Rewrite this",
                &options,
                &[CapabilityKind::Rewriter],
            )
            .await
            .unwrap();

        assert_eq!(out, "languageModel:prompt");
        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].2.starts_with("Rewrite this"));
        assert!(calls[0].2.contains("formal tone"));
        assert!(calls[0].2.contains("shorter than the original"));
    }

    #[tokio::test]
    async fn broken_construction_moves_to_next_kind() {
        let mut host = ScriptedHost::with(&CapabilityKind::ALL);
        host.broken.insert(CapabilityKind::Summarizer);
        let host = Arc::new(host);

        let out = adapter(host.clone(), FallbackOrder::DedicatedFirst)
            .invoke(
                SessionOp::Summarize,
                "Summarize this",
                &InvokeOptions::default(),
                &[CapabilityKind::Summarizer],
            )
            .await
            .unwrap();
        assert_eq!(out, "languageModel:prompt");
    }

    #[tokio::test]
    async fn nothing_available_names_every_attempt() {
        let host = Arc::new(ScriptedHost::default());
        let err = adapter(host, FallbackOrder::DedicatedFirst)
            .invoke(
                SessionOp::Proofread,
                "txt",
                &InvokeOptions::default(),
                &[CapabilityKind::Proofreader],
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChakError::NoCapabilityAvailable {
                attempted: vec!["proofreader".into(), "languageModel".into()]
            }
        );
    }

    #[tokio::test]
    async fn single_broken_capability_is_unavailable() {
        let mut host = ScriptedHost::with(&[CapabilityKind::LanguageModel]);
        host.broken.insert(CapabilityKind::LanguageModel);
        let err = adapter(Arc::new(host), FallbackOrder::DedicatedFirst)
            .invoke(
                SessionOp::Prompt,
                "hi",
                &InvokeOptions::default(),
                &[CapabilityKind::LanguageModel],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChakError::CapabilityUnavailable { ref kind, .. } if kind == "languageModel"
        ));
    }

    #[tokio::test]
    async fn invocation_failure_is_not_retried() {
        let mut host = ScriptedHost::with(&CapabilityKind::ALL);
        host.failing_calls = true;
        let host = Arc::new(host);

        let err = adapter(host.clone(), FallbackOrder::DedicatedFirst)
            .invoke(
                SessionOp::Rewrite,
                "x",
                &InvokeOptions::default(),
                &[CapabilityKind::Rewriter],
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ChakError::InvocationFailed {
                kind: "rewriter".into(),
                message: "model crashed".into()
            }
        );
        assert_eq!(host.calls().len(), 1);
        assert_eq!(host.sessions_created.load(Ordering::SeqCst), 1);
    }
}
