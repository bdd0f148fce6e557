use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::capability::{CapabilityHost, CapabilityKind, CapabilitySession, InvokeOptions};

/// Offline host for development: answers with the user part of the
/// instruction, tagged with the capability that produced it.
#[derive(Debug, Clone)]
pub struct StubCapabilityHost {
    present: HashSet<CapabilityKind>,
}

impl StubCapabilityHost {
    pub fn all() -> Self {
        Self::with(&CapabilityKind::ALL)
    }

    pub fn with(kinds: &[CapabilityKind]) -> Self {
        Self {
            present: kinds.iter().copied().collect(),
        }
    }
}

impl Default for StubCapabilityHost {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug)]
struct StubSession {
    kind: CapabilityKind,
}

impl StubSession {
    /// Strip a leading system preamble. The first `USER: ` line ends it;
    /// anything after belongs to the user, even text that repeats the marker.
    fn user_part(input: &str) -> &str {
        if !input.starts_with("SYSTEM:") {
            return input.trim();
        }
        input
            .split_once("\nUSER: ")
            .map(|(_, user)| user)
            .unwrap_or(input)
            .trim()
    }
}

#[async_trait]
impl CapabilitySession for StubSession {
    async fn prompt(&self, input: &str) -> Result<String> {
        Ok(format!("[{}] {}", self.kind, Self::user_part(input)))
    }

    async fn rewrite(&self, input: &str, options: &InvokeOptions) -> Result<String> {
        Ok(format!(
            "[{} tone={} length={}] {}",
            self.kind,
            options.tone(),
            options.length(),
            Self::user_part(input)
        ))
    }
}

#[async_trait]
impl CapabilityHost for StubCapabilityHost {
    fn is_available(&self, kind: CapabilityKind) -> bool {
        self.present.contains(&kind)
    }

    async fn create_session(&self, kind: CapabilityKind) -> Result<Box<dyn CapabilitySession>> {
        if !self.present.contains(&kind) {
            anyhow::bail!("stub capability '{kind}' is disabled");
        }
        Ok(Box::new(StubSession { kind }))
    }
}
