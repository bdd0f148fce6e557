use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A host-provided text capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityKind {
    LanguageModel,
    Prompt,
    Writer,
    Rewriter,
    Summarizer,
    Proofreader,
}

impl CapabilityKind {
    /// The general-purpose capability every fallback chain ends in.
    pub const GENERIC: CapabilityKind = CapabilityKind::LanguageModel;

    pub const ALL: [CapabilityKind; 6] = [
        CapabilityKind::LanguageModel,
        CapabilityKind::Prompt,
        CapabilityKind::Writer,
        CapabilityKind::Rewriter,
        CapabilityKind::Summarizer,
        CapabilityKind::Proofreader,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityKind::LanguageModel => "languageModel",
            CapabilityKind::Prompt => "prompt",
            CapabilityKind::Writer => "writer",
            CapabilityKind::Rewriter => "rewriter",
            CapabilityKind::Summarizer => "summarizer",
            CapabilityKind::Proofreader => "proofreader",
        }
    }

    /// Prompt-style capabilities only understand a free-form instruction.
    pub fn is_prompt_style(self) -> bool {
        matches!(self, CapabilityKind::LanguageModel | CapabilityKind::Prompt)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller wants done with the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Prompt,
    Write,
    Rewrite,
    Summarize,
    Proofread,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeOptions {
    pub tone: Option<String>,
    pub length: Option<String>,
}

impl InvokeOptions {
    pub fn tone(&self) -> &str {
        self.tone.as_deref().unwrap_or("neutral")
    }

    pub fn length(&self) -> &str {
        self.length.as_deref().unwrap_or("same")
    }
}

/// A live session on one capability.
///
/// Only `prompt` is mandatory; sessions without a dedicated method answer
/// through `prompt`.
#[async_trait]
pub trait CapabilitySession: Send + Sync {
    async fn prompt(&self, input: &str) -> Result<String>;

    async fn write(&self, input: &str) -> Result<String> {
        self.prompt(input).await
    }

    async fn rewrite(&self, input: &str, _options: &InvokeOptions) -> Result<String> {
        self.prompt(input).await
    }

    async fn summarize(&self, input: &str) -> Result<String> {
        self.prompt(input).await
    }

    async fn proofread(&self, input: &str) -> Result<String> {
        self.prompt(input).await
    }
}

/// The model capability as the hidden context sees it.
#[async_trait]
pub trait CapabilityHost: Send + Sync {
    fn is_available(&self, kind: CapabilityKind) -> bool;

    async fn create_session(&self, kind: CapabilityKind) -> Result<Box<dyn CapabilitySession>>;
}
