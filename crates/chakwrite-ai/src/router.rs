use std::fmt;
use std::str::FromStr;

use chakwrite_common::{ChakError, Payload, UserConfig};

use crate::adapter::SessionAdapter;
use crate::capability::{CapabilityKind, InvokeOptions, SessionOp};
use crate::neuro::{enrich, selection_context};

/// Every AI action the page can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Prompt,
    Writer,
    Rewriter,
    Summarizer,
    Proofreader,
    Autocomplete,
    Paragraph,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Prompt,
        Operation::Writer,
        Operation::Rewriter,
        Operation::Summarizer,
        Operation::Proofreader,
        Operation::Autocomplete,
        Operation::Paragraph,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Prompt => "prompt",
            Operation::Writer => "writer",
            Operation::Rewriter => "rewriter",
            Operation::Summarizer => "summarizer",
            Operation::Proofreader => "proofreader",
            Operation::Autocomplete => "autocomplete",
            Operation::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ChakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(Operation::Prompt),
            "writer" | "write" => Ok(Operation::Writer),
            "rewriter" | "rewrite" => Ok(Operation::Rewriter),
            "summarizer" | "summarize" => Ok(Operation::Summarizer),
            "proofreader" | "proofread" => Ok(Operation::Proofreader),
            "autocomplete" => Ok(Operation::Autocomplete),
            "paragraph" | "paragraph-generate" => Ok(Operation::Paragraph),
            other => Err(ChakError::UnknownOperation(other.to_string())),
        }
    }
}

const PROMPT_KINDS: &[CapabilityKind] = &[CapabilityKind::Prompt];
const WRITER_KINDS: &[CapabilityKind] = &[CapabilityKind::Writer];
const REWRITER_KINDS: &[CapabilityKind] = &[CapabilityKind::Rewriter];
const SUMMARIZER_KINDS: &[CapabilityKind] = &[CapabilityKind::Summarizer];
const PROOFREADER_KINDS: &[CapabilityKind] = &[CapabilityKind::Proofreader];

/// What one handler hands to the session adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    op: SessionOp,
    instruction: String,
    preferred: &'static [CapabilityKind],
    options: InvokeOptions,
}

fn plan(operation: Operation, payload: &Payload, config: &UserConfig) -> Invocation {
    let ctx = selection_context(config, payload.context.as_deref());
    let feature = config.neuro_feature();
    let text = payload.text.as_str();

    let (op, instruction, preferred): (SessionOp, String, &'static [CapabilityKind]) =
        match operation {
            Operation::Prompt => (
                SessionOp::Prompt,
                enrich(feature, &format!("{ctx}{text}")),
                PROMPT_KINDS,
            ),
            Operation::Writer => (
                SessionOp::Write,
                enrich(feature, &format!("{ctx}{text}")),
                WRITER_KINDS,
            ),
            Operation::Rewriter => (
                SessionOp::Rewrite,
                enrich(feature, &format!("{ctx}Rewrite this: \"{text}\"")),
                REWRITER_KINDS,
            ),
            Operation::Summarizer => (
                SessionOp::Summarize,
                enrich(feature, &format!("{ctx}Summarize this: \"{text}\"")),
                SUMMARIZER_KINDS,
            ),
            Operation::Proofreader => (
                SessionOp::Proofread,
                enrich(
                    feature,
                    &format!(
                        "{ctx}Proofread the following text. Correct any grammar, spelling, and \
                         punctuation errors. Only return the corrected text, without any extra \
                         comments.\nText to proofread: \"{text}\""
                    ),
                ),
                PROOFREADER_KINDS,
            ),
            // Continuations must stay in the writer's own voice, so no preamble.
            Operation::Autocomplete => (
                SessionOp::Prompt,
                format!(
                    "{ctx}Continue the following text succinctly and naturally. Only return the \
                     direct continuation without quotes.\n\n{text}"
                ),
                PROMPT_KINDS,
            ),
            Operation::Paragraph => (
                SessionOp::Prompt,
                format!("{ctx}Write a coherent paragraph expanding on: \"{text}\""),
                WRITER_KINDS,
            ),
        };

    Invocation {
        op,
        instruction,
        preferred,
        options: InvokeOptions {
            tone: payload.tone.clone(),
            length: payload.length.clone(),
        },
    }
}

/// Routes an operation name to its handler inside the hidden context.
#[derive(Debug, Clone)]
pub struct CompletionRouter {
    adapter: SessionAdapter,
}

impl CompletionRouter {
    pub fn new(adapter: SessionAdapter) -> Self {
        Self { adapter }
    }

    /// Run an operation and propagate the typed failure.
    pub async fn try_completion(
        &self,
        operation_type: &str,
        payload: &Payload,
        config: &UserConfig,
    ) -> Result<String, ChakError> {
        let operation: Operation = operation_type.parse()?;
        let inv = plan(operation, payload, config);
        self.adapter
            .invoke(inv.op, &inv.instruction, &inv.options, inv.preferred)
            .await
    }

    /// Run an operation; capability failures become a user-safe string.
    ///
    /// Only an unknown operation name is returned as an error.
    pub async fn get_completion(
        &self,
        operation_type: &str,
        payload: &Payload,
        config: &UserConfig,
    ) -> Result<String, ChakError> {
        match self.try_completion(operation_type, payload, config).await {
            Ok(text) => Ok(text),
            Err(e @ ChakError::UnknownOperation(_)) => Err(e),
            Err(e) => {
                tracing::error!(operation=%operation_type, error=%e, "completion failed");
                Ok(format!(
                    "The {operation_type} operation failed. The AI model may not be available or an error occurred."
                ))
            }
        }
    }
}
