//! Wire messages exchanged between the page, the background broker and the
//! hidden AI context.
//!
//! Every listener on the runtime bus sees every message, so messages aimed at
//! one context carry a `target` and responses carry the request id they answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CompletionResult, UserConfig};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Offscreen,
    Background,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub text: String,

    /// Rewrite tone, e.g. "neutral", "formal", "casual".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,

    /// Rewrite length, e.g. "same", "shorter", "longer".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,

    /// Extra context supplied by the page (surrounding paragraph, title).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiActionData {
    #[serde(rename = "type")]
    pub operation_type: String,

    #[serde(default)]
    pub payload: Payload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Present only on the background → hidden context hop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<UserConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContextUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OriginalRequestData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Echo of the request a response answers.
///
/// Older hidden-context builds echoed the whole request, which puts the id
/// under `data.requestId`; both layouts are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OriginalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OriginalRequestData>,
}

impl OriginalRequest {
    pub fn new(request_id: Option<String>, operation_type: Option<String>) -> Self {
        Self {
            request_id,
            operation_type,
            data: None,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.request_id
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.request_id.as_deref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiActionResponseData {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub original_request: OriginalRequest,
}

impl AiActionResponseData {
    pub fn new(result: CompletionResult, original_request: OriginalRequest) -> Self {
        Self {
            success: result.success,
            data: result.data,
            error: result.error,
            original_request,
        }
    }

    pub fn into_result(self) -> CompletionResult {
        CompletionResult {
            success: self.success,
            data: self.data,
            error: self.error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    PerformAiAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Target>,
        data: AiActionData,
    },
    GetInitialState,
    ApplyVisualChanges {
        #[serde(default)]
        settings: Value,
    },
    UpdateContext {
        #[serde(default)]
        data: ContextUpdate,
    },
    AiActionResponse {
        data: AiActionResponseData,
    },
    /// Page-bound: restyle the page with new accessibility settings.
    UpdateVisuals {
        #[serde(default)]
        settings: Value,
    },
    /// Page-bound: run a hotkey action on the current selection.
    PerformQuickAction {
        #[serde(rename = "type")]
        operation_type: String,
    },
    #[serde(other)]
    Unknown,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::PerformAiAction { .. } => "performAiAction",
            Message::GetInitialState => "getInitialState",
            Message::ApplyVisualChanges { .. } => "applyVisualChanges",
            Message::UpdateContext { .. } => "updateContext",
            Message::AiActionResponse { .. } => "aiActionResponse",
            Message::UpdateVisuals { .. } => "updateVisuals",
            Message::PerformQuickAction { .. } => "performQuickAction",
            Message::Unknown => "unknown",
        }
    }

    pub fn is_for(&self, target: Target) -> bool {
        matches!(self, Message::PerformAiAction { target: Some(t), .. } if *t == target)
    }
}
