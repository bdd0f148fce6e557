use serde::{Deserialize, Serialize};

use crate::message::{AiActionData, Message, Payload, Target};
use crate::UserConfig;

/// The only shape that crosses back to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionResult {
    pub fn ok(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// One AI action on its way to the hidden context.
///
/// The id stays empty until the correlator tags the request; after that the
/// request is only ever consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub id: String,
    pub operation_type: String,
    pub payload: Payload,
    pub config: UserConfig,
}

impl AiRequest {
    pub fn new(operation_type: impl Into<String>, payload: Payload, config: UserConfig) -> Self {
        Self {
            id: String::new(),
            operation_type: operation_type.into(),
            payload,
            config,
        }
    }

    pub fn into_message(self, target: Target) -> Message {
        Message::PerformAiAction {
            target: Some(target),
            data: AiActionData {
                operation_type: self.operation_type,
                payload: self.payload,
                request_id: Some(self.id),
                config: Some(self.config),
            },
        }
    }
}
