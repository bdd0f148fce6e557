pub mod completion;
pub mod config;
pub mod error;
pub mod message;
pub mod telemetry;

pub use completion::{AiRequest, CompletionResult};
pub use config::{Accessibility, NeuroFeature, SelectionContext, UserConfig, UserPreferences};
pub use error::{scoped_failure, ChakError};
pub use message::{
    AiActionData, AiActionResponseData, ContextUpdate, Message, OriginalRequest, Payload, Target,
};

/// Milliseconds since the Unix epoch, as the extension's `Date.now()` reports it.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
