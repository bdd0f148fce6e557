//! Concrete capability hosts the broker can run against.

pub mod openai;
pub mod stub;

pub use openai::OpenAiCapabilityHost;
pub use stub::StubCapabilityHost;
