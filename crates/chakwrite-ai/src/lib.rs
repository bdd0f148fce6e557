pub mod adapter;
pub mod backends;
pub mod capability;
pub mod neuro;
pub mod router;

pub use adapter::{FallbackOrder, SessionAdapter};
pub use capability::{CapabilityHost, CapabilityKind, CapabilitySession, InvokeOptions, SessionOp};
pub use router::{CompletionRouter, Operation};
