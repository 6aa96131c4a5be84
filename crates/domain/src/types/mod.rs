//! Domain types and models
//!
//! Everything the orchestrator hands back to callers, or accepts from them
//! per call, lives here.

pub mod context;
pub mod envelope;
pub mod kind;
pub mod options;

pub use context::RequestContext;
pub use envelope::{Envelope, ErrorDetail, ResponseMetadata};
pub use kind::ErrorKind;
pub use options::{ContextTags, RequestOptions};
