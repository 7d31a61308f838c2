//! Tool protocol server (C16): the only surface an LLM agent talks to.
//! Every call here ends in either a typed response sanitized against its
//! declared output schema, or a generic [`error::ErrorBody`] — never a raw
//! exception or traceback.

pub mod error;
pub mod sanitize;
pub mod scrub;
pub mod server;
pub mod status;
pub mod types;

pub use error::{ErrorBody, Result, ToolError};
pub use server::ToolServer;
