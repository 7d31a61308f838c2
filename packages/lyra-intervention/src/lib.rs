//! Persistent human-intervention queue (C6): CAPTCHA, login, and
//! domain-blocked items keyed by domain, with cookie capture on
//! resolution.

pub mod error;
pub mod queue;
pub mod types;

pub use error::{InterventionError, Result};
pub use queue::{DomainResolved, InMemoryInterventionQueue, InterventionQueue};
pub use types::{InterventionItem, InterventionStatus, InterventionType, ResolveAction};
