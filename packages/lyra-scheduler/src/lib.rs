mod error;
mod queue;
mod registry;
mod scheduler;
mod slots;

pub use error::{Result, SchedulerError};
pub use queue::QueuedJob;
pub use registry::{JobHandler, JobOutcome, JobResult};
pub use scheduler::Scheduler;
