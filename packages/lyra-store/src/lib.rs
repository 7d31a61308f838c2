//! Evidence graph store (C13), vector store (C14), and source
//! verification (C17): one SQLite database holding tasks, queries,
//! pages, fragments, claims, edges, embeddings, domain state, and
//! intervention items, behind a single writer connection.

pub mod aggregation;
pub mod calibration;
pub mod claims;
pub mod domain;
pub mod edges;
pub mod embeddings;
pub mod error;
pub mod fragments;
pub mod intervention;
pub mod jobs;
pub mod overrides;
pub mod pages;
mod schema;
pub mod tasks;
pub mod vector;

pub use aggregation::{ClaimConfidence, EvidenceSummary};
pub use calibration::{CalibrationEvaluation, CalibrationStats};
pub use claims::{Claim, ClaimAdoptionStatus};
pub use domain::{BlockedDomain, ClaimOutcome, DomainState};
pub use edges::{Edge, EdgeKind};
pub use embeddings::TargetType;
pub use error::{Result, StoreError};
pub use fragments::{Fragment, FragmentKind};
pub use intervention::SqliteInterventionQueue;
pub use jobs::{Job, JobState};
pub use overrides::{DomainOverrideRule, SqliteOverrideLookup};
pub use pages::{NewPage, Page};
pub use tasks::{Search, Task};
pub use vector::VectorResult;

mod pool;
pub use pool::EvidenceStore;
