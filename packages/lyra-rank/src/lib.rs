//! Two-stage lexical/dense ranking with Kneedle adaptive cutoff (C10).

pub mod bm25;
pub mod composite;
pub mod embed;
pub mod kneedle;

pub use composite::{rank, Candidate, RankConfig, RankedItem};
pub use kneedle::kneedle_cutoff;
