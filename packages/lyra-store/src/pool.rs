use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::Result;
use crate::schema;

/// The evidence graph store (C13/C14/C17): one SQLite database holding
/// every entity in spec section 3, a single writer connection pool, and
/// the on-read Bayesian aggregation and vector search operations layered
/// over it.
#[derive(Clone)]
pub struct EvidenceStore {
    pool: SqlitePool,
}

impl EvidenceStore {
    /// `database_url` examples: `sqlite::memory:`, `file:./lyra.db?mode=rwc`.
    /// Writes serialize on this single pool per spec section 5's "SQLite:
    /// writes serialize on a single writer connection" — capped at one
    /// connection rather than sqlx's usual small pool.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        schema::run_migrations(&store.pool).await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
