use sqlx::sqlite::SqlitePool;

use crate::error::Result;

/// Creates every table and index named in spec section 6's persisted
/// state layout, if not already present. Idempotent, so it is safe to run
/// on every process start rather than gating behind a version check.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            hypothesis TEXT NOT NULL,
            budget_pages INTEGER NOT NULL,
            priority_domains TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL,
            idempotency_key TEXT,
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_idempotency_key
            ON tasks(idempotency_key) WHERE idempotency_key IS NOT NULL;
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            query_text TEXT NOT NULL,
            engine TEXT,
            options_json TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL,
            harvest_rate REAL NOT NULL DEFAULT 0.0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_queries_task_id ON queries(task_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            doi TEXT UNIQUE,
            domain TEXT NOT NULL,
            title TEXT,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            fetched_at TEXT NOT NULL,
            warc_path TEXT,
            har_path TEXT,
            screenshot_path TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fragments (
            id TEXT PRIMARY KEY,
            page_id TEXT NOT NULL,
            text_content TEXT NOT NULL,
            text_hash TEXT NOT NULL,
            span_start INTEGER NOT NULL,
            span_end INTEGER NOT NULL,
            kind TEXT NOT NULL,
            UNIQUE(page_id, text_hash)
        );
        CREATE INDEX IF NOT EXISTS idx_fragments_page_id ON fragments(page_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS fragments_fts USING fts5(
            fragment_id UNINDEXED,
            text_content
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS claims (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            claim_text TEXT NOT NULL,
            claim_adoption_status TEXT NOT NULL DEFAULT 'adopted',
            claim_rejection_reason TEXT,
            claim_rejected_at TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_claims_task_id ON claims(task_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS edges (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            relation TEXT NOT NULL,
            edge_kind TEXT NOT NULL,
            nli_label TEXT,
            nli_confidence REAL NOT NULL DEFAULT 0.0,
            source_domain_category TEXT,
            target_domain_category TEXT,
            citation_source TEXT,
            edge_human_corrected INTEGER NOT NULL DEFAULT 0,
            edge_correction_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(source_id, target_id, relation)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_src_tgt_rel ON edges(source_id, target_id, relation);
        CREATE INDEX IF NOT EXISTS idx_edges_domain_categories
            ON edges(source_domain_category, target_domain_category);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            target_type TEXT NOT NULL,
            target_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            blob BLOB NOT NULL,
            dimension INTEGER NOT NULL,
            UNIQUE(target_type, target_id, model_id)
        );
        CREATE INDEX IF NOT EXISTS idx_embeddings_target ON embeddings(target_type, target_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nli_corrections (
            id TEXT PRIMARY KEY,
            edge_id TEXT NOT NULL,
            premise TEXT NOT NULL,
            hypothesis TEXT NOT NULL,
            predicted_label TEXT NOT NULL,
            predicted_confidence REAL NOT NULL,
            correct_label TEXT NOT NULL,
            reason TEXT,
            corrected_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_nli_corrections_edge_id ON nli_corrections(edge_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS domain_override_rules (
            id TEXT PRIMARY KEY,
            domain_pattern TEXT NOT NULL,
            decision TEXT NOT NULL,
            reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_domain_override_rules_pattern
            ON domain_override_rules(domain_pattern);

        CREATE TABLE IF NOT EXISTS domain_override_events (
            id TEXT PRIMARY KEY,
            rule_id TEXT NOT NULL,
            domain_pattern TEXT NOT NULL,
            decision TEXT NOT NULL,
            reason TEXT,
            event TEXT NOT NULL,
            occurred_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS domain_state (
            host TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            security_rejected_claims INTEGER NOT NULL DEFAULT 0,
            manual_rejected_claims INTEGER NOT NULL DEFAULT 0,
            total_claims INTEGER NOT NULL DEFAULT 0,
            dangerous_pattern INTEGER NOT NULL DEFAULT 0,
            blocked_at TEXT,
            domain_block_reason TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS intervention_items (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            domain TEXT NOT NULL,
            url TEXT NOT NULL,
            intervention_type TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            resolved_at TEXT,
            session_data_json TEXT,
            diagnostic TEXT NOT NULL DEFAULT '',
            severity INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_intervention_items_domain ON intervention_items(domain);
        CREATE INDEX IF NOT EXISTS idx_intervention_items_task_id ON intervention_items(task_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            priority INTEGER NOT NULL,
            input_json TEXT NOT NULL DEFAULT '{}',
            state TEXT NOT NULL,
            enqueued_at TEXT NOT NULL,
            started_at TEXT,
            output_json TEXT,
            cause_id TEXT,
            parent_id TEXT,
            task_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state);
        CREATE INDEX IF NOT EXISTS idx_jobs_parent_id ON jobs(parent_id);
        CREATE INDEX IF NOT EXISTS idx_jobs_task_id ON jobs(task_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calibration_evaluations (
            version INTEGER PRIMARY KEY AUTOINCREMENT,
            evaluated_at TEXT NOT NULL,
            sample_count INTEGER NOT NULL,
            agreement_rate REAL NOT NULL
        );
        CREATE TABLE IF NOT EXISTS calibration_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            active_version INTEGER
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
