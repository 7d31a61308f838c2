use std::collections::HashMap;
use std::time::Instant;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::budget::{clear_progress_handler, install_progress_handler, QueryOptions};
use crate::error::{Result, SqlError};
use crate::guard::{enforce_single_statement, install_authorizer};
use crate::value::value_to_json;
use crate::views::{self, ViewTemplate};

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
    pub schema: Option<Vec<TableSchema>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub sql: String,
}

enum WorkerCommand {
    Query { sql: String, options: QueryOptions, resp: oneshot::Sender<Result<QueryResult>> },
    Close,
}

fn run_bounded_select(conn: &Connection, body: &str, options: QueryOptions) -> Result<(Vec<String>, Vec<Vec<serde_json::Value>>, bool)> {
    let wrapped = format!("SELECT * FROM ({body}) AS lyra_sql_bounded LIMIT ?1");
    let mut stmt = conn
        .prepare(&wrapped)
        .map_err(|e| classify_error(e))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let requested = (options.limit + 1) as i64;
    let mut rows_out = Vec::with_capacity(options.limit);
    let mut rows = stmt.query(rusqlite::params![requested]).map_err(classify_error)?;

    let mut truncated = false;
    let mut seen = 0usize;
    while let Some(row) = rows.next().map_err(classify_error)? {
        seen += 1;
        if seen > options.limit {
            truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value_ref = row.get_ref(i).map_err(classify_error)?;
            values.push(value_to_json(value_ref));
        }
        rows_out.push(values);
    }

    Ok((columns, rows_out, truncated))
}

fn classify_error(err: rusqlite::Error) -> SqlError {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
        if ffi_err.code == rusqlite::ErrorCode::OperationInterrupted {
            return SqlError::Timeout;
        }
    }
    SqlError::Database(err.to_string())
}

fn schema_snapshot(conn: &Connection) -> Result<Vec<TableSchema>> {
    let mut stmt = conn
        .prepare("SELECT name, sql FROM sqlite_master WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .map_err(classify_error)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TableSchema { name: row.get(0)?, sql: row.get::<_, Option<String>>(1)?.unwrap_or_default() })
        })
        .map_err(classify_error)?;
    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(classify_error)
}

fn execute_query(conn: &Connection, sql: &str, options: QueryOptions) -> Result<QueryResult> {
    let body = enforce_single_statement(sql)?;
    let start = Instant::now();
    install_progress_handler(conn, options.timeout_ms, options.max_vm_steps);
    let result = run_bounded_select(conn, body, options);
    clear_progress_handler(conn);

    let (columns, rows, truncated) = result?;
    let schema = if options.include_schema { Some(schema_snapshot(conn)?) } else { None };

    Ok(QueryResult {
        row_count: rows.len(),
        columns,
        rows,
        truncated,
        elapsed_ms: start.elapsed().as_millis() as u64,
        schema,
    })
}

fn start_worker(database_path: String) -> Result<mpsc::Sender<WorkerCommand>> {
    let (tx, mut rx) = mpsc::channel::<WorkerCommand>(64);
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

    std::thread::spawn(move || {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        let conn = match Connection::open_with_flags(&database_path, flags) {
            Ok(conn) => conn,
            Err(e) => {
                let _ = ready_tx.send(Err(SqlError::Database(e.to_string())));
                return;
            }
        };
        install_authorizer(&conn);
        let _ = ready_tx.send(Ok(()));

        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                WorkerCommand::Query { sql, options, resp } => {
                    let result = execute_query(&conn, &sql, options);
                    if resp.send(result).is_err() {
                        warn!("query_sql response receiver dropped");
                    }
                }
                WorkerCommand::Close => break,
            }
        }
    });

    ready_rx.recv().map_err(|_| SqlError::ChannelClosed)??;
    Ok(tx)
}

/// Read-only SQL exploration surface (C15): a second SQLite connection
/// opened `mode=ro` against the evidence database, guarded by an
/// authorizer denylist and a progress-handler execution budget. The
/// connection lives on its own OS thread (`rusqlite::Connection` is
/// `!Send`/`!Sync`) and is driven by a command channel, mirroring the
/// teacher's blocking-worker-thread SQLite backend shape.
pub struct SqlEngine {
    worker_tx: mpsc::Sender<WorkerCommand>,
}

impl SqlEngine {
    pub async fn open(database_path: &str) -> Result<Self> {
        let path = database_path.to_string();
        let worker_tx = tokio::task::spawn_blocking(move || start_worker(path))
            .await
            .map_err(|_| SqlError::ChannelClosed)??;
        Ok(Self { worker_tx })
    }

    pub async fn query(&self, sql: &str, options: QueryOptions) -> Result<QueryResult> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.worker_tx
            .send(WorkerCommand::Query { sql: sql.to_string(), options: options.clamped(), resp: resp_tx })
            .await
            .map_err(|_| SqlError::ChannelClosed)?;
        resp_rx.await.map_err(|_| SqlError::ChannelClosed)?
    }

    pub async fn query_view(&self, name: &str, params: &HashMap<String, serde_json::Value>, options: QueryOptions) -> Result<QueryResult> {
        let template = views::find(name).ok_or_else(|| SqlError::UnknownView(name.to_string()))?;
        let sql = template.render(params)?;
        self.query(&sql, options).await
    }

    pub fn list_views(&self) -> Vec<ViewTemplate> {
        views::all()
    }

    pub async fn close(&self) {
        let _ = self.worker_tx.send(WorkerCommand::Close).await;
    }
}
