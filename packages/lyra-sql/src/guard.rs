use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::Connection;

use crate::error::{Result, SqlError};

/// Rejects any input containing a `;` other than a single trailing one
/// (spec 4.15: "reject inputs containing any `;` other than a lone
/// trailing one"). Returns the statement with that trailing `;` stripped.
pub fn enforce_single_statement(sql: &str) -> Result<&str> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(SqlError::Forbidden("empty statement".into()));
    }
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(SqlError::MultiStatement);
    }
    if body.trim().is_empty() {
        return Err(SqlError::Forbidden("empty statement".into()));
    }
    Ok(body)
}

/// Installs the read-only authorizer: only plain reads pass, everything
/// else — DDL/DML, ATTACH/DETACH, PRAGMA, transactions/savepoints,
/// extension loading — is denied, and any action code this match doesn't
/// explicitly recognize falls through the wildcard arm and is denied too
/// (spec 4.15: "unknown action codes default to deny"). Schema reflection
/// goes through `sqlite_master` SELECTs rather than PRAGMA, so PRAGMA
/// never needs a carve-out here.
pub fn install_authorizer(conn: &Connection) {
    conn.authorizer(Some(|ctx: AuthContext<'_>| -> Authorization {
        match ctx.action {
            AuthAction::Select | AuthAction::Read { .. } | AuthAction::Function { .. } => Authorization::Allow,
            _ => Authorization::Deny,
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_statement_passes_through() {
        assert_eq!(enforce_single_statement("SELECT * FROM claims").unwrap(), "SELECT * FROM claims");
        assert_eq!(enforce_single_statement("SELECT * FROM claims;").unwrap(), "SELECT * FROM claims");
    }

    #[test]
    fn embedded_semicolon_is_rejected() {
        let result = enforce_single_statement("SELECT * FROM claims; DROP TABLE claims;");
        assert!(matches!(result, Err(SqlError::MultiStatement)));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(enforce_single_statement("   "), Err(SqlError::Forbidden(_))));
    }

    #[test]
    fn authorizer_denies_attach_and_allows_select() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        install_authorizer(&conn);

        let select_ok = conn.prepare("SELECT x FROM t");
        assert!(select_ok.is_ok());

        let attach_err = conn.execute_batch("ATTACH DATABASE ':memory:' AS other");
        assert!(attach_err.is_err());
    }

    #[test]
    fn authorizer_denies_mutation() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        install_authorizer(&conn);

        let insert_err = conn.execute("INSERT INTO t (x) VALUES (1)", []);
        assert!(insert_err.is_err());
    }
}
