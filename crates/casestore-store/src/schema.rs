// ABOUTME: Table definitions, indexes, and the default route-permission seed list.
// ABOUTME: Schema creation is idempotent; seeding only runs when the permission table is empty.

use casestore_core::clock::format_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS route_permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    route_path TEXT NOT NULL UNIQUE,
    module TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    agent_allowed INTEGER NOT NULL DEFAULT 1,
    lawyer_allowed INTEGER NOT NULL DEFAULT 1,
    admin_allowed INTEGER NOT NULL DEFAULT 1 CHECK(admin_allowed = 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL CHECK(level IN ('info', 'warn', 'error', 'debug')),
    message TEXT NOT NULL,
    context TEXT,
    user_id TEXT,
    user_role TEXT,
    route_path TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS traces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL,
    span_id TEXT NOT NULL,
    operation TEXT NOT NULL,
    duration_ms REAL NOT NULL CHECK(duration_ms >= 0),
    status TEXT NOT NULL CHECK(status IN ('success', 'error', 'warning')),
    user_id TEXT,
    route_path TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_level ON logs(level);
CREATE INDEX IF NOT EXISTS idx_logs_created_at ON logs(created_at);
CREATE INDEX IF NOT EXISTS idx_traces_trace_id ON traces(trace_id);
CREATE INDEX IF NOT EXISTS idx_traces_created_at ON traces(created_at);
";

/// A route registered on first start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultRoute {
    pub path: &'static str,
    pub module: &'static str,
    pub description: &'static str,
    pub agent_allowed: bool,
    pub lawyer_allowed: bool,
}

const fn route(
    path: &'static str,
    description: &'static str,
    agent_allowed: bool,
    lawyer_allowed: bool,
) -> DefaultRoute {
    DefaultRoute {
        path,
        module: "CRM",
        description,
        agent_allowed,
        lawyer_allowed,
    }
}

/// The out-of-the-box policy. Settings screens are closed to agents.
pub const DEFAULT_ROUTES: &[DefaultRoute] = &[
    route("/crm", "CRM main dashboard", true, true),
    route("/crm/contacts", "Contact list", true, true),
    route("/crm/contacts/:id", "Contact detail", true, true),
    route("/crm/contacts/:id/edit", "Edit contact", true, true),
    route("/crm/contacts/new", "Create contact", true, true),
    route("/crm/leads", "Lead list", true, true),
    route("/crm/leads/:id", "Lead detail", true, true),
    route("/crm/opportunities", "Opportunity list", true, true),
    route("/crm/opportunities/:id", "Opportunity detail", true, true),
    route("/crm/calendar", "Task calendar", true, true),
    route("/crm/tasks/:id", "Task detail", true, true),
    route("/crm/actions", "Actions", true, true),
    route("/crm/expedientes", "Case file list", true, true),
    route("/crm/expedientes/:id", "Case file detail", true, true),
    route("/crm/call", "Call handler", true, true),
    route("/crm/settings", "CRM settings", false, true),
    route("/crm/settings/task-templates", "Task templates", false, true),
    route("/crm/settings/custom-fields", "Custom fields", false, true),
    route("/crm/contracts", "Contracts", true, true),
];

/// Create every table and index that does not exist yet.
pub(crate) fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

/// Insert [`DEFAULT_ROUTES`] if and only if the permission table is empty.
/// Returns the number of rows inserted.
pub(crate) fn seed_default_routes(conn: &Connection, now: &DateTime<Utc>) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM route_permissions", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(0);
    }

    let ts = format_timestamp(now);
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO route_permissions
                (route_path, module, description, agent_allowed, lawyer_allowed, admin_allowed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        )?;
        for r in DEFAULT_ROUTES {
            stmt.execute(params![
                r.path,
                r.module,
                r.description,
                r.agent_allowed,
                r.lawyer_allowed,
                ts
            ])?;
        }
    }
    tx.commit()?;

    Ok(DEFAULT_ROUTES.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creation_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('route_permissions', 'logs', 'traces')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn seeding_only_fills_an_empty_table() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        let now = Utc::now();

        assert_eq!(seed_default_routes(&conn, &now).unwrap(), DEFAULT_ROUTES.len());
        assert_eq!(seed_default_routes(&conn, &now).unwrap(), 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM route_permissions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count as usize, DEFAULT_ROUTES.len());
    }

    #[test]
    fn admin_access_cannot_be_revoked_in_storage() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        seed_default_routes(&conn, &Utc::now()).unwrap();

        let result = conn.execute(
            "UPDATE route_permissions SET admin_allowed = 0 WHERE route_path = '/crm'",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn default_policy_closes_settings_to_agents() {
        let settings = DEFAULT_ROUTES
            .iter()
            .find(|r| r.path == "/crm/settings")
            .unwrap();
        assert!(!settings.agent_allowed);
        assert!(settings.lawyer_allowed);

        let mut paths: Vec<_> = DEFAULT_ROUTES.iter().map(|r| r.path).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), DEFAULT_ROUTES.len());
    }
}
