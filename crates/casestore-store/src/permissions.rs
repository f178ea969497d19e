// ABOUTME: Route permission table access: list, exact lookup, partial update, and upsert.
// ABOUTME: Pattern resolution lives in the resolver; this module only sees stored rows.

use casestore_core::clock::format_timestamp;
use casestore_core::{Clock, PermissionUpdate, RouteDeclaration, RoutePermission};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StoreError;
use crate::rows;
use crate::store::LocalStore;

const SELECT: &str = "SELECT id, route_path, module, description, agent_allowed, lawyer_allowed,
    admin_allowed, created_at, updated_at FROM route_permissions";

fn from_row(row: &Row<'_>) -> rusqlite::Result<RoutePermission> {
    Ok(RoutePermission {
        id: row.get(0)?,
        route_path: row.get(1)?,
        module: row.get(2)?,
        description: row.get(3)?,
        agent_allowed: row.get(4)?,
        lawyer_allowed: row.get(5)?,
        admin_allowed: row.get(6)?,
        created_at: rows::timestamp(row, 7)?,
        updated_at: rows::timestamp(row, 8)?,
    })
}

/// All rows ordered by module, then route path.
pub(crate) fn select_all(conn: &Connection) -> rusqlite::Result<Vec<RoutePermission>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY module, route_path"))?;
    let rows = stmt.query_map([], from_row)?;

    let mut permissions = Vec::new();
    for row in rows {
        permissions.push(row?);
    }
    Ok(permissions)
}

/// Insert a row verbatim, keeping its id and timestamps. Used by snapshot restore.
pub(crate) fn insert_exact(conn: &Connection, p: &RoutePermission) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO route_permissions
            (id, route_path, module, description, agent_allowed, lawyer_allowed, admin_allowed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            p.id,
            p.route_path,
            p.module,
            p.description,
            p.agent_allowed,
            p.lawyer_allowed,
            p.admin_allowed,
            format_timestamp(&p.created_at),
            format_timestamp(&p.updated_at),
        ],
    )?;
    Ok(())
}

impl LocalStore {
    /// Every stored route permission, ordered by module then route path.
    pub async fn list_route_permissions(&self) -> Result<Vec<RoutePermission>, StoreError> {
        self.read(|conn| Ok(select_all(conn)?)).await
    }

    /// Exact lookup by route path. No pattern matching.
    pub async fn find_route_permission(
        &self,
        route_path: &str,
    ) -> Result<Option<RoutePermission>, StoreError> {
        self.read(|conn| {
            let found = conn
                .query_row(
                    &format!("{SELECT} WHERE route_path = ?1"),
                    params![route_path],
                    from_row,
                )
                .optional()?;
            Ok(found)
        })
        .await
    }

    /// Apply a partial update. Absent fields keep their stored value;
    /// `updated_at` is always refreshed. Returns `false` when no row has
    /// this route path.
    pub async fn update_route_permission(
        &self,
        route_path: &str,
        update: &PermissionUpdate,
    ) -> Result<bool, StoreError> {
        let now = format_timestamp(&self.clock().now());
        self.write(|conn| {
            let changed = conn.execute(
                "UPDATE route_permissions SET
                    agent_allowed = COALESCE(?1, agent_allowed),
                    lawyer_allowed = COALESCE(?2, lawyer_allowed),
                    description = COALESCE(?3, description),
                    updated_at = ?4
                 WHERE route_path = ?5",
                params![
                    update.agent_allowed,
                    update.lawyer_allowed,
                    update.description,
                    now,
                    route_path,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Insert a route, or overwrite module, description and both role flags
    /// when the route path already exists.
    pub async fn upsert_route_permission(&self, route: &RouteDeclaration) -> Result<(), StoreError> {
        let now = format_timestamp(&self.clock().now());
        self.write(|conn| {
            conn.execute(
                "INSERT INTO route_permissions
                    (route_path, module, description, agent_allowed, lawyer_allowed, admin_allowed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                 ON CONFLICT(route_path) DO UPDATE SET
                    module = excluded.module,
                    description = excluded.description,
                    agent_allowed = excluded.agent_allowed,
                    lawyer_allowed = excluded.lawyer_allowed,
                    updated_at = excluded.updated_at",
                params![
                    route.path,
                    route.module,
                    route.description,
                    route.default_agent_allowed,
                    route.default_lawyer_allowed,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use casestore_core::SystemClock;

    use crate::schema::DEFAULT_ROUTES;
    use crate::slot::MemorySlot;
    use crate::store::LocalStore;

    use super::*;

    fn store() -> LocalStore {
        LocalStore::new(Arc::new(MemorySlot::new("test")), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn seeded_rows_are_listed_in_module_then_path_order() {
        let store = store();
        let all = store.list_route_permissions().await.unwrap();

        assert_eq!(all.len(), DEFAULT_ROUTES.len());
        assert!(all.iter().all(|p| p.admin_allowed));
        let paths: Vec<_> = all.iter().map(|p| p.route_path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn partial_update_keeps_untouched_fields() {
        let store = store();
        let before = store
            .find_route_permission("/crm/contacts")
            .await
            .unwrap()
            .unwrap();

        let changed = store
            .update_route_permission(
                "/crm/contacts",
                &PermissionUpdate {
                    agent_allowed: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);

        let after = store
            .find_route_permission("/crm/contacts")
            .await
            .unwrap()
            .unwrap();
        assert!(!after.agent_allowed);
        assert_eq!(after.lawyer_allowed, before.lawyer_allowed);
        assert_eq!(after.description, before.description);
        assert!(after.admin_allowed);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn update_of_unknown_route_reports_no_change() {
        let store = store();
        let changed = store
            .update_route_permission("/nowhere", &PermissionUpdate::default())
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn upsert_inserts_then_overwrites() {
        let store = store();
        let mut route = RouteDeclaration::new("/crm/reports", "Reports", "Monthly reports");
        store.upsert_route_permission(&route).await.unwrap();

        route.default_agent_allowed = false;
        route.description = "Quarterly reports".to_string();
        store.upsert_route_permission(&route).await.unwrap();

        let stored = store
            .find_route_permission("/crm/reports")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.module, "Reports");
        assert_eq!(stored.description, "Quarterly reports");
        assert!(!stored.agent_allowed);
        assert!(stored.lawyer_allowed);
        assert_eq!(
            store.list_route_permissions().await.unwrap().len(),
            DEFAULT_ROUTES.len() + 1
        );
    }
}
