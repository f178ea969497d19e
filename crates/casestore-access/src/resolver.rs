// ABOUTME: RoutePermissionResolver answers route-guard questions and applies operator edits.
// ABOUTME: Lookups fail open; edits surface every failure so the operator knows they did not persist.

use std::sync::Arc;
use std::time::Duration;

use casestore_core::{Clock, PermissionUpdate, Role, RouteDeclaration, RoutePermission};
use casestore_store::{LocalStore, StoreError};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cache::PermissionCache;

/// How long a full load of the permission table is trusted.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors returned by permission reads and edits.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("route is not registered: {0}")]
    RouteNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Resolves which roles may enter which UI routes.
///
/// This is a client-side UX gate, not an authorization boundary. A route
/// with no registered row is allowed, and so is any lookup that fails on a
/// storage error. The server remains the authority on what a user may do.
pub struct RoutePermissionResolver {
    store: Arc<LocalStore>,
    ttl: Duration,
    cache: Mutex<PermissionCache>,
}

impl RoutePermissionResolver {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<LocalStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Mutex::new(PermissionCache::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// May `role` enter `route_path`?
    ///
    /// - admin and superuser: always, without touching storage
    /// - agent and lawyer: the matching row's flag; allowed when no row
    ///   matches or the lookup fails
    /// - any other role: never
    pub async fn check_permission(&self, route_path: &str, role: &Role) -> bool {
        if role.bypasses_route_checks() {
            return true;
        }
        if !matches!(role, Role::Agent | Role::Lawyer) {
            tracing::debug!(route = route_path, role = %role, "role is not route-gated, denying");
            return false;
        }

        match self.get_route_permission(route_path).await {
            Ok(Some(permission)) => match role {
                Role::Agent => permission.agent_allowed,
                Role::Lawyer => permission.lawyer_allowed,
                _ => false,
            },
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(
                    route = route_path,
                    role = %role,
                    "permission lookup failed, allowing: {}",
                    e
                );
                true
            }
        }
    }

    /// The row governing `route_path`: an exact match, else the first
    /// registered pattern that matches.
    pub async fn get_route_permission(
        &self,
        route_path: &str,
    ) -> Result<Option<RoutePermission>, AccessError> {
        let mut cache = self.cache.lock().await;
        self.ensure_fresh(&mut cache).await?;
        Ok(cache.resolve(route_path))
    }

    /// Every registered row, ordered by module then route path.
    pub async fn get_all_permissions(&self) -> Result<Vec<RoutePermission>, AccessError> {
        let mut cache = self.cache.lock().await;
        self.ensure_fresh(&mut cache).await?;
        Ok(cache.rows().to_vec())
    }

    async fn ensure_fresh(&self, cache: &mut PermissionCache) -> Result<(), StoreError> {
        let now = self.store.clock().instant();
        if cache.is_fresh(now, self.ttl) {
            return Ok(());
        }
        let rows = self.store.list_route_permissions().await?;
        tracing::debug!("reloaded {} route permissions", rows.len());
        cache.load(rows, now);
        Ok(())
    }

    /// Change the agent/lawyer flags or description of a registered route.
    /// Admin access is not part of the update and cannot be revoked.
    pub async fn update_route_permission(
        &self,
        route_path: &str,
        update: PermissionUpdate,
    ) -> Result<(), AccessError> {
        let result = self.store.update_route_permission(route_path, &update).await;
        self.cache.lock().await.invalidate(route_path);

        match result {
            Ok(true) => {
                tracing::info!(route = route_path, ?update, "route permission updated");
                Ok(())
            }
            Ok(false) => Err(AccessError::RouteNotFound(route_path.to_string())),
            Err(e) => {
                tracing::error!(route = route_path, "route permission update failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Register a route, or overwrite it if the path exists. Use
    /// [`RouteDeclaration::new`] for the allow-by-default flags.
    pub async fn add_route_permission(
        &self,
        route_path: &str,
        module: &str,
        description: &str,
        agent_allowed: bool,
        lawyer_allowed: bool,
    ) -> Result<(), AccessError> {
        let route = RouteDeclaration {
            path: route_path.to_string(),
            module: module.to_string(),
            description: description.to_string(),
            default_agent_allowed: agent_allowed,
            default_lawyer_allowed: lawyer_allowed,
        };
        self.register(&route).await
    }

    async fn register(&self, route: &RouteDeclaration) -> Result<(), AccessError> {
        let result = self.store.upsert_route_permission(route).await;
        self.cache.lock().await.invalidate(&route.path);

        result.map_err(|e| {
            tracing::error!(route = %route.path, "route registration failed: {}", e);
            AccessError::from(e)
        })
    }

    /// Register every route the application declares. Stops at the first
    /// failure; routes before it stay registered.
    pub async fn sync_routes(&self, routes: &[RouteDeclaration]) -> Result<(), AccessError> {
        for route in routes {
            self.register(route).await?;
        }
        self.clear_cache().await;
        tracing::info!("synced {} declared routes", routes.len());
        Ok(())
    }

    /// Forget everything cached; the next read reloads the table.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}
