// ABOUTME: In-memory view of the route permission table with one TTL for the whole collection.
// ABOUTME: Resolves concrete paths by exact key first, then by the ordered list of compiled patterns.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use casestore_core::{RoutePattern, RoutePermission};

/// Cached route permissions. Holds no I/O; the resolver decides when to
/// reload it.
#[derive(Debug, Default)]
pub struct PermissionCache {
    loaded_at: Option<Instant>,
    rows: Vec<RoutePermission>,
    /// route path (registered or concrete) -> resolved row, or `None` for a
    /// remembered miss.
    entries: HashMap<String, Option<RoutePermission>>,
    /// Parameterized rows in table order (module, route_path). The first
    /// match wins; there is no other precedence.
    patterns: Vec<(RoutePattern, usize)>,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full load happened less than `ttl` ago.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        match self.loaded_at {
            Some(at) => now.saturating_duration_since(at) <= ttl,
            None => false,
        }
    }

    /// Replace everything with a fresh copy of the table.
    pub fn load(&mut self, rows: Vec<RoutePermission>, now: Instant) {
        self.entries.clear();
        self.patterns.clear();

        for (idx, row) in rows.iter().enumerate() {
            self.entries.insert(row.route_path.clone(), Some(row.clone()));
            let pattern = RoutePattern::compile(&row.route_path);
            if pattern.is_parameterized() {
                self.patterns.push((pattern, idx));
            }
        }

        self.rows = rows;
        self.loaded_at = Some(now);
    }

    /// Drop one key and reset the TTL clock so the next read reloads.
    pub fn invalidate(&mut self, route_path: &str) {
        self.entries.remove(route_path);
        self.loaded_at = None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.patterns.clear();
        self.rows.clear();
        self.loaded_at = None;
    }

    /// All cached rows in table order.
    pub fn rows(&self) -> &[RoutePermission] {
        &self.rows
    }

    /// Resolve a concrete path: exact key, then the first matching pattern.
    /// The outcome (including a miss) is remembered under the concrete path.
    pub fn resolve(&mut self, route_path: &str) -> Option<RoutePermission> {
        if let Some(hit) = self.entries.get(route_path) {
            return hit.clone();
        }

        let found = self
            .patterns
            .iter()
            .find(|(pattern, _)| pattern.matches(route_path))
            .map(|(_, idx)| self.rows[*idx].clone());

        self.entries.insert(route_path.to_string(), found.clone());
        found
    }
}
