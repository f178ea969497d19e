// ABOUTME: Route permission resolution for the CRM's client-side route guards.
// ABOUTME: Answers "may this role enter this route?" from a TTL cache over the persisted table.

pub mod cache;
pub mod resolver;

pub use cache::PermissionCache;
pub use resolver::{AccessError, DEFAULT_CACHE_TTL, RoutePermissionResolver};
