// ABOUTME: Core library for casestore, containing the row types, roles, and route patterns.
// ABOUTME: Shared by the persistence layer, the permission resolver, and the telemetry recorders.

pub mod clock;
pub mod model;
pub mod role;
pub mod route;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{
    LogEntry, LogFilter, LogLevel, LogOptions, ParseError, PermissionUpdate, RouteDeclaration,
    RoutePermission, TraceEntry, TraceFilter, TraceOptions, TraceStatus,
};
pub use role::Role;
pub use route::RoutePattern;
