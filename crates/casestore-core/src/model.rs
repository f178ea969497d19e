// ABOUTME: Row types for the three tables plus the filters and options used to query and write them.
// ABOUTME: RoutePermission, LogEntry, and TraceEntry mirror the persisted schema one-to-one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored enum value is not one of the known variants.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Which roles may enter a route. `admin_allowed` is always true and cannot
/// be changed through any update surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePermission {
    pub id: i64,
    pub route_path: String,
    pub module: String,
    pub description: String,
    pub agent_allowed: bool,
    pub lawyer_allowed: bool,
    pub admin_allowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a route permission. There is deliberately no field
/// for admin access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionUpdate {
    pub agent_allowed: Option<bool>,
    pub lawyer_allowed: Option<bool>,
    pub description: Option<String>,
}

/// A route the application declares at startup so it is registered in the
/// permission table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub path: String,
    pub module: String,
    pub description: String,
    #[serde(default = "default_true")]
    pub default_agent_allowed: bool,
    #[serde(default = "default_true")]
    pub default_lawyer_allowed: bool,
}

fn default_true() -> bool {
    true
}

impl RouteDeclaration {
    pub fn new(path: impl Into<String>, module: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            module: module.into(),
            description: description.into(),
            default_agent_allowed: true,
            default_lawyer_allowed: true,
        }
    }
}

/// Severity of a persisted log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "debug" => Ok(LogLevel::Debug),
            other => Err(ParseError {
                kind: "log level",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome recorded on a completed span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Success,
    Error,
    Warning,
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Success => "success",
            TraceStatus::Error => "error",
            TraceStatus::Warning => "warning",
        }
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(TraceStatus::Success),
            "error" => Ok(TraceStatus::Error),
            "warning" => Ok(TraceStatus::Warning),
            other => Err(ParseError {
                kind: "trace status",
                value: other.to_string(),
            }),
        }
    }
}

/// A persisted log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub level: LogLevel,
    pub message: String,
    pub context: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub route_path: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Optional fields attached to a log write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogOptions {
    pub context: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub route_path: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl LogOptions {
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>, user_role: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.user_role = Some(user_role.into());
        self
    }

    pub fn with_route(mut self, route_path: impl Into<String>) -> Self {
        self.route_path = Some(route_path.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Query filter for log reads. Results are always newest first.
/// A `limit` of 0 is treated as no limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub route_path: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A completed, persisted span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub id: i64,
    pub trace_id: String,
    pub span_id: String,
    pub operation: String,
    pub duration_ms: f64,
    pub status: TraceStatus,
    pub user_id: Option<String>,
    pub route_path: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Optional fields attached to a span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceOptions {
    pub user_id: Option<String>,
    pub route_path: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Query filter for span reads. Results are always newest first.
/// A `limit` of 0 is treated as no limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceFilter {
    pub trace_id: Option<String>,
    pub route_path: Option<String>,
    pub user_id: Option<String>,
    pub status: Option<TraceStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_text_form() {
        for level in [LogLevel::Info, LogLevel::Warn, LogLevel::Error, LogLevel::Debug] {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
        let err = "fatal".parse::<LogLevel>().unwrap_err();
        assert_eq!(err.to_string(), "unknown log level: fatal");
    }

    #[test]
    fn trace_status_serializes_lowercase() {
        let json = serde_json::to_string(&TraceStatus::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        assert!("ok".parse::<TraceStatus>().is_err());
    }

    #[test]
    fn route_declaration_defaults_to_allow() {
        let decl: RouteDeclaration = serde_json::from_value(serde_json::json!({
            "path": "/crm/reports",
            "module": "CRM",
            "description": "Reports"
        }))
        .unwrap();
        assert!(decl.default_agent_allowed);
        assert!(decl.default_lawyer_allowed);
        assert_eq!(decl, RouteDeclaration::new("/crm/reports", "CRM", "Reports"));
    }
}
