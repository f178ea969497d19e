// ABOUTME: Job roles that the route guards ask about.
// ABOUTME: Admin and superuser bypass route checks; agent and lawyer are gated per route.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The role a user holds in the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Superuser,
    Agent,
    Lawyer,
    /// Any role string the CRM does not gate by route. Always denied.
    Other(String),
}

impl Role {
    /// Whether this role skips the route table entirely.
    pub fn bypasses_route_checks(&self) -> bool {
        matches!(self, Role::Admin | Role::Superuser)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Superuser => "superuser",
            Role::Agent => "agent",
            Role::Lawyer => "lawyer",
            Role::Other(s) => s,
        }
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "superuser" => Role::Superuser,
            "agent" => Role::Agent,
            "lawyer" => Role::Lawyer,
            _ => Role::Other(s.to_string()),
        })
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_case_insensitively() {
        assert_eq!(Role::from("Admin"), Role::Admin);
        assert_eq!(Role::from("SUPERUSER"), Role::Superuser);
        assert_eq!(Role::from("agent"), Role::Agent);
        assert_eq!(Role::from(" lawyer "), Role::Lawyer);
        assert_eq!(Role::from("intern"), Role::Other("intern".to_string()));
    }

    #[test]
    fn only_admin_and_superuser_bypass() {
        assert!(Role::Admin.bypasses_route_checks());
        assert!(Role::Superuser.bypasses_route_checks());
        assert!(!Role::Agent.bypasses_route_checks());
        assert!(!Role::Lawyer.bypasses_route_checks());
        assert!(!Role::Other("guest".into()).bypasses_route_checks());
    }
}
