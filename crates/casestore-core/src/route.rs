// ABOUTME: Compiled route patterns with named parameter segments such as `/crm/contacts/:id`.
// ABOUTME: A parameter matches one or more non-separator characters; the whole path is anchored.

/// One `/`-separated piece of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Must equal the concrete segment exactly.
    Literal(String),
    /// Literal prefix followed by a named parameter that swallows the rest of
    /// the segment (at least one character).
    Param { prefix: String, name: String },
}

/// A route path compiled for matching against concrete paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a registered route path. Paths without `:` compile to a
    /// pattern that only matches themselves.
    pub fn compile(route_path: &str) -> Self {
        let segments = route_path
            .split('/')
            .map(|raw| match raw.find(':') {
                Some(idx) => Segment::Param {
                    prefix: raw[..idx].to_string(),
                    name: raw[idx + 1..].to_string(),
                },
                None => Segment::Literal(raw.to_string()),
            })
            .collect();

        Self {
            source: route_path.to_string(),
            segments,
        }
    }

    /// The registered path this pattern was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern has at least one named parameter.
    pub fn is_parameterized(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Param { .. }))
    }

    /// Names of the parameters in declaration order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Test a concrete path against the pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut concrete = path.split('/');
        for segment in &self.segments {
            let Some(part) = concrete.next() else {
                return false;
            };
            let ok = match segment {
                Segment::Literal(lit) => part == lit,
                Segment::Param { prefix, .. } => part
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| !rest.is_empty()),
            };
            if !ok {
                return false;
            }
        }
        concrete.next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_matches_single_segment() {
        let p = RoutePattern::compile("/crm/contacts/:id");
        assert!(p.is_parameterized());
        assert_eq!(p.param_names(), vec!["id"]);
        assert!(p.matches("/crm/contacts/42"));
        assert!(p.matches("/crm/contacts/abc-def"));
        assert!(!p.matches("/crm/contacts/"));
        assert!(!p.matches("/crm/contacts"));
        assert!(!p.matches("/crm/contacts/42/edit"));
        assert!(!p.matches("/crm/leads/42"));
    }

    #[test]
    fn match_is_anchored_at_both_ends() {
        let p = RoutePattern::compile("/crm/contacts/:id/edit");
        assert!(p.matches("/crm/contacts/7/edit"));
        assert!(!p.matches("/x/crm/contacts/7/edit"));
        assert!(!p.matches("/crm/contacts/7/edit/more"));
    }

    #[test]
    fn literal_pattern_matches_only_itself() {
        let p = RoutePattern::compile("/crm/settings");
        assert!(!p.is_parameterized());
        assert!(p.matches("/crm/settings"));
        assert!(!p.matches("/crm/settings/custom-fields"));
        assert!(!p.matches("/crm/setting"));
    }

    #[test]
    fn dots_in_literals_are_not_wildcards() {
        let p = RoutePattern::compile("/files/report.pdf/:rev");
        assert!(p.matches("/files/report.pdf/3"));
        assert!(!p.matches("/files/reportXpdf/3"));
    }

    #[test]
    fn parameter_may_follow_a_literal_prefix() {
        let p = RoutePattern::compile("/crm/v:version/home");
        assert!(p.matches("/crm/v2/home"));
        assert!(!p.matches("/crm/v/home"));
        assert!(!p.matches("/crm/x2/home"));
    }
}
