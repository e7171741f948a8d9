//! Route Role Policies
//!
//! Per-route authorization: a route prefix may require the token's role
//! claim to be a member of an allowed set. Routes without a policy admit any
//! verified identity. Evaluation is a pure predicate over the request path
//! and the verified claims; every decision is audit-logged.
//!
//! # Configuration format
//!
//! `ROUTE_POLICIES` holds `;`-separated rules of `prefix=ROLE[,ROLE...]`:
//!
//! ```text
//! /admin=ADMIN;/kitchen=KITCHEN,MANAGER
//! ```

use std::collections::HashSet;

use crate::observability::SecurityEvent;
use crate::role::{Role, UnknownRole};
use crate::token::Claims;

// ============================================================================
// Role Policy
// ============================================================================

/// The set of roles admitted to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    allowed: HashSet<Role>,
}

impl RolePolicy {
    /// Create a policy admitting the given roles.
    pub fn allow(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: roles.into_iter().collect(),
        }
    }

    /// Whether `role` is admitted.
    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    /// Allowed roles, for logging.
    pub fn allowed_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.allowed.iter().map(Role::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// Route Policies
// ============================================================================

/// Ordered route-prefix to policy rules. The longest matching prefix wins,
/// so `/admin/reports` can carry a tighter rule than `/admin`.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicies {
    rules: Vec<(String, RolePolicy)>,
}

impl RoutePolicies {
    /// No rules; every verified identity passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for a route prefix.
    pub fn require(mut self, prefix: impl Into<String>, policy: RolePolicy) -> Self {
        self.rules.push((prefix.into(), policy));
        self
    }

    /// Policy applying to `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&RolePolicy> {
        self.rules
            .iter()
            .filter(|(prefix, _)| {
                path == prefix
                    || (path.starts_with(prefix.as_str())
                        && path.as_bytes().get(prefix.len()) == Some(&b'/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, policy)| policy)
    }

    /// Parse the `ROUTE_POLICIES` configuration string.
    pub fn parse(s: &str) -> Result<Self, UnknownRole> {
        let mut policies = Self::new();
        for rule in s.split(';').map(str::trim).filter(|r| !r.is_empty()) {
            let (prefix, roles) = match rule.split_once('=') {
                Some(parts) => parts,
                None => continue,
            };
            let roles = roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::parse::<Role>)
                .collect::<Result<Vec<_>, _>>()?;
            policies = policies.require(prefix.trim(), RolePolicy::allow(roles));
        }
        Ok(policies)
    }

    /// Whether any rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Audit-log an authorization decision.
pub fn log_access_decision(claims: &Claims, path: &str, allowed: bool) {
    let event = if allowed {
        SecurityEvent::AccessGranted
    } else {
        SecurityEvent::AccessDenied
    };
    crate::security_event!(
        event,
        user_id = %claims.sub,
        role = %claims.role,
        path = %path,
        "Access decision made"
    );
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_admits_only_listed_roles() {
        let policy = RolePolicy::allow([Role::Admin, Role::Manager]);
        assert!(policy.permits(Role::Admin));
        assert!(policy.permits(Role::Manager));
        assert!(!policy.permits(Role::Customer));
    }

    #[test]
    fn unmatched_paths_carry_no_policy() {
        let policies = RoutePolicies::new().require("/admin", RolePolicy::allow([Role::Admin]));
        assert!(policies.resolve("/orders").is_none());
        assert!(policies.resolve("/administrative").is_none());
    }

    #[test]
    fn prefix_matches_whole_segments() {
        let policies = RoutePolicies::new().require("/admin", RolePolicy::allow([Role::Admin]));
        assert!(policies.resolve("/admin").is_some());
        assert!(policies.resolve("/admin/users").is_some());
        assert!(policies.resolve("/adminx").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let policies = RoutePolicies::new()
            .require("/admin", RolePolicy::allow([Role::Admin]))
            .require("/admin/kitchen", RolePolicy::allow([Role::Kitchen]));

        let policy = policies.resolve("/admin/kitchen/queue").unwrap();
        assert!(policy.permits(Role::Kitchen));
        assert!(!policy.permits(Role::Admin));
    }

    #[test]
    fn parse_reads_the_config_format() {
        let policies = RoutePolicies::parse("/admin=ADMIN;/kitchen=KITCHEN,MANAGER").unwrap();
        assert!(policies.resolve("/admin/x").unwrap().permits(Role::Admin));
        let kitchen = policies.resolve("/kitchen/orders").unwrap();
        assert!(kitchen.permits(Role::Kitchen));
        assert!(kitchen.permits(Role::Manager));
        assert!(!kitchen.permits(Role::Customer));
    }

    #[test]
    fn parse_rejects_unknown_roles() {
        assert!(RoutePolicies::parse("/admin=SUPERUSER").is_err());
    }

    #[test]
    fn parse_of_empty_string_is_empty() {
        assert!(RoutePolicies::parse("").unwrap().is_empty());
        assert!(RoutePolicies::parse(" ; ").unwrap().is_empty());
    }
}
