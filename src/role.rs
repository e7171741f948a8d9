//! Role Mapping
//!
//! Maps the credential store's integer `user_type` code onto the closed set
//! of gateway roles. The mapping is total: any unrecognized code falls back
//! to [`Role::Customer`], so a store migration that introduces a new code
//! can never make authentication fail.
//!
//! Roles are derived at token issuance time and carried only as a claim;
//! they are never persisted by the gateway, so a mapping change affects new
//! tokens only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of roles a token can assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Back-office administrator (code 0)
    #[serde(rename = "ADMIN")]
    Admin,
    /// Ordering customer (code 1, and the default for unknown codes)
    #[serde(rename = "CUSTOMER")]
    Customer,
    /// Kitchen staff (code 2)
    #[serde(rename = "KITCHEN")]
    Kitchen,
    /// Counter operator (code 3)
    #[serde(rename = "OPERATOR")]
    Operator,
    /// Store manager (code 4)
    #[serde(rename = "MANAGER")]
    Manager,
}

impl Role {
    /// Derive the role for a stored `user_type` code.
    pub fn from_user_type(user_type: i32) -> Self {
        match user_type {
            0 => Self::Admin,
            1 => Self::Customer,
            2 => Self::Kitchen,
            3 => Self::Operator,
            4 => Self::Manager,
            _ => Self::Customer,
        }
    }

    /// Wire name of the role, as carried in the token's `role` claim.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Customer => "CUSTOMER",
            Self::Kitchen => "KITCHEN",
            Self::Operator => "OPERATOR",
            Self::Manager => "MANAGER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "CUSTOMER" => Ok(Self::Customer),
            "KITCHEN" => Ok(Self::Kitchen),
            "OPERATOR" => Ok(Self::Operator),
            "MANAGER" => Ok(Self::Manager),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A role name outside the closed set.
///
/// Only produced when parsing configuration; stored codes never error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role name: '{0}'")]
pub struct UnknownRole(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_their_roles() {
        assert_eq!(Role::from_user_type(0), Role::Admin);
        assert_eq!(Role::from_user_type(1), Role::Customer);
        assert_eq!(Role::from_user_type(2), Role::Kitchen);
        assert_eq!(Role::from_user_type(3), Role::Operator);
        assert_eq!(Role::from_user_type(4), Role::Manager);
    }

    #[test]
    fn unknown_codes_default_to_customer() {
        assert_eq!(Role::from_user_type(5), Role::Customer);
        assert_eq!(Role::from_user_type(99), Role::Customer);
        assert_eq!(Role::from_user_type(-1), Role::Customer);
        assert_eq!(Role::from_user_type(i32::MIN), Role::Customer);
    }

    #[test]
    fn wire_names_round_trip() {
        for role in [
            Role::Admin,
            Role::Customer,
            Role::Kitchen,
            Role::Operator,
            Role::Manager,
        ] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("CHEF".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Role::Kitchen).unwrap();
        assert_eq!(json, "\"KITCHEN\"");
        let role: Role = serde_json::from_str("\"MANAGER\"").unwrap();
        assert_eq!(role, Role::Manager);
    }
}
