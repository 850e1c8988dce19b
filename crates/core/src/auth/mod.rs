//! User role definitions.

use serde::{Deserialize, Serialize};

/// User roles within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access, can transfer ownership.
    Owner,
    /// Full access except ownership transfer.
    Admin,
    /// Can post entries and lock fiscal years.
    Accountant,
    /// Can approve, cannot post.
    Approver,
    /// Read-only access.
    Viewer,
    /// Can post entries.
    Submitter,
}

impl UserRole {
    /// Returns true if this role can create, lock, and reverse entries.
    #[must_use]
    pub const fn can_post_entries(&self) -> bool {
        matches!(
            self,
            Self::Owner | Self::Admin | Self::Accountant | Self::Submitter
        )
    }

    /// Returns true if this role can lock/unlock fiscal years and run exports.
    #[must_use]
    pub const fn can_manage_fiscal_years(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Accountant)
    }

    /// Returns true if this role can reconcile bank statements.
    #[must_use]
    pub const fn can_reconcile(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Accountant)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Admin => write!(f, "admin"),
            Self::Accountant => write!(f, "accountant"),
            Self::Approver => write!(f, "approver"),
            Self::Viewer => write!(f, "viewer"),
            Self::Submitter => write!(f, "submitter"),
        }
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "accountant" => Ok(Self::Accountant),
            "approver" => Ok(Self::Approver),
            "viewer" => Ok(Self::Viewer),
            "submitter" => Ok(Self::Submitter),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
