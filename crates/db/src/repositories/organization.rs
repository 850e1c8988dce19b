//! Organization (tenant) lookups.

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use tally_shared::types::OrganizationId;

use crate::entities::organizations;

/// What the tenant coordinator needs to know before opening a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizationAccess {
    /// The organization.
    pub id: OrganizationId,
    /// Set while an administrator has locked the tenant.
    pub access_locked_at: Option<DateTime<Utc>>,
}

impl OrganizationAccess {
    /// Returns true if the tenant is access-locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.access_locked_at.is_some()
    }
}

/// Organization repository.
pub struct OrganizationRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> OrganizationRepository<'a, C> {
    /// Creates a repository over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Finds the organization's access state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_access(
        &self,
        id: OrganizationId,
    ) -> Result<Option<OrganizationAccess>, DbErr> {
        let org = organizations::Entity::find_by_id(id.into_inner())
            .one(self.conn)
            .await?;

        Ok(org.map(|org| OrganizationAccess {
            id,
            access_locked_at: org.access_locked_at.map(|t| t.with_timezone(&Utc)),
        }))
    }
}
