//! Audit log repository.

use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};
use tally_core::ledger::AuditRecord;
use tally_shared::types::OrganizationId;
use uuid::Uuid;

use crate::entities::audit_log;

/// Appends audit records inside the caller's transaction.
pub struct AuditRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> AuditRepository<'a, C> {
    /// Creates a repository over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Appends `record` for `organization_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn append(
        &self,
        organization_id: OrganizationId,
        record: AuditRecord,
    ) -> Result<audit_log::Model, DbErr> {
        let now = chrono::Utc::now().fixed_offset();
        let entity_type = record.entity_type();

        audit_log::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(organization_id.into_inner()),
            actor_id: Set(record.actor_id.into_inner()),
            action: Set(record.action.as_str().to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(record.entity_id),
            payload: Set(record.payload),
            created_at: Set(now),
        }
        .insert(self.conn)
        .await
    }
}
