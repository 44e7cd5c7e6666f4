//! Shift creation, batch approval and deletion, and schedule listing.

use std::sync::Arc;

use casework::{
    CaseworkError, Clock, EntityKind, PhysicianDirectory, PhysicianId, ShiftDefinition, ShiftId,
    ShiftOccurrence, ShiftRepository,
};
use chrono::NaiveDate;
use tracing::instrument;

use crate::{bounded, WorkflowSettings};

/// Creates shifts, approves or deletes their occurrences in batches, and
/// lists a physician's schedule.
#[derive(Clone)]
pub struct ShiftService {
    shifts: Arc<dyn ShiftRepository>,
    physicians: Arc<dyn PhysicianDirectory>,
    clock: Arc<dyn Clock>,
    settings: WorkflowSettings,
}

impl ShiftService {
    pub fn new(
        shifts: Arc<dyn ShiftRepository>,
        physicians: Arc<dyn PhysicianDirectory>,
        clock: Arc<dyn Clock>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            shifts,
            physicians,
            clock,
            settings,
        }
    }

    /// Expands `definition` and stores every resulting occurrence, or none.
    #[instrument(
        skip(self, definition),
        fields(physician_id = %definition.physician_id, shift_date = %definition.shift_date)
    )]
    pub async fn create(
        &self,
        definition: ShiftDefinition,
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        let timeout = self.settings.storage_timeout();

        let known = bounded(
            timeout,
            "find_physician",
            self.physicians.find_physician(definition.physician_id),
        )
        .await?;
        if known.is_none() {
            return Err(CaseworkError::not_found(EntityKind::Physician, definition.physician_id));
        }

        let drafts = definition.expand()?;
        let created_at = self.clock.now().timestamp();
        let occurrences = bounded(
            timeout,
            "insert_occurrences",
            self.shifts.insert_occurrences(drafts, created_at),
        )
        .await?;

        tracing::info!(count = occurrences.len(), "Shift occurrences created");
        Ok(occurrences)
    }

    /// Approves every occurrence in `ids`, or none if any is unknown.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn approve_many(
        &self,
        ids: &[ShiftId],
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        require_ids(ids)?;
        let timeout = self.settings.storage_timeout();
        let approved = bounded(timeout, "approve_many", self.shifts.approve_many(ids)).await?;
        tracing::info!("Shift occurrences approved");
        Ok(approved)
    }

    /// Soft-deletes every occurrence in `ids`, or none if any is unknown.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_many(
        &self,
        ids: &[ShiftId],
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        require_ids(ids)?;
        let timeout = self.settings.storage_timeout();
        let deleted = bounded(timeout, "delete_many", self.shifts.delete_many(ids)).await?;
        tracing::info!("Shift occurrences deleted");
        Ok(deleted)
    }

    /// Non-deleted occurrences for `physician_id` dated within `[from, to]`.
    pub async fn schedule(
        &self,
        physician_id: PhysicianId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        if from > to {
            return Err(CaseworkError::validation(format!(
                "range start {from} is after range end {to}"
            )));
        }
        bounded(
            self.settings.storage_timeout(),
            "occurrences_between",
            self.shifts.occurrences_between(physician_id, from, to),
        )
        .await
    }
}

fn require_ids(ids: &[ShiftId]) -> Result<(), CaseworkError> {
    if ids.is_empty() {
        return Err(CaseworkError::validation("shiftIds must not be empty"));
    }
    Ok(())
}
