//! On-call resolution for one physician or a whole region.

use std::sync::Arc;

use casework::on_call;
use casework::{
    CaseworkError, Clock, EntityKind, OnCallRecord, OnCallStatus, Physician, PhysicianDirectory,
    PhysicianId, RegionName, ShiftRepository,
};
use serde::Serialize;
use tracing::instrument;

use crate::{bounded, WorkflowSettings};

/// Physicians of a region split by their status at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCallSweep {
    pub on_call: Vec<Physician>,
    pub unscheduled: Vec<Physician>,
}

/// Resolves live on-call status and caches it on the physician record.
///
/// Resolution itself is pure. The cache write that follows is explicit and
/// keyed by the resolution instant, so a slower, older resolution never
/// overwrites a newer one.
#[derive(Clone)]
pub struct OnCallService {
    shifts: Arc<dyn ShiftRepository>,
    physicians: Arc<dyn PhysicianDirectory>,
    clock: Arc<dyn Clock>,
    settings: WorkflowSettings,
}

impl OnCallService {
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

    /// Resolves one physician now and returns the record stored afterwards.
    #[instrument(skip(self, physician_id), fields(physician_id = %physician_id))]
    pub async fn resolve(&self, physician_id: PhysicianId) -> Result<OnCallRecord, CaseworkError> {
        let known = bounded(
            self.settings.storage_timeout(),
            "find_physician",
            self.physicians.find_physician(physician_id),
        )
        .await?;
        if known.is_none() {
            return Err(CaseworkError::not_found(EntityKind::Physician, physician_id));
        }
        self.resolve_and_record(physician_id).await
    }

    /// Resolves every physician serving `region` (or every physician) and
    /// splits them by status.
    #[instrument(skip(self, region), fields(region = region.map(RegionName::as_str)))]
    pub async fn sweep(&self, region: Option<&RegionName>) -> Result<OnCallSweep, CaseworkError> {
        let physicians = bounded(
            self.settings.storage_timeout(),
            "physicians_in_region",
            self.physicians.physicians_in_region(region),
        )
        .await?;

        let mut sweep = OnCallSweep {
            on_call: Vec::new(),
            unscheduled: Vec::new(),
        };
        for mut physician in physicians {
            let record = self.resolve_and_record(physician.id).await?;
            let status = record.status;
            physician.on_call = Some(record);
            match status {
                OnCallStatus::OnCall => sweep.on_call.push(physician),
                OnCallStatus::UnScheduled => sweep.unscheduled.push(physician),
            }
        }

        tracing::info!(
            on_call = sweep.on_call.len(),
            unscheduled = sweep.unscheduled.len(),
            "On-call sweep complete"
        );
        Ok(sweep)
    }

    async fn resolve_and_record(
        &self,
        physician_id: PhysicianId,
    ) -> Result<OnCallRecord, CaseworkError> {
        let timeout = self.settings.storage_timeout();
        let now = self.clock.now();
        let today = now.date();

        let occurrences = bounded(
            timeout,
            "occurrences_between",
            self.shifts.occurrences_between(physician_id, today, today),
        )
        .await?;

        let record = OnCallRecord {
            status: on_call::resolve(physician_id, now, &occurrences),
            resolved_at: now,
        };
        let write = self.physicians.record_on_call(physician_id, record);
        let stored = bounded(timeout, "record_on_call", write).await?;

        if stored != record {
            tracing::debug!(
                physician_id = %physician_id,
                resolved_at = %record.resolved_at,
                stored_at = %stored.resolved_at,
                "Newer on-call resolution already stored"
            );
        }
        Ok(stored)
    }
}
