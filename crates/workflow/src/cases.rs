//! Case creation and lifecycle actions.

use std::sync::Arc;

use casework::transitions;
use casework::{
    Case, CaseAction, CaseId, CaseIntake, CaseRepository, CaseTag, CaseworkError, Clock,
    ConfirmationPrefix, EntityKind, PhysicianDirectory, PhysicianId, RegionDirectory, RetryPolicy,
};
use tracing::instrument;

use crate::{bounded, NoticeDispatcher, WorkflowSettings};

/// Creates cases and moves them through the lifecycle table.
///
/// Every action is an optimistic read-modify-write: the case is read, the
/// action is evaluated against the state that was read, and the write only
/// lands if nobody else wrote in between. On a version conflict the whole
/// cycle runs again from a fresh read, so an action that lost a race is
/// re-validated against the winner's result rather than blindly re-applied.
#[derive(Clone)]
pub struct CaseService {
    cases: Arc<dyn CaseRepository>,
    regions: Arc<dyn RegionDirectory>,
    physicians: Arc<dyn PhysicianDirectory>,
    clock: Arc<dyn Clock>,
    dispatcher: NoticeDispatcher,
    settings: WorkflowSettings,
}

impl CaseService {
    pub fn new(
        cases: Arc<dyn CaseRepository>,
        regions: Arc<dyn RegionDirectory>,
        physicians: Arc<dyn PhysicianDirectory>,
        clock: Arc<dyn Clock>,
        dispatcher: NoticeDispatcher,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            cases,
            regions,
            physicians,
            clock,
            dispatcher,
            settings,
        }
    }

    /// Opens a new case in `(New, Unassigned)` with a fresh confirmation
    /// number.
    ///
    /// A region whose abbreviation cannot be found still gets a case; its
    /// confirmation number simply has an empty region segment.
    #[instrument(skip(self, intake), fields(region = %intake.region))]
    pub async fn create(&self, intake: CaseIntake) -> Result<Case, CaseworkError> {
        let timeout = self.settings.storage_timeout();
        let now = self.clock.now();

        let lookup = self.regions.abbreviation(&intake.region);
        let abbreviation = match bounded(timeout, "abbreviation", lookup).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "Region lookup failed");
                None
            }
        };

        let prefix =
            ConfirmationPrefix::build(abbreviation.as_deref(), now.date(), &intake.patient.name);
        let case = bounded(
            timeout,
            "insert_case",
            self.cases.insert_case(intake, prefix, now.date(), now.timestamp()),
        )
        .await?;

        tracing::info!(
            case_id = %case.id,
            confirmation_number = %case.confirmation_number,
            "Case created"
        );
        Ok(case)
    }

    /// Loads case `id`, archived or not.
    pub async fn get(&self, id: CaseId) -> Result<Case, CaseworkError> {
        self.load(id).await
    }

    /// Non-archived case counts for every tag.
    pub async fn counts(&self) -> Result<Vec<(CaseTag, u64)>, CaseworkError> {
        bounded(self.settings.storage_timeout(), "count_by_tag", self.cases.count_by_tag()).await
    }

    /// Applies `action` to case `id` and returns the stored result.
    ///
    /// Notices are handed to the dispatcher only after the write commits. A
    /// write that loses the version race is retried against a fresh read while
    /// the error's [`RetryPolicy`] allows it, up to
    /// `max_transition_retries` times. Timeouts are surfaced without retrying.
    #[instrument(skip(self, action), fields(case_id = %id, action = %action.kind()))]
    pub async fn perform(&self, id: CaseId, action: CaseAction) -> Result<Case, CaseworkError> {
        let timeout = self.settings.storage_timeout();
        let mut conflicts = 0;

        loop {
            let current = self.load(id).await?;
            let transition = transitions::apply(&current, &action, self.clock.now().timestamp())?;

            let write = self.cases.update_case(transition.case, current.version);
            match bounded(timeout, "update_case", write).await {
                Ok(stored) => {
                    tracing::info!(
                        from_tag = %transition.from.tag,
                        from_status = %transition.from.status,
                        to_tag = %stored.state.tag,
                        to_status = %stored.state.status,
                        "Case transitioned"
                    );
                    self.dispatcher.dispatch(transition.notices);
                    return Ok(stored);
                }
                Err(err @ CaseworkError::Conflict { .. }) => {
                    let RetryPolicy::Retryable { after } = err.retry_policy() else {
                        return Err(err);
                    };
                    if conflicts >= self.settings.max_transition_retries {
                        return Err(err);
                    }
                    conflicts += 1;
                    tracing::debug!(
                        attempt = conflicts,
                        error = %err,
                        "Version conflict, re-reading case"
                    );
                    if let Some(delay) = after {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Assigns a `New` or `ToClose` case to `physician_id`.
    pub async fn assign(
        &self,
        id: CaseId,
        physician_id: PhysicianId,
        note: Option<String>,
    ) -> Result<Case, CaseworkError> {
        self.require_physician(physician_id).await?;
        self.perform(id, CaseAction::Assign { physician_id, note }).await
    }

    /// The assigned physician accepts the case.
    pub async fn accept(&self, id: CaseId) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::Accept).await
    }

    /// The patient accepts the agreement; the physician is on route.
    pub async fn accept_agreement(&self, id: CaseId) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::AcceptAgreement).await
    }

    /// The patient declines the agreement.
    pub async fn cancel_agreement(
        &self,
        id: CaseId,
        reason: String,
    ) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::CancelAgreement { reason }).await
    }

    /// Ends the visit with the physician's notes.
    pub async fn conclude(
        &self,
        id: CaseId,
        physician_notes: String,
    ) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::Conclude { physician_notes }).await
    }

    /// Moves the case to another physician without changing its state.
    pub async fn transfer(
        &self,
        id: CaseId,
        physician_id: PhysicianId,
        note: Option<String>,
    ) -> Result<Case, CaseworkError> {
        self.require_physician(physician_id).await?;
        self.perform(id, CaseAction::Transfer { physician_id, note }).await
    }

    /// Cancels and archives a case that has not reached a terminal state.
    pub async fn cancel_by_admin(
        &self,
        id: CaseId,
        reason: String,
        admin_notes: Option<String>,
    ) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::CancelByAdmin { reason, admin_notes }).await
    }

    /// Blocks and archives the case, keeping its tag.
    pub async fn block(&self, id: CaseId, reason: String) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::Block { reason }).await
    }

    /// Clears and archives the case, keeping its tag.
    pub async fn clear(&self, id: CaseId) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::Clear).await
    }

    /// Closes a `ToClose` case out to `UnPaid`.
    pub async fn close(&self, id: CaseId) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::Close).await
    }

    /// Restores a blocked case to its tag's `Unassigned` status.
    pub async fn unblock(&self, id: CaseId) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::Unblock).await
    }

    /// The patient withdraws a case nobody has picked up yet.
    pub async fn cancel_by_patient(
        &self,
        id: CaseId,
        reason: String,
    ) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::CancelByPatient { reason }).await
    }

    /// The physician hands the case back to the admin desk.
    pub async fn decline_by_provider(
        &self,
        id: CaseId,
        note: Option<String>,
    ) -> Result<Case, CaseworkError> {
        self.perform(id, CaseAction::DeclineByProvider { note }).await
    }

    // -----------------------------------------------------------------------

    async fn load(&self, id: CaseId) -> Result<Case, CaseworkError> {
        bounded(self.settings.storage_timeout(), "find_case", self.cases.find_case(id))
            .await?
            .ok_or_else(|| CaseworkError::not_found(EntityKind::Case, id))
    }

    async fn require_physician(&self, id: PhysicianId) -> Result<(), CaseworkError> {
        let lookup = self.physicians.find_physician(id);
        bounded(self.settings.storage_timeout(), "find_physician", lookup)
            .await?
            .map(|_| ())
            .ok_or_else(|| CaseworkError::not_found(EntityKind::Physician, id))
    }
}
