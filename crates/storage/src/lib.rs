//! In-memory storage adapter.
//!
//! Implements [`casework::CaseRepository`], [`casework::ShiftRepository`],
//! [`casework::PhysicianDirectory`], and [`casework::RegionDirectory`] on top of
//! `tokio` mutexes. Every trait method takes the relevant lock once, validates,
//! and only then mutates, so each call is a transaction: it commits completely
//! or leaves nothing behind.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Which
//! transitions are legal, how shifts expand, and how on-call status is decided
//! all live in [`casework`]; this crate only upholds the storage invariants:
//!
//! - the daily confirmation sequence is counted and consumed under the same
//!   lock as the insert,
//! - case writes are compare-and-swap on `version`,
//! - shift batches are all-or-nothing,
//! - cached on-call records are last-write-wins by resolution instant.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use casework::{
    Case, CaseId, CaseIntake, CaseRepository, CaseTag, CaseworkError, ConfirmationNumber,
    ConfirmationPrefix, EntityKind, OccurrenceDraft, OnCallRecord, Physician, PhysicianDirectory,
    PhysicianId, RegionDirectory, RegionName, ShiftId, ShiftOccurrence, ShiftRepository,
    Timestamp,
};
use chrono::NaiveDate;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct CaseTable {
    rows: BTreeMap<CaseId, Case>,
    next_id: u64,
    created_per_day: HashMap<NaiveDate, u32>,
    confirmation_numbers: HashSet<ConfirmationNumber>,
}

#[derive(Default)]
struct ShiftTable {
    rows: BTreeMap<ShiftId, ShiftOccurrence>,
    next_id: u64,
}

/// Process-local store for cases, shifts, physicians, and regions.
#[derive(Default)]
pub struct InMemoryStore {
    cases: Mutex<CaseTable>,
    shifts: Mutex<ShiftTable>,
    physicians: RwLock<BTreeMap<PhysicianId, Physician>>,
    regions: RwLock<HashMap<RegionName, String>>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the region directory and physician directory.
    pub fn seeded(
        regions: impl IntoIterator<Item = (RegionName, String)>,
        physicians: impl IntoIterator<Item = Physician>,
    ) -> Self {
        Self {
            physicians: RwLock::new(physicians.into_iter().map(|p| (p.id, p)).collect()),
            regions: RwLock::new(regions.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Delays every operation by `latency` before it touches any data.
    ///
    /// Used to exercise caller timeouts; an operation abandoned during the
    /// delay has made no change.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn settle(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Cases
// ---------------------------------------------------------------------------

#[async_trait]
impl CaseRepository for InMemoryStore {
    async fn insert_case(
        &self,
        intake: CaseIntake,
        prefix: ConfirmationPrefix,
        created_on: NaiveDate,
        created_at: Timestamp,
    ) -> Result<Case, CaseworkError> {
        self.settle().await;
        let mut table = self.cases.lock().await;

        let sequence = table.created_per_day.get(&created_on).copied().unwrap_or(0) + 1;
        let number = prefix.with_sequence(sequence);
        if table.confirmation_numbers.contains(&number) {
            return Err(CaseworkError::Conflict {
                reason: format!("confirmation number {number} already issued"),
            });
        }

        table.next_id += 1;
        let case = Case::open(CaseId::new(table.next_id), number.clone(), intake, created_at);

        table.created_per_day.insert(created_on, sequence);
        table.confirmation_numbers.insert(number);
        table.rows.insert(case.id, case.clone());

        tracing::debug!(case_id = %case.id, sequence, "Case inserted");
        Ok(case)
    }

    async fn find_case(&self, id: CaseId) -> Result<Option<Case>, CaseworkError> {
        self.settle().await;
        Ok(self.cases.lock().await.rows.get(&id).cloned())
    }

    async fn update_case(
        &self,
        mut case: Case,
        expected_version: u64,
    ) -> Result<Case, CaseworkError> {
        self.settle().await;
        let mut table = self.cases.lock().await;

        let stored = table
            .rows
            .get_mut(&case.id)
            .ok_or_else(|| CaseworkError::not_found(EntityKind::Case, case.id))?;

        if stored.version != expected_version {
            return Err(CaseworkError::Conflict {
                reason: format!(
                    "case {} is at version {}, expected {expected_version}",
                    case.id, stored.version
                ),
            });
        }
        if stored.confirmation_number != case.confirmation_number {
            return Err(CaseworkError::Conflict {
                reason: format!("case {} confirmation number is immutable", case.id),
            });
        }

        case.version = expected_version + 1;
        *stored = case.clone();
        Ok(case)
    }

    async fn count_by_tag(&self) -> Result<Vec<(CaseTag, u64)>, CaseworkError> {
        self.settle().await;
        let table = self.cases.lock().await;

        let mut counts: BTreeMap<CaseTag, u64> = CaseTag::ALL.iter().map(|&t| (t, 0)).collect();
        for case in table.rows.values().filter(|c| !c.is_archived()) {
            *counts.entry(case.state.tag).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

impl ShiftTable {
    /// Fails on the first unknown id without touching any row.
    fn ensure_all_exist(&self, ids: &[ShiftId]) -> Result<(), CaseworkError> {
        match ids.iter().find(|id| !self.rows.contains_key(*id)) {
            Some(missing) => Err(CaseworkError::not_found(EntityKind::Shift, missing)),
            None => Ok(()),
        }
    }

    fn update_all(
        &mut self,
        ids: &[ShiftId],
        f: impl Fn(&mut ShiftOccurrence),
    ) -> Vec<ShiftOccurrence> {
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.rows.get_mut(id) {
                f(row);
                updated.push(row.clone());
            }
        }
        updated
    }
}

#[async_trait]
impl ShiftRepository for InMemoryStore {
    async fn insert_occurrences(
        &self,
        drafts: Vec<OccurrenceDraft>,
        created_at: Timestamp,
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        self.settle().await;
        let mut table = self.shifts.lock().await;

        let mut inserted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            table.next_id += 1;
            let id = ShiftId::new(table.next_id);
            let occurrence = ShiftOccurrence::from_draft(id, draft, created_at);
            table.rows.insert(occurrence.id, occurrence.clone());
            inserted.push(occurrence);
        }
        Ok(inserted)
    }

    async fn approve_many(&self, ids: &[ShiftId]) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        self.settle().await;
        let mut table = self.shifts.lock().await;
        table.ensure_all_exist(ids)?;
        Ok(table.update_all(ids, |row| row.is_approved = true))
    }

    async fn delete_many(&self, ids: &[ShiftId]) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        self.settle().await;
        let mut table = self.shifts.lock().await;
        table.ensure_all_exist(ids)?;
        Ok(table.update_all(ids, |row| row.is_deleted = true))
    }

    async fn occurrences_between(
        &self,
        physician_id: PhysicianId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError> {
        self.settle().await;
        let table = self.shifts.lock().await;

        let mut found: Vec<ShiftOccurrence> = table
            .rows
            .values()
            .filter(|o| o.physician_id == physician_id && !o.is_deleted)
            .filter(|o| from <= o.shift_date && o.shift_date <= to)
            .cloned()
            .collect();
        found.sort_by_key(|o| (o.shift_date, o.window.start_time(), o.id));
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

#[async_trait]
impl PhysicianDirectory for InMemoryStore {
    async fn find_physician(&self, id: PhysicianId) -> Result<Option<Physician>, CaseworkError> {
        self.settle().await;
        Ok(self.physicians.read().await.get(&id).cloned())
    }

    async fn physicians_in_region(
        &self,
        region: Option<&RegionName>,
    ) -> Result<Vec<Physician>, CaseworkError> {
        self.settle().await;
        Ok(self
            .physicians
            .read()
            .await
            .values()
            .filter(|p| region.map_or(true, |r| p.regions.contains(r)))
            .cloned()
            .collect())
    }

    async fn record_on_call(
        &self,
        id: PhysicianId,
        record: OnCallRecord,
    ) -> Result<OnCallRecord, CaseworkError> {
        self.settle().await;
        let mut physicians = self.physicians.write().await;
        let physician = physicians
            .get_mut(&id)
            .ok_or_else(|| CaseworkError::not_found(EntityKind::Physician, id))?;

        match physician.on_call {
            Some(stored) if !record.supersedes(&stored) => {
                tracing::debug!(
                    physician_id = %id,
                    stored_at = %stored.resolved_at,
                    offered_at = %record.resolved_at,
                    "Stale on-call resolution discarded"
                );
                Ok(stored)
            }
            _ => {
                physician.on_call = Some(record);
                Ok(record)
            }
        }
    }
}

#[async_trait]
impl RegionDirectory for InMemoryStore {
    async fn abbreviation(&self, region: &RegionName) -> Result<Option<String>, CaseworkError> {
        self.settle().await;
        Ok(self.regions.read().await.get(region).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use casework::{
        CaseAction, IntakeChannel, LocalInstant, OnCallStatus, PatientDetails, PersonName,
        ShiftWindow,
    };
    use chrono::{FixedOffset, NaiveTime, TimeZone};

    use super::*;

    fn intake(first: &str, last: &str) -> CaseIntake {
        CaseIntake {
            patient: PatientDetails {
                name: PersonName::new(first, last).unwrap(),
                email: None,
                phone: None,
                date_of_birth: None,
                address: None,
            },
            region: RegionName::new("Maryland").unwrap(),
            symptoms: Some("fever".into()),
            channel: IntakeChannel::Patient,
        }
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn prefix(first: &str, last: &str, day: u32) -> ConfirmationPrefix {
        ConfirmationPrefix::build(Some("MD"), june(day), &PersonName::new(first, last).unwrap())
    }

    async fn insert(store: &InMemoryStore, first: &str, last: &str, day: u32) -> Case {
        store
            .insert_case(intake(first, last), prefix(first, last, day), june(day), Timestamp::now())
            .await
            .unwrap()
    }

    fn physician(id: u64) -> Physician {
        Physician {
            id: PhysicianId::new(id),
            name: PersonName::new("Gregory", "House").unwrap(),
            email: Some("house@example.com".into()),
            phone: None,
            regions: vec![RegionName::new("Maryland").unwrap()],
            on_call: None,
        }
    }

    fn draft(day: u32) -> OccurrenceDraft {
        OccurrenceDraft {
            physician_id: PhysicianId::new(1),
            shift_date: june(day),
            region: RegionName::new("Maryland").unwrap(),
            window: ShiftWindow::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            )
            .unwrap(),
        }
    }

    async fn stored(store: &InMemoryStore, drafts: Vec<OccurrenceDraft>) -> Vec<ShiftOccurrence> {
        store.insert_occurrences(drafts, Timestamp::now()).await.unwrap()
    }

    async fn june_schedule(store: &InMemoryStore) -> Vec<ShiftOccurrence> {
        store
            .occurrences_between(PhysicianId::new(1), june(1), june(30))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_daily_sequence_restarts_each_day() {
        let store = InMemoryStore::new();
        let a = insert(&store, "Ada", "Lovelace", 3).await;
        let b = insert(&store, "Ada", "Lovelace", 3).await;
        let c = insert(&store, "Ada", "Lovelace", 4).await;

        assert_eq!(a.confirmation_number.as_str(), "MD0306LOAD0001");
        assert_eq!(b.confirmation_number.as_str(), "MD0306LOAD0002");
        assert_eq!(c.confirmation_number.as_str(), "MD0406LOAD0001");
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_distinct_sequences() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let prefix = prefix("Ada", "Lovelace", 3);
                    store
                        .insert_case(intake("Ada", "Lovelace"), prefix, june(3), Timestamp::now())
                        .await
                })
            })
            .collect();

        let mut sequences = Vec::new();
        for handle in handles {
            let case = handle.await.unwrap().unwrap();
            sequences.push(case.confirmation_number.daily_sequence().unwrap());
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=50).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_update_requires_current_version() {
        let store = InMemoryStore::new();
        let case = insert(&store, "Ada", "Lovelace", 3).await;

        let t = casework::transitions::apply(&case, &CaseAction::Clear, Timestamp::now()).unwrap();
        let stored = store.update_case(t.case.clone(), case.version).await.unwrap();
        assert_eq!(stored.version, 1);

        let err = store.update_case(t.case, case.version).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
        let current = store.find_case(case.id).await.unwrap().unwrap();
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_case_is_not_found() {
        let store = InMemoryStore::new();
        let other = InMemoryStore::new();
        let case = insert(&other, "Ada", "Lovelace", 3).await;
        let err = store.update_case(case, 0).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_count_by_tag_skips_archived() {
        let store = InMemoryStore::new();
        let a = insert(&store, "Ada", "Lovelace", 3).await;
        insert(&store, "Alan", "Turing", 3).await;

        let block = CaseAction::Block {
            reason: "spam".into(),
        };
        let blocked = casework::transitions::apply(&a, &block, Timestamp::now()).unwrap();
        store.update_case(blocked.case, a.version).await.unwrap();

        let counts = store.count_by_tag().await.unwrap();
        assert_eq!(counts.len(), CaseTag::ALL.len());
        assert!(counts.contains(&(CaseTag::New, 1)));
        assert!(counts.contains(&(CaseTag::UnPaid, 0)));
    }

    #[tokio::test]
    async fn test_approve_many_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let rows = stored(&store, vec![draft(3), draft(4)]).await;
        let mut ids: Vec<ShiftId> = rows.iter().map(|r| r.id).collect();
        ids.push(ShiftId::new(999));

        let err = store.approve_many(&ids).await.unwrap_err();
        assert_eq!(err, CaseworkError::not_found(EntityKind::Shift, 999));

        let listed = june_schedule(&store).await;
        assert!(listed.iter().all(|o| !o.is_approved));

        let approved = store.approve_many(&ids[..2]).await.unwrap();
        assert!(approved.iter().all(|o| o.is_approved));
    }

    #[tokio::test]
    async fn test_delete_many_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let rows = stored(&store, vec![draft(3), draft(4)]).await;
        let ids = vec![rows[0].id, ShiftId::new(999), rows[1].id];

        let err = store.delete_many(&ids).await.unwrap_err();
        assert_eq!(err, CaseworkError::not_found(EntityKind::Shift, 999));

        let listed = june_schedule(&store).await;
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|o| !o.is_deleted));
    }

    #[tokio::test]
    async fn test_deleted_occurrences_are_not_listed() {
        let store = InMemoryStore::new();
        let rows = stored(&store, vec![draft(5), draft(3), draft(4)]).await;
        store.delete_many(&[rows[2].id]).await.unwrap();

        let listed = june_schedule(&store).await;
        let dates: Vec<NaiveDate> = listed.iter().map(|o| o.shift_date).collect();
        assert_eq!(dates, vec![june(3), june(5)]);
    }

    #[tokio::test]
    async fn test_on_call_record_is_last_write_wins_by_resolution_time() {
        let store = InMemoryStore::seeded(Vec::new(), vec![physician(1)]);
        let offset = FixedOffset::east_opt(0).unwrap();
        let noon = LocalInstant::new(offset.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap());
        let evening = LocalInstant::new(offset.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap());

        let newer = OnCallRecord { status: OnCallStatus::UnScheduled, resolved_at: evening };
        let older = OnCallRecord { status: OnCallStatus::OnCall, resolved_at: noon };

        store.record_on_call(PhysicianId::new(1), newer).await.unwrap();
        let kept = store.record_on_call(PhysicianId::new(1), older).await.unwrap();
        assert_eq!(kept, newer);

        let physician = store.find_physician(PhysicianId::new(1)).await.unwrap().unwrap();
        assert_eq!(physician.on_call, Some(newer));
        assert_eq!(physician.email.as_deref(), Some("house@example.com"));
    }

    #[tokio::test]
    async fn test_region_lookup() {
        let store = InMemoryStore::seeded(
            vec![(RegionName::new("Maryland").unwrap(), "MD".to_string())],
            Vec::new(),
        );
        let maryland = RegionName::new("Maryland").unwrap();
        let ohio = RegionName::new("Ohio").unwrap();

        assert_eq!(store.abbreviation(&maryland).await.unwrap().as_deref(), Some("MD"));
        assert_eq!(store.abbreviation(&ohio).await.unwrap(), None);
    }
}
