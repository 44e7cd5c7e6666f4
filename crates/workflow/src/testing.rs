//! Shared fixtures for service tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use casework::{
    Case, CaseId, CaseIntake, CaseRepository, CaseTag, CaseworkError, ConfirmationPrefix,
    FixedClock, IntakeChannel, LocalInstant, Notice, NotificationError, NotificationGateway,
    PatientDetails, PersonName, Physician, PhysicianId, RegionName, Timestamp,
};
use chrono::{FixedOffset, NaiveDate, TimeZone};
use storage::InMemoryStore;
use tokio::sync::mpsc;

/// Forwards every notice to a channel.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl RecordingNotifier {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn send(&self, notice: &Notice) -> Result<(), NotificationError> {
        let _ = self.tx.send(notice.clone());
        Ok(())
    }
}

/// Rejects every notice.
pub struct FailingNotifier;

#[async_trait]
impl NotificationGateway for FailingNotifier {
    async fn send(&self, _notice: &Notice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport {
            message: "connection refused".into(),
        })
    }
}

/// Case repository whose first `losses` writes lose the version race.
pub struct ContendedCases {
    inner: Arc<InMemoryStore>,
    losses: u32,
    attempts: AtomicU32,
}

impl ContendedCases {
    pub fn new(inner: Arc<InMemoryStore>, losses: u32) -> Arc<Self> {
        Arc::new(Self {
            inner,
            losses,
            attempts: AtomicU32::new(0),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaseRepository for ContendedCases {
    async fn insert_case(
        &self,
        intake: CaseIntake,
        prefix: ConfirmationPrefix,
        created_on: NaiveDate,
        created_at: Timestamp,
    ) -> Result<Case, CaseworkError> {
        self.inner.insert_case(intake, prefix, created_on, created_at).await
    }

    async fn find_case(&self, id: CaseId) -> Result<Option<Case>, CaseworkError> {
        self.inner.find_case(id).await
    }

    async fn update_case(&self, case: Case, expected_version: u64) -> Result<Case, CaseworkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.losses {
            return Err(CaseworkError::Conflict {
                reason: format!("case {} was written concurrently", case.id),
            });
        }
        self.inner.update_case(case, expected_version).await
    }

    async fn count_by_tag(&self) -> Result<Vec<(CaseTag, u64)>, CaseworkError> {
        self.inner.count_by_tag().await
    }
}

pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Notice {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("notice not dispatched in time")
        .expect("notifier dropped")
}

/// 2024-06-03 (a Monday) at the given local time, UTC offset zero.
pub fn june_third_at(hour: u32, minute: u32, second: u32) -> LocalInstant {
    let offset = FixedOffset::east_opt(0).unwrap();
    LocalInstant::new(offset.with_ymd_and_hms(2024, 6, 3, hour, minute, second).unwrap())
}

pub fn clock_at(hour: u32, minute: u32, second: u32) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(june_third_at(hour, minute, second)))
}

pub fn maryland() -> RegionName {
    RegionName::new("Maryland").unwrap()
}

pub fn physician(id: u64, region: &str) -> Physician {
    Physician {
        id: PhysicianId::new(id),
        name: PersonName::new("Gregory", format!("House{id}")).unwrap(),
        email: Some(format!("md{id}@example.com")),
        phone: None,
        regions: vec![RegionName::new(region).unwrap()],
        on_call: None,
    }
}

/// Maryland (MD) and Virginia (VA); physicians 1 and 2 in Maryland, 3 in Virginia.
pub fn seeded_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::seeded(
        vec![
            (maryland(), "MD".to_string()),
            (RegionName::new("Virginia").unwrap(), "VA".to_string()),
        ],
        vec![
            physician(1, "Maryland"),
            physician(2, "Maryland"),
            physician(3, "Virginia"),
        ],
    ))
}

pub fn intake(first: &str, last: &str) -> CaseIntake {
    CaseIntake {
        patient: PatientDetails {
            name: PersonName::new(first, last).unwrap(),
            email: Some("patient@example.com".into()),
            phone: Some("555-0100".into()),
            date_of_birth: None,
            address: Some("1 Main St".into()),
        },
        region: maryland(),
        symptoms: Some("fever".into()),
        channel: IntakeChannel::Patient,
    }
}
