//! The case lifecycle transition table.
//!
//! [`TRANSITIONS`] is the single source of truth for which actions are allowed
//! from which `(tag, status)` pairs and where they lead. Precondition checks,
//! the recognised pair set, and [`apply`] are all derived from it.
//!
//! | Action | From (tag, status) | To (tag, status) | Archival |
//! |--------|--------------------|------------------|----------|
//! | `assign` | `(New\|ToClose, *)` | `(Pending, Processing)` | keep |
//! | `accept` | `(Pending, Processing)` | `(Pending, Accepted)` | keep |
//! | `acceptAgreement` | `(Pending, Accepted)` | `(Active, MDOnRoute)` | keep |
//! | `cancelAgreement` | `(Pending, Accepted)` | `(ToClose, Declined)` | keep |
//! | `conclude` | `(Active, MDOnRoute)` | `(Conclude, Consult)` | keep |
//! | `transfer` | `(Pending\|Active, *)` | unchanged | keep |
//! | `cancelByAdmin` | `(New\|Pending\|Active, not Blocked/Cleared)` | `(ToClose, CancelledByAdmin)` | archive |
//! | `block` | `(*, *)` | `(*, Blocked)` | archive |
//! | `clear` | `(*, *)` | `(*, Cleared)` | archive |
//! | `close` | `(ToClose, *)` | `(UnPaid, Closed)` | keep |
//! | `unblock` | `(*, Blocked)` | `(*, Unassigned)` | restore |
//! | `cancelByPatient` | `(New, Unassigned)` | `(ToClose, Cancelled)` | keep |
//! | `declineByProvider` | `(Pending, Processing\|Accepted)` | `(New, CancelledByProvider)` | keep |

use serde::{Deserialize, Serialize};

use crate::{
    Archival, Case, CaseState, CaseStatus, CaseTag, CaseworkError, Notice, NoticeKind,
    PhysicianId, Recipient, Timestamp,
};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The name of a lifecycle action, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Admin assigns a physician.
    Assign,
    /// Physician accepts the assignment.
    Accept,
    /// Patient accepts the agreement.
    AcceptAgreement,
    /// Patient declines the agreement.
    CancelAgreement,
    /// Physician concludes the visit.
    Conclude,
    /// Admin moves the case to another physician.
    Transfer,
    /// Admin cancels a non-terminal case.
    CancelByAdmin,
    /// Admin blocks the case.
    Block,
    /// Admin clears the case.
    Clear,
    /// Admin closes a `ToClose` case.
    Close,
    /// Admin lifts a block.
    Unblock,
    /// Patient withdraws an unassigned case.
    CancelByPatient,
    /// Physician hands the case back before the agreement.
    DeclineByProvider,
}

impl ActionKind {
    /// Every action, in table order.
    pub const ALL: [ActionKind; 13] = [
        Self::Assign,
        Self::Accept,
        Self::AcceptAgreement,
        Self::CancelAgreement,
        Self::Conclude,
        Self::Transfer,
        Self::CancelByAdmin,
        Self::Block,
        Self::Clear,
        Self::Close,
        Self::Unblock,
        Self::CancelByPatient,
        Self::DeclineByProvider,
    ];

    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Accept => "accept",
            Self::AcceptAgreement => "acceptAgreement",
            Self::CancelAgreement => "cancelAgreement",
            Self::Conclude => "conclude",
            Self::Transfer => "transfer",
            Self::CancelByAdmin => "cancelByAdmin",
            Self::Block => "block",
            Self::Clear => "clear",
            Self::Close => "close",
            Self::Unblock => "unblock",
            Self::CancelByPatient => "cancelByPatient",
            Self::DeclineByProvider => "declineByProvider",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle action together with the fields it owns on the case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseAction {
    Assign {
        physician_id: PhysicianId,
        note: Option<String>,
    },
    Accept,
    AcceptAgreement,
    CancelAgreement {
        reason: String,
    },
    Conclude {
        physician_notes: String,
    },
    Transfer {
        physician_id: PhysicianId,
        note: Option<String>,
    },
    CancelByAdmin {
        reason: String,
        admin_notes: Option<String>,
    },
    Block {
        reason: String,
    },
    Clear,
    Close,
    Unblock,
    CancelByPatient {
        reason: String,
    },
    DeclineByProvider {
        note: Option<String>,
    },
}

impl CaseAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Assign { .. } => ActionKind::Assign,
            Self::Accept => ActionKind::Accept,
            Self::AcceptAgreement => ActionKind::AcceptAgreement,
            Self::CancelAgreement { .. } => ActionKind::CancelAgreement,
            Self::Conclude { .. } => ActionKind::Conclude,
            Self::Transfer { .. } => ActionKind::Transfer,
            Self::CancelByAdmin { .. } => ActionKind::CancelByAdmin,
            Self::Block { .. } => ActionKind::Block,
            Self::Clear => ActionKind::Clear,
            Self::Close => ActionKind::Close,
            Self::Unblock => ActionKind::Unblock,
            Self::CancelByPatient { .. } => ActionKind::CancelByPatient,
            Self::DeclineByProvider { .. } => ActionKind::DeclineByProvider,
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Matches a tag or status in a rule's precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern<T: 'static> {
    Any,
    Only(&'static [T]),
}

impl<T: PartialEq> Pattern<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Only(values) => values.contains(value),
        }
    }
}

/// What a rule does to the case's archival marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivalEffect {
    Keep,
    Archive,
    Restore,
}

/// One row of the transition table.
///
/// `next_tag`/`next_status` of `None` leave that coordinate unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub action: ActionKind,
    pub tags: Pattern<CaseTag>,
    pub statuses: Pattern<CaseStatus>,
    pub next_tag: Option<CaseTag>,
    pub next_status: Option<CaseStatus>,
    pub archival: ArchivalEffect,
}

impl TransitionRule {
    pub fn permits(&self, state: CaseState) -> bool {
        self.tags.matches(&state.tag) && self.statuses.matches(&state.status)
    }

    pub fn target(&self, state: CaseState) -> CaseState {
        CaseState::new(
            self.next_tag.unwrap_or(state.tag),
            self.next_status.unwrap_or(state.status),
        )
    }

    /// Whether applying this rule can leave a case in `state`.
    ///
    /// Identity rules (transfer) produce nothing new and are ignored.
    fn can_produce(&self, state: CaseState) -> bool {
        match (self.next_tag, self.next_status) {
            (None, None) => false,
            (tag, status) => {
                tag.map_or(true, |t| t == state.tag) && status.map_or(true, |s| s == state.status)
            }
        }
    }
}

const NON_TERMINAL_STATUSES: &[CaseStatus] = &[
    CaseStatus::Unassigned,
    CaseStatus::Processing,
    CaseStatus::Accepted,
    CaseStatus::MdOnRoute,
    CaseStatus::Consult,
    CaseStatus::Declined,
    CaseStatus::Cancelled,
    CaseStatus::CancelledByAdmin,
    CaseStatus::CancelledByProvider,
    CaseStatus::Closed,
    CaseStatus::Unpaid,
];

/// The lifecycle transition table. Exactly one row per [`ActionKind`].
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        action: ActionKind::Assign,
        tags: Pattern::Only(&[CaseTag::New, CaseTag::ToClose]),
        statuses: Pattern::Any,
        next_tag: Some(CaseTag::Pending),
        next_status: Some(CaseStatus::Processing),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::Accept,
        tags: Pattern::Only(&[CaseTag::Pending]),
        statuses: Pattern::Only(&[CaseStatus::Processing]),
        next_tag: Some(CaseTag::Pending),
        next_status: Some(CaseStatus::Accepted),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::AcceptAgreement,
        tags: Pattern::Only(&[CaseTag::Pending]),
        statuses: Pattern::Only(&[CaseStatus::Accepted]),
        next_tag: Some(CaseTag::Active),
        next_status: Some(CaseStatus::MdOnRoute),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::CancelAgreement,
        tags: Pattern::Only(&[CaseTag::Pending]),
        statuses: Pattern::Only(&[CaseStatus::Accepted]),
        next_tag: Some(CaseTag::ToClose),
        next_status: Some(CaseStatus::Declined),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::Conclude,
        tags: Pattern::Only(&[CaseTag::Active]),
        statuses: Pattern::Only(&[CaseStatus::MdOnRoute]),
        next_tag: Some(CaseTag::Conclude),
        next_status: Some(CaseStatus::Consult),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::Transfer,
        tags: Pattern::Only(&[CaseTag::Pending, CaseTag::Active]),
        statuses: Pattern::Any,
        next_tag: None,
        next_status: None,
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::CancelByAdmin,
        tags: Pattern::Only(&[CaseTag::New, CaseTag::Pending, CaseTag::Active]),
        statuses: Pattern::Only(NON_TERMINAL_STATUSES),
        next_tag: Some(CaseTag::ToClose),
        next_status: Some(CaseStatus::CancelledByAdmin),
        archival: ArchivalEffect::Archive,
    },
    TransitionRule {
        action: ActionKind::Block,
        tags: Pattern::Any,
        statuses: Pattern::Any,
        next_tag: None,
        next_status: Some(CaseStatus::Blocked),
        archival: ArchivalEffect::Archive,
    },
    TransitionRule {
        action: ActionKind::Clear,
        tags: Pattern::Any,
        statuses: Pattern::Any,
        next_tag: None,
        next_status: Some(CaseStatus::Cleared),
        archival: ArchivalEffect::Archive,
    },
    TransitionRule {
        action: ActionKind::Close,
        tags: Pattern::Only(&[CaseTag::ToClose]),
        statuses: Pattern::Any,
        next_tag: Some(CaseTag::UnPaid),
        next_status: Some(CaseStatus::Closed),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::Unblock,
        tags: Pattern::Any,
        statuses: Pattern::Only(&[CaseStatus::Blocked]),
        next_tag: None,
        next_status: Some(CaseStatus::Unassigned),
        archival: ArchivalEffect::Restore,
    },
    TransitionRule {
        action: ActionKind::CancelByPatient,
        tags: Pattern::Only(&[CaseTag::New]),
        statuses: Pattern::Only(&[CaseStatus::Unassigned]),
        next_tag: Some(CaseTag::ToClose),
        next_status: Some(CaseStatus::Cancelled),
        archival: ArchivalEffect::Keep,
    },
    TransitionRule {
        action: ActionKind::DeclineByProvider,
        tags: Pattern::Only(&[CaseTag::Pending]),
        statuses: Pattern::Only(&[CaseStatus::Processing, CaseStatus::Accepted]),
        next_tag: Some(CaseTag::New),
        next_status: Some(CaseStatus::CancelledByProvider),
        archival: ArchivalEffect::Keep,
    },
];

/// The table row for `action`.
pub fn rule(action: ActionKind) -> Option<&'static TransitionRule> {
    TRANSITIONS.iter().find(|r| r.action == action)
}

/// Where `action` takes a case in `state`, or `None` if it is not allowed.
pub fn next_state(state: CaseState, action: ActionKind) -> Option<CaseState> {
    rule(action)
        .filter(|r| r.permits(state))
        .map(|r| r.target(state))
}

/// Whether `state` is a pair some sequence of actions from `create` can reach.
pub fn is_recognised(state: CaseState) -> bool {
    state == CaseState::INITIAL || TRANSITIONS.iter().any(|r| r.can_produce(state))
}

/// Every recognised `(tag, status)` pair.
pub fn recognised_states() -> Vec<CaseState> {
    CaseTag::ALL
        .iter()
        .flat_map(|&tag| CaseStatus::ALL.iter().map(move |&status| CaseState::new(tag, status)))
        .filter(|&s| is_recognised(s))
        .collect()
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// The outcome of applying an action to a case.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State the case was in when the action was evaluated.
    pub from: CaseState,
    /// The updated case. `version` is still the version that was read; storage
    /// bumps it on write.
    pub case: Case,
    /// Notices to dispatch once the write has committed.
    pub notices: Vec<Notice>,
}

/// Evaluates `action` against `case` and returns the updated record.
///
/// Pure: `case` is not modified and nothing is persisted. Fails with
/// [`CaseworkError::InvalidTransition`] when the table does not permit the
/// action from the case's current state.
pub fn apply(case: &Case, action: &CaseAction, at: Timestamp) -> Result<Transition, CaseworkError> {
    let kind = action.kind();
    let from = case.state;
    let invalid = || CaseworkError::InvalidTransition {
        action: kind,
        tag: from.tag,
        status: from.status,
    };

    let rule = match rule(kind) {
        Some(rule) if rule.permits(from) => rule,
        _ => return Err(invalid()),
    };

    let mut next = case.clone();
    next.state = rule.target(from);
    next.updated_at = at;
    next.archival = match rule.archival {
        ArchivalEffect::Keep => case.archival,
        ArchivalEffect::Archive => match case.archival {
            Archival::Active => Archival::Archived { at },
            archived => archived,
        },
        ArchivalEffect::Restore => Archival::Active,
    };

    let mut notices = Vec::new();
    match action {
        CaseAction::Assign { physician_id, note } => {
            next.physician_id = Some(*physician_id);
            next.is_agreement_accepted = false;
            append_note(
                &mut next.transfer_note,
                format!("Assigned to physician {physician_id}"),
                note.as_deref(),
            );
            let to = Recipient::Physician(*physician_id);
            notices.push(Notice::about(&next, NoticeKind::CaseAssigned, to));
        }
        CaseAction::Accept => {}
        CaseAction::AcceptAgreement => {
            if case.is_agreement_accepted {
                return Err(invalid());
            }
            next.is_agreement_accepted = true;
        }
        CaseAction::CancelAgreement { reason } => {
            if case.is_agreement_accepted {
                return Err(invalid());
            }
            next.reason_for_cancellation = Some(reason.clone());
        }
        CaseAction::Conclude { physician_notes } => {
            next.physician_notes = Some(physician_notes.clone());
        }
        CaseAction::Transfer { physician_id, note } => {
            let previous = case.physician_id;
            // Same-physician transfer is not a move.
            if previous == Some(*physician_id) {
                return Err(invalid());
            }
            next.physician_id = Some(*physician_id);
            let summary = match previous {
                Some(old) => {
                    format!("Transferred from physician {old} to physician {physician_id}")
                }
                None => format!("Transferred to physician {physician_id}"),
            };
            append_note(&mut next.transfer_note, summary, note.as_deref());
            if let Some(old) = previous {
                let from = Recipient::Physician(old);
                notices.push(Notice::about(&next, NoticeKind::CaseTransferredOut, from));
            }
            let to = Recipient::Physician(*physician_id);
            notices.push(Notice::about(&next, NoticeKind::CaseTransferredIn, to));
        }
        CaseAction::CancelByAdmin {
            reason,
            admin_notes,
        } => {
            next.reason_for_cancellation = Some(reason.clone());
            if admin_notes.is_some() {
                next.admin_notes = admin_notes.clone();
            }
        }
        CaseAction::Block { reason } => {
            next.reason_for_cancellation = Some(reason.clone());
        }
        CaseAction::Clear | CaseAction::Close | CaseAction::Unblock => {}
        CaseAction::CancelByPatient { reason } => {
            next.reason_for_cancellation = Some(reason.clone());
        }
        CaseAction::DeclineByProvider { note } => {
            let summary = match case.physician_id {
                Some(id) => format!("Declined by physician {id}"),
                None => "Declined by physician".to_string(),
            };
            append_note(&mut next.transfer_note, summary, note.as_deref());
            notices.push(Notice::about(&next, NoticeKind::ProviderDeclined, Recipient::AdminDesk));
        }
    }

    // Removing a case from a physician's view is news to that physician.
    if matches!(kind, ActionKind::CancelByAdmin | ActionKind::Block | ActionKind::Clear) {
        if let Some(physician) = case.physician_id {
            let to = Recipient::Physician(physician);
            notices.push(Notice::about(&next, NoticeKind::CaseWithdrawn, to));
        }
    }

    Ok(Transition {
        from,
        case: next,
        notices,
    })
}

/// Appends one history line to a free-text note field.
fn append_note(field: &mut Option<String>, summary: String, note: Option<&str>) {
    let line = match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("{summary}: {note}"),
        None => summary,
    };
    match field {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(&line);
        }
        None => *field = Some(line),
    }
}
