//! Outbound notices produced by case transitions.
//!
//! A notice is data: the transition decides who must hear about it, the
//! workflow layer hands it to a [`crate::NotificationGateway`]. Delivery is
//! best-effort and never feeds back into the transition.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{Case, CaseId, ConfirmationNumber, NoticeId, PhysicianId};

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// A case was assigned to the recipient.
    CaseAssigned,
    /// A case was transferred to the recipient from another physician.
    CaseTransferredIn,
    /// A case the recipient held was transferred to another physician.
    CaseTransferredOut,
    /// A case the recipient held was cancelled, blocked, or cleared.
    CaseWithdrawn,
    /// The assigned physician handed the case back to the admin desk.
    ProviderDeclined,
}

/// Who receives a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Physician(PhysicianId),
    /// The shared administrative inbox.
    AdminDesk,
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Physician(id) => write!(f, "physician {id}"),
            Self::AdminDesk => f.write_str("admin desk"),
        }
    }
}

/// One message to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub recipient: Recipient,
    pub case_id: CaseId,
    pub confirmation_number: ConfirmationNumber,
    /// Template variables for the email/SMS body.
    pub payload: serde_json::Value,
}

impl Notice {
    pub(crate) fn about(case: &Case, kind: NoticeKind, recipient: Recipient) -> Self {
        Self {
            id: NoticeId::new_random(),
            kind,
            recipient,
            case_id: case.id,
            confirmation_number: case.confirmation_number.clone(),
            payload: json!({
                "patientName": case.patient.name.to_string(),
                "region": case.region.as_str(),
                "tag": case.state.tag,
                "status": case.state.status,
                "physicianId": case.physician_id,
            }),
        }
    }
}
