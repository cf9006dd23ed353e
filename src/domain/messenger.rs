use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Messenger-side state of a locally delivered order.
///
/// An order with no messenger carries no status at all (`Option::None`);
/// that is the "unassigned" state of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessengerStatus {
    Assigned,
    Accepted,
    /// Recorded in the event stream only; a rejected order is stored as
    /// unassigned again.
    Rejected,
    InDelivery,
    Completed,
    Failed,
}

impl MessengerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::InDelivery => "in_delivery",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States in which the order still sits on a messenger's worklist.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::Accepted | Self::InDelivery)
    }

    /// Human label for an optional status, `unassigned` for `None`.
    pub fn describe(status: &Option<MessengerStatus>) -> &'static str {
        status.as_ref().map_or("unassigned", MessengerStatus::as_str)
    }
}

impl fmt::Display for MessengerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessengerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "in_delivery" => Ok(Self::InDelivery),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid messenger status: {s}")),
        }
    }
}

/// Operations that drive the messenger workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessengerAction {
    Assign,
    Accept,
    Reject,
    StartDelivery,
    CompleteDelivery,
    FailDelivery,
}

impl MessengerAction {
    pub const ALL: [MessengerAction; 6] = [
        Self::Assign,
        Self::Accept,
        Self::Reject,
        Self::StartDelivery,
        Self::CompleteDelivery,
        Self::FailDelivery,
    ];
}

impl fmt::Display for MessengerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Assign => "assign",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::StartDelivery => "start delivery",
            Self::CompleteDelivery => "complete delivery",
            Self::FailDelivery => "fail delivery",
        };
        f.write_str(name)
    }
}

/// The messenger transition table.
///
/// Returns the stored status after `action`, or `InvalidTransition` for any
/// pair not listed. Rejection stores `None`: the order goes back to the pool.
pub fn next_status(
    current: Option<MessengerStatus>,
    action: MessengerAction,
) -> Result<Option<MessengerStatus>, DomainError> {
    use MessengerAction as A;
    use MessengerStatus as S;

    match (current, action) {
        (None, A::Assign) => Ok(Some(S::Assigned)),
        (Some(S::Assigned), A::Accept) => Ok(Some(S::Accepted)),
        (Some(S::Assigned), A::Reject) => Ok(None),
        (Some(S::Accepted), A::StartDelivery) => Ok(Some(S::InDelivery)),
        (Some(S::InDelivery), A::CompleteDelivery) => Ok(Some(S::Completed)),
        (Some(S::InDelivery), A::FailDelivery) => Ok(Some(S::Failed)),
        (current, requested) => Err(DomainError::InvalidTransition { current, requested }),
    }
}

/// Read-only view of a delivery agent from the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Messenger {
    pub id: Uuid,
    pub display_name: String,
    pub is_active: bool,
}
