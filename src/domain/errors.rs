use thiserror::Error;
use uuid::Uuid;

use super::messenger::{MessengerAction, MessengerStatus};
use super::order::OrderStatus;
use super::verification::UnverifiedLine;

/// Everything a fulfillment operation can refuse to do.
///
/// All variants except `Internal` are recoverable outcomes the caller can act
/// on; `Internal` means the datastore could not be reached or misbehaved.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Order is already past intake (status {status})")]
    AlreadyInPackaging { status: OrderStatus },

    #[error("Scanned code '{scanned}' does not match line {line_id}")]
    CodeMismatch { line_id: Uuid, scanned: String },

    #[error("All {required_scans} units of line {line_id} are already scanned")]
    AlreadyComplete { line_id: Uuid, required_scans: i32 },

    #[error("{} line(s) still unverified", .lines.len())]
    IncompleteVerification { lines: Vec<UnverifiedLine> },

    #[error("Order {order_id} was already taken by another request")]
    AlreadyHandled { order_id: Uuid },

    #[error("Messenger {0} is inactive")]
    MessengerInactive(Uuid),

    #[error("Order {order_id} is not assigned to messenger {messenger_id}")]
    NotAssignedMessenger { order_id: Uuid, messenger_id: Uuid },

    #[error("Cannot {requested} from messenger state {}", MessengerStatus::describe(.current))]
    InvalidTransition {
        current: Option<MessengerStatus>,
        requested: MessengerAction,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn order_not_found(id: Uuid) -> Self {
        DomainError::NotFound(format!("Order {id}"))
    }

    pub fn line_not_found(id: Uuid) -> Self {
        DomainError::NotFound(format!("Order line {id}"))
    }
}
