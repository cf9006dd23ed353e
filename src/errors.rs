use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(e) => match e {
                DomainError::NotFound(_) => "not_found",
                DomainError::InvalidInput(_) => "invalid_input",
                DomainError::InvalidState(_) => "invalid_state",
                DomainError::AlreadyInPackaging { .. } => "already_in_packaging",
                DomainError::CodeMismatch { .. } => "code_mismatch",
                DomainError::AlreadyComplete { .. } => "already_complete",
                DomainError::IncompleteVerification { .. } => "incomplete_verification",
                DomainError::AlreadyHandled { .. } => "already_taken",
                DomainError::MessengerInactive(_) => "messenger_inactive",
                DomainError::NotAssignedMessenger { .. } => "not_assigned_messenger",
                DomainError::InvalidTransition { .. } => "invalid_transition",
                DomainError::Internal(_) => "internal_error",
            },
            AppError::Internal(_) => "internal_error",
        }
    }

    fn details(&self) -> Value {
        let AppError::Domain(e) = self else {
            return Value::Null;
        };
        match e {
            DomainError::AlreadyInPackaging { status } => json!({ "status": status }),
            DomainError::CodeMismatch { line_id, scanned } => {
                json!({ "line_id": line_id, "scanned": scanned })
            }
            DomainError::AlreadyComplete {
                line_id,
                required_scans,
            } => json!({ "line_id": line_id, "required_scans": required_scans }),
            DomainError::IncompleteVerification { lines } => json!({ "lines": lines }),
            DomainError::AlreadyHandled { order_id } => json!({ "order_id": order_id }),
            DomainError::NotAssignedMessenger {
                order_id,
                messenger_id,
            } => json!({ "order_id": order_id, "messenger_id": messenger_id }),
            DomainError::InvalidTransition { current, requested } => json!({
                "current": current,
                "requested": requested.to_string(),
            }),
            _ => Value::Null,
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Internal(_) | AppError::Domain(DomainError::Internal(_))
        )
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(e) => match e {
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                DomainError::InvalidState(_)
                | DomainError::AlreadyInPackaging { .. }
                | DomainError::AlreadyComplete { .. }
                | DomainError::IncompleteVerification { .. }
                | DomainError::AlreadyHandled { .. }
                | DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
                DomainError::CodeMismatch { .. } | DomainError::MessengerInactive(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DomainError::NotAssignedMessenger { .. } => StatusCode::FORBIDDEN,
                DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_internal() {
            log::error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": message,
            "details": self.details(),
        }))
    }
}
