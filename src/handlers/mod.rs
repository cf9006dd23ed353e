pub mod dispatch;
pub mod messengers;
pub mod orders;
pub mod packaging;

use actix_web::web;
use serde::de::DeserializeOwned;

use crate::domain::errors::DomainError;
use crate::errors::AppError;

/// Parse a body that may be left out entirely. An empty body yields the
/// default; anything else must be valid JSON for `T`.
pub(crate) fn optional_body<T: DeserializeOwned + Default>(body: &web::Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| DomainError::InvalidInput(format!("invalid request body: {e}")).into())
}
