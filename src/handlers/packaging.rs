use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::optional_body;
use super::orders::{OrderLineResponse, OrderResponse, VerificationResponse};
use crate::application::packaging_service::{PackagingChecklist, PackagingService};
use crate::domain::ports::FulfillmentRepository;
use crate::domain::verification::ScanProgress;
use crate::errors::AppError;

type Service = web::Data<PackagingService<dyn FulfillmentRepository>>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ChecklistResponse {
    pub order: OrderResponse,
    pub lines: Vec<OrderLineResponse>,
    pub verified_lines: usize,
    pub total_lines: usize,
    pub can_complete: bool,
}

impl From<PackagingChecklist> for ChecklistResponse {
    fn from(c: PackagingChecklist) -> Self {
        ChecklistResponse {
            order: c.order.into(),
            lines: c.lines.into_iter().map(Into::into).collect(),
            verified_lines: c.verified_lines,
            total_lines: c.total_lines,
            can_complete: c.can_complete,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Raw scanner output; padding and `.00` suffixes are tolerated.
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScanResponse {
    pub line_id: Uuid,
    pub scanned_count: i32,
    pub required_scans: i32,
    pub is_verified: bool,
}

impl From<ScanProgress> for ScanResponse {
    fn from(p: ScanProgress) -> Self {
        ScanResponse {
            line_id: p.line_id,
            scanned_count: p.scanned_count,
            required_scans: p.required_scans,
            is_verified: p.is_verified,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineResponse {
    pub line: OrderLineResponse,
}

/// GET /orders/{id}/packaging
#[utoipa::path(
    get,
    path = "/orders/{id}/packaging",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Packaging checklist", body = ChecklistResponse),
        (status = 404, description = "Order not found"),
    ),
    tag = "packaging"
)]
pub async fn checklist(service: Service, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let checklist = web::block(move || service.checklist(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ChecklistResponse::from(checklist)))
}

/// POST /orders/{id}/packaging/start
#[utoipa::path(
    post,
    path = "/orders/{id}/packaging/start",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Packaging started", body = ChecklistResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already past intake, or has no lines"),
    ),
    tag = "packaging"
)]
pub async fn begin_packaging(
    service: Service,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let checklist = web::block(move || service.begin_packaging(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ChecklistResponse::from(checklist)))
}

/// POST /orders/{id}/packaging/lines/{line_id}/scan
///
/// Counts one unit when the code matches the line's product. Mismatches
/// leave the counter untouched.
#[utoipa::path(
    post,
    path = "/orders/{id}/packaging/lines/{line_id}/scan",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("line_id" = Uuid, Path, description = "Order line UUID"),
    ),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Unit counted", body = ScanResponse),
        (status = 404, description = "Order or line not found"),
        (status = 409, description = "Line already complete or order not in packaging"),
        (status = 422, description = "Scanned code does not match the line"),
    ),
    tag = "packaging"
)]
pub async fn record_scan(
    service: Service,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    let (order_id, line_id) = path.into_inner();
    let code = body.into_inner().code;

    let progress = web::block(move || service.record_scan(order_id, line_id, &code))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ScanResponse::from(progress)))
}

/// POST /orders/{id}/packaging/complete
#[utoipa::path(
    post,
    path = "/orders/{id}/packaging/complete",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order ready for delivery", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Unverified lines remain (listed in details)"),
    ),
    tag = "packaging"
)]
pub async fn complete_packaging(
    service: Service,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || service.complete_packaging(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/lines/{line_id}/reset
#[utoipa::path(
    post,
    path = "/orders/lines/{line_id}/reset",
    params(("line_id" = Uuid, Path, description = "Order line UUID")),
    request_body(content = ReasonRequest, description = "Optional audit reason"),
    responses(
        (status = 200, description = "Counter restarted", body = VerificationResponse),
        (status = 400, description = "Body is not a valid reason"),
        (status = 404, description = "Line not found"),
        (status = 409, description = "Order is not in packaging"),
    ),
    tag = "packaging"
)]
pub async fn reset_line(
    service: Service,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let line_id = path.into_inner();
    let reason = optional_body::<ReasonRequest>(&body)?.reason;

    let verification = web::block(move || service.reset_line(line_id, reason.as_deref()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(VerificationResponse::from(verification)))
}

/// PUT /orders/lines/{line_id}/quantity
///
/// Intake-side quantity correction; restarts the line's counter.
#[utoipa::path(
    put,
    path = "/orders/lines/{line_id}/quantity",
    params(("line_id" = Uuid, Path, description = "Order line UUID")),
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Quantity changed", body = LineResponse),
        (status = 400, description = "Quantity not positive"),
        (status = 404, description = "Line not found"),
        (status = 409, description = "Order already packed"),
    ),
    tag = "orders"
)]
pub async fn change_line_quantity(
    service: Service,
    path: web::Path<Uuid>,
    body: web::Json<QuantityRequest>,
) -> Result<HttpResponse, AppError> {
    let line_id = path.into_inner();
    let quantity = body.into_inner().quantity;

    let progress = web::block(move || service.change_line_quantity(line_id, quantity))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(LineResponse {
        line: progress.into(),
    }))
}

/// POST /orders/{id}/return-to-packaging
#[utoipa::path(
    post,
    path = "/orders/{id}/return-to-packaging",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body(content = ReasonRequest, description = "Optional audit reason"),
    responses(
        (status = 200, description = "Order back in packaging", body = OrderResponse),
        (status = 400, description = "Body is not a valid reason"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already accepted or not packed"),
    ),
    tag = "packaging"
)]
pub async fn return_to_packaging(
    service: Service,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let reason = optional_body::<ReasonRequest>(&body)?.reason;

    let order = web::block(move || service.return_to_packaging(order_id, reason.as_deref()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
