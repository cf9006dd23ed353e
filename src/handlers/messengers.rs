use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::optional_body;
use super::orders::OrderResponse;
use crate::application::messenger_service::MessengerService;
use crate::domain::ports::FulfillmentRepository;
use crate::errors::AppError;

type Service = web::Data<MessengerService<dyn FulfillmentRepository>>;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FailRequest {
    /// Required: why the delivery could not be made.
    pub reason: String,
}

/// GET /messengers/{messenger_id}/orders
///
/// Orders assigned to the messenger that are not yet finished, oldest first.
#[utoipa::path(
    get,
    path = "/messengers/{messenger_id}/orders",
    params(("messenger_id" = Uuid, Path, description = "Messenger UUID")),
    responses(
        (status = 200, description = "Active orders", body = Vec<OrderResponse>),
        (status = 404, description = "Messenger not found"),
    ),
    tag = "messengers"
)]
pub async fn list_orders(service: Service, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let messenger_id = path.into_inner();

    let orders = web::block(move || service.list_orders(messenger_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /messengers/{messenger_id}/orders/history
///
/// Orders the messenger delivered or failed, newest first.
#[utoipa::path(
    get,
    path = "/messengers/{messenger_id}/orders/history",
    params(("messenger_id" = Uuid, Path, description = "Messenger UUID")),
    responses(
        (status = 200, description = "Finished deliveries", body = Vec<OrderResponse>),
        (status = 404, description = "Messenger not found"),
    ),
    tag = "messengers"
)]
pub async fn delivery_history(
    service: Service,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let messenger_id = path.into_inner();

    let orders = web::block(move || service.delivery_history(messenger_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /messengers/{messenger_id}/orders/{order_id}/accept
///
/// At most one accept wins; everyone else gets `already_taken`.
#[utoipa::path(
    post,
    path = "/messengers/{messenger_id}/orders/{order_id}/accept",
    params(
        ("messenger_id" = Uuid, Path, description = "Messenger UUID"),
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order accepted", body = OrderResponse),
        (status = 403, description = "Order belongs to another messenger"),
        (status = 409, description = "Already taken, or not acceptable from its state"),
    ),
    tag = "messengers"
)]
pub async fn accept(service: Service, path: web::Path<(Uuid, Uuid)>) -> Result<HttpResponse, AppError> {
    let (messenger_id, order_id) = path.into_inner();

    let order = web::block(move || service.accept(order_id, messenger_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /messengers/{messenger_id}/orders/{order_id}/reject
#[utoipa::path(
    post,
    path = "/messengers/{messenger_id}/orders/{order_id}/reject",
    params(
        ("messenger_id" = Uuid, Path, description = "Messenger UUID"),
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body(content = RejectRequest, description = "Optional reason"),
    responses(
        (status = 200, description = "Order back in the pool", body = OrderResponse),
        (status = 400, description = "Body is not a valid reason"),
        (status = 403, description = "Order belongs to another messenger"),
        (status = 409, description = "Not rejectable from its state"),
    ),
    tag = "messengers"
)]
pub async fn reject(
    service: Service,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let (messenger_id, order_id) = path.into_inner();
    let reason = optional_body::<RejectRequest>(&body)?.reason;

    let order = web::block(move || service.reject(order_id, messenger_id, reason))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /messengers/{messenger_id}/orders/{order_id}/start
#[utoipa::path(
    post,
    path = "/messengers/{messenger_id}/orders/{order_id}/start",
    params(
        ("messenger_id" = Uuid, Path, description = "Messenger UUID"),
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order en route", body = OrderResponse),
        (status = 403, description = "Order belongs to another messenger"),
        (status = 409, description = "Invalid transition"),
    ),
    tag = "messengers"
)]
pub async fn start_delivery(
    service: Service,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (messenger_id, order_id) = path.into_inner();

    let order = web::block(move || service.start_delivery(order_id, messenger_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /messengers/{messenger_id}/orders/{order_id}/complete
#[utoipa::path(
    post,
    path = "/messengers/{messenger_id}/orders/{order_id}/complete",
    params(
        ("messenger_id" = Uuid, Path, description = "Messenger UUID"),
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order delivered", body = OrderResponse),
        (status = 403, description = "Order belongs to another messenger"),
        (status = 409, description = "Invalid transition"),
    ),
    tag = "messengers"
)]
pub async fn complete_delivery(
    service: Service,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (messenger_id, order_id) = path.into_inner();

    let order = web::block(move || service.complete_delivery(order_id, messenger_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /messengers/{messenger_id}/orders/{order_id}/fail
#[utoipa::path(
    post,
    path = "/messengers/{messenger_id}/orders/{order_id}/fail",
    params(
        ("messenger_id" = Uuid, Path, description = "Messenger UUID"),
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = FailRequest,
    responses(
        (status = 200, description = "Delivery failed", body = OrderResponse),
        (status = 400, description = "Missing reason"),
        (status = 403, description = "Order belongs to another messenger"),
        (status = 409, description = "Invalid transition"),
    ),
    tag = "messengers"
)]
pub async fn fail_delivery(
    service: Service,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<FailRequest>,
) -> Result<HttpResponse, AppError> {
    let (messenger_id, order_id) = path.into_inner();
    let reason = body.into_inner().reason;

    let order = web::block(move || service.fail_delivery(order_id, messenger_id, &reason))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
