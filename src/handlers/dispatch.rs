use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::orders::OrderResponse;
use crate::application::dispatch_service::{BoardEntry, DispatchBoard, DispatchService};
use crate::application::messenger_service::MessengerService;
use crate::domain::ports::FulfillmentRepository;
use crate::errors::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct BoardEntryResponse {
    pub order: OrderResponse,
    pub verified_lines: i64,
    pub total_lines: i64,
}

impl From<BoardEntry> for BoardEntryResponse {
    fn from(e: BoardEntry) -> Self {
        BoardEntryResponse {
            order: e.order.into(),
            verified_lines: e.verified_lines,
            total_lines: e.total_lines,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryGroupResponse {
    pub category: String,
    pub count: usize,
    pub orders: Vec<BoardEntryResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchBoardResponse {
    pub groups: Vec<CategoryGroupResponse>,
    pub total: usize,
}

impl From<DispatchBoard> for DispatchBoardResponse {
    fn from(board: DispatchBoard) -> Self {
        DispatchBoardResponse {
            groups: board
                .groups
                .into_iter()
                .map(|g| CategoryGroupResponse {
                    category: g.category.to_string(),
                    count: g.orders.len(),
                    orders: g.orders.into_iter().map(Into::into).collect(),
                })
                .collect(),
            total: board.total,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub messenger_id: Uuid,
}

/// GET /dispatch/board
///
/// Packed and in-transit orders grouped by delivery category. Every category
/// is present, empty or not.
#[utoipa::path(
    get,
    path = "/dispatch/board",
    responses(
        (status = 200, description = "Dispatch board", body = DispatchBoardResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dispatch"
)]
pub async fn board(
    service: web::Data<DispatchService<dyn FulfillmentRepository>>,
) -> Result<HttpResponse, AppError> {
    let board = web::block(move || service.board())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(DispatchBoardResponse::from(board)))
}

/// GET /dispatch/pool
#[utoipa::path(
    get,
    path = "/dispatch/pool",
    responses(
        (status = 200, description = "Unclaimed local deliveries", body = Vec<BoardEntryResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dispatch"
)]
pub async fn messenger_pool(
    service: web::Data<DispatchService<dyn FulfillmentRepository>>,
) -> Result<HttpResponse, AppError> {
    let pool = web::block(move || service.messenger_pool())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<BoardEntryResponse> = pool.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /dispatch/orders/{id}/assign
#[utoipa::path(
    post,
    path = "/dispatch/orders/{id}/assign",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Messenger assigned", body = OrderResponse),
        (status = 404, description = "Order or messenger not found"),
        (status = 409, description = "Order not assignable, or assigned concurrently"),
        (status = 422, description = "Messenger inactive"),
    ),
    tag = "dispatch"
)]
pub async fn assign(
    service: web::Data<MessengerService<dyn FulfillmentRepository>>,
    path: web::Path<Uuid>,
    body: web::Json<AssignRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let messenger_id = body.into_inner().messenger_id;

    let order = web::block(move || service.assign(order_id, messenger_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
