use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::{OrderDetail, OrderService};
use crate::domain::classifier::classify_order;
use crate::domain::order::{NewOrder, NewOrderLine, Order};
use crate::domain::ports::FulfillmentRepository;
use crate::domain::verification::{LineProgress, LineVerification};
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderLineRequest {
    /// Barcode the packer scans for each unit, e.g. "7701234567890"
    pub product_code: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub order_number: String,
    pub customer_name: String,
    /// Free text as captured by intake, e.g. "mensajeria_local"
    pub delivery_method: Option<String>,
    pub carrier_id: Option<Uuid>,
    pub lines: Vec<CreateOrderLineRequest>,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder {
            order_number: req.order_number,
            customer_name: req.customer_name,
            delivery_method: req.delivery_method,
            carrier_id: req.carrier_id,
            lines: req
                .lines
                .into_iter()
                .map(|l| NewOrderLine {
                    product_code: l.product_code,
                    description: l.description,
                    quantity: l.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub status: String,
    pub delivery_method: Option<String>,
    pub carrier_id: Option<Uuid>,
    pub carrier_name: Option<String>,
    /// Delivery category the classifier assigns right now.
    pub category: String,
    pub assigned_messenger_id: Option<Uuid>,
    pub messenger_status: Option<String>,
    pub messenger_name: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        OrderResponse {
            category: classify_order(&o).to_string(),
            id: o.id,
            order_number: o.order_number,
            customer_name: o.customer_name,
            status: o.status.to_string(),
            delivery_method: o.delivery_method,
            carrier_id: o.carrier_id,
            carrier_name: o.carrier_name,
            assigned_messenger_id: o.assigned_messenger_id,
            messenger_status: o.messenger_status.map(|s| s.to_string()),
            messenger_name: o.messenger_name,
            failure_reason: o.failure_reason,
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerificationResponse {
    pub required_scans: i32,
    pub scanned_count: i32,
    pub is_verified: bool,
    pub notes: String,
}

impl From<LineVerification> for VerificationResponse {
    fn from(v: LineVerification) -> Self {
        VerificationResponse {
            required_scans: v.required_scans,
            scanned_count: v.scanned_count,
            is_verified: v.is_verified,
            notes: v.notes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_code: String,
    pub description: String,
    pub quantity: i32,
    /// Absent until packaging starts.
    pub verification: Option<VerificationResponse>,
}

impl From<LineProgress> for OrderLineResponse {
    fn from(p: LineProgress) -> Self {
        OrderLineResponse {
            id: p.line.id,
            product_code: p.line.product_code,
            description: p.line.description,
            quantity: p.line.quantity,
            verification: p.verification.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub lines: Vec<OrderLineResponse>,
}

impl From<OrderDetail> for OrderDetailResponse {
    fn from(d: OrderDetail) -> Self {
        OrderDetailResponse {
            order: d.order.into(),
            lines: d.lines.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Intake hand-off: stores the order in `created` together with its lines.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "Malformed order or duplicate order number"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<OrderService<dyn FulfillmentRepository>>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order: NewOrder = body.into_inner().into();

    let id = web::block(move || service.create_order(order))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// GET /orders/{id}
///
/// Returns the order together with its lines and their packaging counters.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderDetailResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrderService<dyn FulfillmentRepository>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let detail = web::block(move || service.get_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderDetailResponse::from(detail)))
}
