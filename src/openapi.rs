//! OpenAPI document for the fulfillment HTTP API.

use utoipa::OpenApi;

use crate::handlers::{dispatch, messengers, orders, packaging};

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::get_order,
        packaging::change_line_quantity,
        packaging::checklist,
        packaging::begin_packaging,
        packaging::record_scan,
        packaging::complete_packaging,
        packaging::reset_line,
        packaging::return_to_packaging,
        dispatch::board,
        dispatch::messenger_pool,
        dispatch::assign,
        messengers::list_orders,
        messengers::delivery_history,
        messengers::accept,
        messengers::reject,
        messengers::start_delivery,
        messengers::complete_delivery,
        messengers::fail_delivery,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::CreateOrderLineRequest,
        orders::CreateOrderResponse,
        orders::OrderResponse,
        orders::OrderLineResponse,
        orders::OrderDetailResponse,
        orders::VerificationResponse,
        packaging::ChecklistResponse,
        packaging::ScanRequest,
        packaging::ScanResponse,
        packaging::ReasonRequest,
        packaging::QuantityRequest,
        packaging::LineResponse,
        dispatch::AssignRequest,
        dispatch::BoardEntryResponse,
        dispatch::CategoryGroupResponse,
        dispatch::DispatchBoardResponse,
        messengers::RejectRequest,
        messengers::FailRequest,
    )),
    tags(
        (name = "orders", description = "Order intake and lookup"),
        (name = "packaging", description = "Barcode-verified packing"),
        (name = "dispatch", description = "Delivery classification and messenger assignment"),
        (name = "messengers", description = "Messenger delivery workflow"),
    ),
    info(
        title = "Fulfillment Service API",
        version = "0.1.0",
        description = "Packaging verification, delivery classification and messenger dispatch"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();

        for path in [
            "/orders",
            "/orders/{id}",
            "/orders/{id}/packaging/lines/{line_id}/scan",
            "/dispatch/board",
            "/messengers/{messenger_id}/orders/history",
            "/messengers/{messenger_id}/orders/{order_id}/fail",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
