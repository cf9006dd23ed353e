pub mod dispatch_service;
pub mod messenger_service;
pub mod order_service;
pub mod packaging_service;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::messenger_service::MessengerService;
    use super::packaging_service::PackagingService;
    use crate::domain::order::{NewOrder, NewOrderLine};
    use crate::domain::ports::FulfillmentRepository;
    use crate::infrastructure::memory::InMemoryFulfillmentRepository;

    pub fn repo() -> Arc<InMemoryFulfillmentRepository> {
        Arc::new(InMemoryFulfillmentRepository::new())
    }

    pub fn order_with_lines(number: &str, lines: &[(&str, i32)]) -> NewOrder {
        NewOrder {
            order_number: number.to_string(),
            customer_name: "Distribuidora El Sol".to_string(),
            delivery_method: Some("mensajeria_local".to_string()),
            carrier_id: None,
            lines: lines
                .iter()
                .map(|&(code, quantity)| NewOrderLine {
                    product_code: code.to_string(),
                    description: format!("Producto {code}"),
                    quantity,
                })
                .collect(),
        }
    }

    pub fn line_ids(repo: &InMemoryFulfillmentRepository, order_id: Uuid) -> Vec<Uuid> {
        repo.line_progress(order_id)
            .expect("progress")
            .into_iter()
            .map(|p| p.line.id)
            .collect()
    }

    /// Run an order through packaging so it lands in `ready_for_delivery`.
    pub fn ready_order(repo: &Arc<InMemoryFulfillmentRepository>, order: NewOrder) -> Uuid {
        let codes: Vec<(String, i32)> = order
            .lines
            .iter()
            .map(|l| (l.product_code.clone(), l.quantity))
            .collect();
        let order_id = repo.create_order(order).expect("create");
        let packaging = PackagingService::new(repo.clone());
        packaging.begin_packaging(order_id).expect("begin");
        for (line_id, (code, quantity)) in line_ids(repo, order_id).into_iter().zip(codes) {
            for _ in 0..quantity {
                packaging
                    .record_scan(order_id, line_id, &code)
                    .expect("scan");
            }
        }
        packaging.complete_packaging(order_id).expect("complete");
        order_id
    }

    /// A packed local-delivery order already assigned to a fresh messenger.
    pub fn assigned_order(repo: &Arc<InMemoryFulfillmentRepository>) -> (Uuid, Uuid) {
        let order_id = ready_order(repo, order_with_lines("PED-ASSIGN", &[("7701", 1)]));
        let messenger_id = repo.add_messenger("Carlos", true);
        MessengerService::new(repo.clone())
            .assign(order_id, messenger_id)
            .expect("assign");
        (order_id, messenger_id)
    }
}
