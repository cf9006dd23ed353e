use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, Order};
use crate::domain::ports::FulfillmentRepository;
use crate::domain::verification::LineProgress;

/// An order with every line and its packaging counter.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<LineProgress>,
}

/// Intake adapter: the collaborator that hands orders to fulfillment.
pub struct OrderService<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: FulfillmentRepository + ?Sized> OrderService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn create_order(&self, order: NewOrder) -> Result<Uuid, DomainError> {
        order.validate().map_err(DomainError::InvalidInput)?;
        let order_number = order.order_number.clone();
        let lines = order.lines.len();

        let id = self.repo.create_order(order)?;
        info!("Order {} ({}) created with {} line(s)", order_number, id, lines);
        Ok(id)
    }

    pub fn get_order(&self, id: Uuid) -> Result<OrderDetail, DomainError> {
        let order = self
            .repo
            .find_order(id)?
            .ok_or_else(|| DomainError::order_not_found(id))?;
        let lines = self.repo.line_progress(id)?;
        Ok(OrderDetail { order, lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{order_with_lines, repo};
    use crate::domain::order::{NewOrderLine, OrderStatus};

    #[test]
    fn created_order_starts_in_created_without_counters() {
        let repo = repo();
        let service = OrderService::new(repo.clone());

        let id = service
            .create_order(order_with_lines("PED-100", &[("7701", 2), ("7702", 1)]))
            .expect("create failed");
        let detail = service.get_order(id).expect("get failed");

        assert_eq!(detail.order.status, OrderStatus::Created);
        assert_eq!(detail.lines.len(), 2);
        assert!(detail.lines.iter().all(|l| l.verification.is_none()));
        assert!(repo.events().is_empty());
    }

    #[test]
    fn invalid_order_never_reaches_storage() {
        let repo = repo();
        let service = OrderService::new(repo.clone());
        let mut order = order_with_lines("PED-101", &[("7701", 1)]);
        order.lines.push(NewOrderLine {
            product_code: "7702".to_string(),
            description: "Broken".to_string(),
            quantity: 0,
        });

        let err = service.create_order(order).expect_err("zero quantity");

        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert!(repo
            .orders_with_status(&[OrderStatus::Created])
            .expect("query")
            .is_empty());
    }

    #[test]
    fn unknown_carrier_is_rejected_and_known_one_is_named() {
        let repo = repo();
        let service = OrderService::new(repo.clone());

        let mut order = order_with_lines("PED-102", &[("7701", 1)]);
        order.carrier_id = Some(Uuid::new_v4());
        let err = service.create_order(order).expect_err("unknown carrier");
        assert!(matches!(err, DomainError::InvalidInput(_)));

        let carrier_id = repo.add_carrier("Envía");
        let mut order = order_with_lines("PED-102", &[("7701", 1)]);
        order.carrier_id = Some(carrier_id);
        let id = service.create_order(order).expect("create failed");
        let detail = service.get_order(id).expect("get failed");
        assert_eq!(detail.order.carrier_name.as_deref(), Some("Envía"));
    }

    #[test]
    fn unknown_order_is_not_found() {
        let service = OrderService::new(repo());

        let err = service.get_order(Uuid::new_v4()).expect_err("missing");

        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
