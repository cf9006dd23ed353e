use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::classifier::{classify_order, DeliveryCategory};
use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::FulfillmentRepository;
use crate::domain::verification::VerificationSummary;

/// Statuses an order can be in while it is on the dispatch board.
const BOARD_STATUSES: [OrderStatus; 2] = [OrderStatus::ReadyForDelivery, OrderStatus::EnRoute];

#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    pub order: Order,
    pub category: DeliveryCategory,
    pub verified_lines: i64,
    pub total_lines: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub category: DeliveryCategory,
    pub orders: Vec<BoardEntry>,
}

/// Orders leaving the warehouse, one group per category in rule order.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchBoard {
    pub groups: Vec<CategoryGroup>,
    pub total: usize,
}

pub struct DispatchService<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: FulfillmentRepository + ?Sized> DispatchService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn entries(&self, orders: Vec<Order>) -> Result<Vec<BoardEntry>, DomainError> {
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let summaries: HashMap<Uuid, VerificationSummary> = self
            .repo
            .verification_summaries(&ids)?
            .into_iter()
            .map(|s| (s.order_id, s))
            .collect();

        Ok(orders
            .into_iter()
            .map(|order| {
                let (verified_lines, total_lines) = summaries
                    .get(&order.id)
                    .map_or((0, 0), |s| (s.verified_lines, s.total_lines));
                BoardEntry {
                    category: classify_order(&order),
                    order,
                    verified_lines,
                    total_lines,
                }
            })
            .collect())
    }

    pub fn board(&self) -> Result<DispatchBoard, DomainError> {
        let orders = self.repo.orders_with_status(&BOARD_STATUSES)?;
        let total = orders.len();

        let mut grouped: BTreeMap<DeliveryCategory, Vec<BoardEntry>> = DeliveryCategory::ALL
            .iter()
            .map(|&c| (c, Vec::new()))
            .collect();
        for entry in self.entries(orders)? {
            grouped.entry(entry.category).or_default().push(entry);
        }

        Ok(DispatchBoard {
            groups: grouped
                .into_iter()
                .map(|(category, orders)| CategoryGroup { category, orders })
                .collect(),
            total,
        })
    }

    /// Packed local deliveries no messenger holds yet.
    pub fn messenger_pool(&self) -> Result<Vec<BoardEntry>, DomainError> {
        let unclaimed = self
            .repo
            .orders_with_status(&[OrderStatus::ReadyForDelivery])?
            .into_iter()
            .filter(|o| o.messenger_status.is_none())
            .filter(|o| classify_order(o).is_messenger_served())
            .collect();
        self.entries(unclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::messenger_service::MessengerService;
    use crate::application::testing::{order_with_lines, ready_order, repo};

    #[test]
    fn board_lists_every_category_even_when_empty() {
        let service = DispatchService::new(repo());

        let board = service.board().expect("board");

        let categories: Vec<_> = board.groups.iter().map(|g| g.category).collect();
        assert_eq!(categories, DeliveryCategory::ALL.to_vec());
        assert_eq!(board.total, 0);
    }

    #[test]
    fn board_groups_ready_orders_and_annotates_progress() {
        let repo = repo();
        let envia = repo.add_carrier("Envía S.A.S");
        let mut carrier_order = order_with_lines("PED-300", &[("A", 1), ("B", 2)]);
        carrier_order.delivery_method = Some("transportadora".to_string());
        carrier_order.carrier_id = Some(envia);
        let carrier_order = ready_order(&repo, carrier_order);
        let local_order = ready_order(&repo, order_with_lines("PED-301", &[("C", 1)]));
        repo.create_order(order_with_lines("PED-302", &[("D", 1)]))
            .expect("still in intake");
        let service = DispatchService::new(repo.clone());

        let board = service.board().expect("board");

        assert_eq!(board.total, 2);
        let group = |c: DeliveryCategory| {
            board
                .groups
                .iter()
                .find(|g| g.category == c)
                .expect("group present")
        };
        let envia_group = group(DeliveryCategory::Envia);
        assert_eq!(envia_group.orders.len(), 1);
        assert_eq!(envia_group.orders[0].order.id, carrier_order);
        assert_eq!(
            (envia_group.orders[0].verified_lines, envia_group.orders[0].total_lines),
            (2, 2)
        );
        assert_eq!(
            group(DeliveryCategory::MensajeriaLocal).orders[0].order.id,
            local_order
        );
    }

    #[test]
    fn board_shows_the_assigned_messenger() {
        let repo = repo();
        let order_id = ready_order(&repo, order_with_lines("PED-303", &[("A", 1)]));
        let messenger_id = repo.add_messenger("Luisa", true);
        MessengerService::new(repo.clone())
            .assign(order_id, messenger_id)
            .expect("assign");

        let board = DispatchService::new(repo.clone()).board().expect("board");

        let local = board
            .groups
            .iter()
            .find(|g| g.category == DeliveryCategory::MensajeriaLocal)
            .expect("group");
        assert_eq!(local.orders[0].order.messenger_name.as_deref(), Some("Luisa"));
    }

    #[test]
    fn pool_holds_only_unclaimed_local_deliveries() {
        let repo = repo();
        let free = ready_order(&repo, order_with_lines("PED-304", &[("A", 1)]));
        let taken = ready_order(&repo, order_with_lines("PED-305", &[("B", 1)]));
        let mut pickup = order_with_lines("PED-306", &[("C", 1)]);
        pickup.delivery_method = Some("Recoge_Bodega".to_string());
        ready_order(&repo, pickup);
        let messenger_id = repo.add_messenger("Pedro", true);
        MessengerService::new(repo.clone())
            .assign(taken, messenger_id)
            .expect("assign");

        let pool = DispatchService::new(repo.clone())
            .messenger_pool()
            .expect("pool");

        let ids: Vec<Uuid> = pool.iter().map(|e| e.order.id).collect();
        assert_eq!(ids, vec![free]);
    }
}
