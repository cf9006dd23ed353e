use std::sync::Arc;

use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::domain::classifier::classify_order;
use crate::domain::errors::DomainError;
use crate::domain::events::{FulfillmentEvent, FulfillmentEventType};
use crate::domain::messenger::{next_status, MessengerAction, MessengerStatus};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::{FulfillmentRepository, MessengerTransition};

/// Last-mile delivery: hands packed local orders to exactly one messenger
/// and walks them to a terminal state.
pub struct MessengerService<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: FulfillmentRepository + ?Sized> MessengerService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn load_order(&self, order_id: Uuid) -> Result<Order, DomainError> {
        self.repo
            .find_order(order_id)?
            .ok_or_else(|| DomainError::order_not_found(order_id))
    }

    fn commit(&self, transition: MessengerTransition) -> Result<Order, DomainError> {
        if !self.repo.apply_messenger_transition(&transition)? {
            warn!(
                "Lost race on order {} ({})",
                transition.order_id, transition.event.event_type
            );
            return Err(DomainError::AlreadyHandled {
                order_id: transition.order_id,
            });
        }
        self.load_order(transition.order_id)
    }

    pub fn assign(&self, order_id: Uuid, messenger_id: Uuid) -> Result<Order, DomainError> {
        let order = self.load_order(order_id)?;
        if order.status != OrderStatus::ReadyForDelivery {
            return Err(DomainError::InvalidState(format!(
                "order {} is {}, only ready_for_delivery orders can be assigned",
                order.order_number, order.status
            )));
        }
        if order.messenger_status.is_some() {
            return Err(DomainError::InvalidState(format!(
                "order {} is already {}",
                order.order_number,
                MessengerStatus::describe(&order.messenger_status)
            )));
        }
        let category = classify_order(&order);
        if !category.is_messenger_served() {
            return Err(DomainError::InvalidState(format!(
                "order {} ships via {}, not local messenger",
                order.order_number, category
            )));
        }

        let messenger = self
            .repo
            .find_messenger(messenger_id)?
            .ok_or_else(|| DomainError::NotFound(format!("Messenger {messenger_id}")))?;
        if !messenger.is_active {
            return Err(DomainError::MessengerInactive(messenger_id));
        }

        let next = next_status(None, MessengerAction::Assign)?;
        let order = self.commit(MessengerTransition {
            order_id,
            expected_order_status: OrderStatus::ReadyForDelivery,
            expected_status: None,
            expected_messenger: None,
            order_status: OrderStatus::ReadyForDelivery,
            messenger_status: next,
            messenger_id: Some(messenger_id),
            failure_reason: None,
            event: FulfillmentEvent::new(
                order_id,
                FulfillmentEventType::MessengerAssigned,
                json!({ "messenger_id": messenger_id, "messenger_name": messenger.display_name }),
            ),
        })?;

        info!(
            "Order {} assigned to messenger {}",
            order.order_number, messenger.display_name
        );
        Ok(order)
    }

    pub fn accept(&self, order_id: Uuid, messenger_id: Uuid) -> Result<Order, DomainError> {
        self.advance(order_id, messenger_id, MessengerAction::Accept, None)
    }

    pub fn reject(
        &self,
        order_id: Uuid,
        messenger_id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, DomainError> {
        self.advance(order_id, messenger_id, MessengerAction::Reject, reason)
    }

    pub fn start_delivery(&self, order_id: Uuid, messenger_id: Uuid) -> Result<Order, DomainError> {
        self.advance(order_id, messenger_id, MessengerAction::StartDelivery, None)
    }

    pub fn complete_delivery(
        &self,
        order_id: Uuid,
        messenger_id: Uuid,
    ) -> Result<Order, DomainError> {
        self.advance(order_id, messenger_id, MessengerAction::CompleteDelivery, None)
    }

    pub fn fail_delivery(
        &self,
        order_id: Uuid,
        messenger_id: Uuid,
        reason: &str,
    ) -> Result<Order, DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::InvalidInput(
                "a failed delivery needs a reason".to_string(),
            ));
        }
        self.advance(
            order_id,
            messenger_id,
            MessengerAction::FailDelivery,
            Some(reason.to_string()),
        )
    }

    /// Orders the messenger still has to act on, oldest first.
    pub fn list_orders(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError> {
        self.repo
            .find_messenger(messenger_id)?
            .ok_or_else(|| DomainError::NotFound(format!("Messenger {messenger_id}")))?;
        self.repo.orders_assigned_to(messenger_id)
    }

    /// Deliveries the messenger finished, completed or failed, newest first.
    pub fn delivery_history(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError> {
        self.repo
            .find_messenger(messenger_id)?
            .ok_or_else(|| DomainError::NotFound(format!("Messenger {messenger_id}")))?;
        self.repo.delivery_history(messenger_id)
    }

    /// One step of the messenger-driven part of the table. `reason` is
    /// stored only for failures and travels in the event otherwise.
    fn advance(
        &self,
        order_id: Uuid,
        messenger_id: Uuid,
        action: MessengerAction,
        reason: Option<String>,
    ) -> Result<Order, DomainError> {
        let order = self.load_order(order_id)?;

        // A second accept on a taken order is a lost race, not a bad request.
        if action == MessengerAction::Accept
            && order.messenger_status == Some(MessengerStatus::Accepted)
        {
            return Err(DomainError::AlreadyHandled { order_id });
        }
        let next = next_status(order.messenger_status, action)?;
        if order.assigned_messenger_id != Some(messenger_id) {
            return Err(DomainError::NotAssignedMessenger {
                order_id,
                messenger_id,
            });
        }

        let (order_status, event_type) = match action {
            MessengerAction::Assign => (order.status, FulfillmentEventType::MessengerAssigned),
            MessengerAction::Accept => (order.status, FulfillmentEventType::DeliveryAccepted),
            MessengerAction::Reject => (order.status, FulfillmentEventType::DeliveryRejected),
            MessengerAction::StartDelivery => {
                (OrderStatus::EnRoute, FulfillmentEventType::DeliveryStarted)
            }
            MessengerAction::CompleteDelivery => {
                (OrderStatus::Delivered, FulfillmentEventType::DeliveryCompleted)
            }
            MessengerAction::FailDelivery => {
                (OrderStatus::Failed, FulfillmentEventType::DeliveryFailed)
            }
        };

        let updated = self.commit(MessengerTransition {
            order_id,
            expected_order_status: order.status,
            expected_status: order.messenger_status,
            expected_messenger: order.assigned_messenger_id,
            order_status,
            messenger_status: next,
            messenger_id: next.map(|_| messenger_id),
            failure_reason: reason
                .clone()
                .filter(|_| action == MessengerAction::FailDelivery),
            event: FulfillmentEvent::new(
                order_id,
                event_type,
                json!({
                    "messenger_id": messenger_id,
                    "messenger_status": next,
                    "status": order_status,
                    "reason": reason,
                }),
            ),
        })?;

        info!(
            "Order {}: messenger {} did {} ({} -> {})",
            updated.order_number,
            messenger_id,
            action,
            MessengerStatus::describe(&order.messenger_status),
            MessengerStatus::describe(&updated.messenger_status)
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::application::testing::{assigned_order, order_with_lines, ready_order, repo};

    #[test]
    fn full_delivery_reaches_delivered() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());

        let accepted = service.accept(order_id, messenger_id).expect("accept");
        assert_eq!(accepted.messenger_status, Some(MessengerStatus::Accepted));

        let started = service
            .start_delivery(order_id, messenger_id)
            .expect("start");
        assert_eq!(started.status, OrderStatus::EnRoute);
        assert_eq!(started.messenger_status, Some(MessengerStatus::InDelivery));

        let done = service
            .complete_delivery(order_id, messenger_id)
            .expect("complete");
        assert_eq!(done.status, OrderStatus::Delivered);
        assert_eq!(done.messenger_status, Some(MessengerStatus::Completed));
        assert_eq!(done.assigned_messenger_id, Some(messenger_id));
    }

    #[test]
    fn failed_delivery_records_the_reason_and_is_terminal() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());
        service.accept(order_id, messenger_id).expect("accept");
        service
            .start_delivery(order_id, messenger_id)
            .expect("start");

        assert!(matches!(
            service.fail_delivery(order_id, messenger_id, "  "),
            Err(DomainError::InvalidInput(_))
        ));
        let failed = service
            .fail_delivery(order_id, messenger_id, "customer absent")
            .expect("fail");

        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("customer absent"));
        let err = service
            .complete_delivery(order_id, messenger_id)
            .expect_err("terminal");
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn rejection_returns_the_order_to_the_pool() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());

        let order = service
            .reject(order_id, messenger_id, Some("too far".to_string()))
            .expect("reject");

        assert_eq!(order.assigned_messenger_id, None);
        assert_eq!(order.messenger_status, None);
        assert_eq!(order.status, OrderStatus::ReadyForDelivery);
        let other = repo.add_messenger("Marta", true);
        service.assign(order_id, other).expect("reassign");
        let last = repo.events().last().cloned().expect("event");
        assert_eq!(last.event_type, FulfillmentEventType::MessengerAssigned);
    }

    #[test]
    fn completing_from_assigned_is_an_invalid_transition() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());

        let err = service
            .complete_delivery(order_id, messenger_id)
            .expect_err("skipped steps");

        let DomainError::InvalidTransition { current, requested } = err else {
            panic!("expected InvalidTransition, got {err:?}");
        };
        assert_eq!(current, Some(MessengerStatus::Assigned));
        assert_eq!(requested, MessengerAction::CompleteDelivery);
        let order = repo.find_order(order_id).expect("find").expect("order");
        assert_eq!(order.messenger_status, Some(MessengerStatus::Assigned));
    }

    #[test]
    fn only_the_assigned_messenger_may_act() {
        let repo = repo();
        let (order_id, _) = assigned_order(&repo);
        let intruder = repo.add_messenger("Intruso", true);
        let service = MessengerService::new(repo.clone());

        let err = service.accept(order_id, intruder).expect_err("not theirs");

        assert!(matches!(err, DomainError::NotAssignedMessenger { .. }));
    }

    #[test]
    fn second_accept_is_already_taken() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());
        service.accept(order_id, messenger_id).expect("accept");

        let err = service.accept(order_id, messenger_id).expect_err("duplicate");

        assert!(matches!(err, DomainError::AlreadyHandled { .. }));
    }

    #[test]
    fn assign_checks_order_category_and_messenger() {
        let repo = repo();
        let service = MessengerService::new(repo.clone());
        let active = repo.add_messenger("Ana", true);
        let inactive = repo.add_messenger("Beto", false);

        let unpacked = repo
            .create_order(order_with_lines("PED-400", &[("A", 1)]))
            .expect("create");
        assert!(matches!(
            service.assign(unpacked, active),
            Err(DomainError::InvalidState(_))
        ));

        let mut pickup = order_with_lines("PED-401", &[("A", 1)]);
        pickup.delivery_method = Some("recogida_tienda".to_string());
        let pickup = ready_order(&repo, pickup);
        assert!(matches!(
            service.assign(pickup, active),
            Err(DomainError::InvalidState(_))
        ));

        let local = ready_order(&repo, order_with_lines("PED-402", &[("A", 1)]));
        assert!(matches!(
            service.assign(local, inactive),
            Err(DomainError::MessengerInactive(id)) if id == inactive
        ));
        assert!(matches!(
            service.assign(local, Uuid::new_v4()),
            Err(DomainError::NotFound(_))
        ));

        service.assign(local, active).expect("assign");
        assert!(matches!(
            service.assign(local, active),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn list_orders_shows_only_active_work() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());

        assert_eq!(service.list_orders(messenger_id).expect("list").len(), 1);
        service.accept(order_id, messenger_id).expect("accept");
        service
            .start_delivery(order_id, messenger_id)
            .expect("start");
        assert_eq!(service.list_orders(messenger_id).expect("list").len(), 1);
        service
            .complete_delivery(order_id, messenger_id)
            .expect("complete");
        assert!(service.list_orders(messenger_id).expect("list").is_empty());

        assert!(matches!(
            service.list_orders(Uuid::new_v4()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn delivery_history_keeps_finished_orders_newest_first() {
        let repo = repo();
        let (delivered, messenger_id) = assigned_order(&repo);
        let service = MessengerService::new(repo.clone());
        service.accept(delivered, messenger_id).expect("accept");
        service.start_delivery(delivered, messenger_id).expect("start");
        service
            .complete_delivery(delivered, messenger_id)
            .expect("complete");

        let failed = ready_order(&repo, order_with_lines("PED-HIST-1", &[("7702", 1)]));
        let active = ready_order(&repo, order_with_lines("PED-HIST-2", &[("7703", 1)]));
        for order_id in [failed, active] {
            service.assign(order_id, messenger_id).expect("assign");
            service.accept(order_id, messenger_id).expect("accept");
        }
        service.start_delivery(failed, messenger_id).expect("start");
        service
            .fail_delivery(failed, messenger_id, "Dirección errada")
            .expect("fail");

        let history: Vec<Uuid> = service
            .delivery_history(messenger_id)
            .expect("history")
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(history, vec![failed, delivered]);

        let other = repo.add_messenger("Diana", true);
        assert!(service.delivery_history(other).expect("history").is_empty());
        assert!(matches!(
            service.delivery_history(Uuid::new_v4()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_accepts_have_exactly_one_winner() {
        let repo = repo();
        let (order_id, messenger_id) = assigned_order(&repo);
        let service = Arc::new(MessengerService::new(repo.clone()));
        let barrier = Arc::new(Barrier::new(10));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    service.accept(order_id, messenger_id)
                })
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(DomainError::AlreadyHandled { .. })))
                .count(),
            9
        );
        let accepted = repo
            .events()
            .iter()
            .filter(|e| e.event_type == FulfillmentEventType::DeliveryAccepted)
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn concurrent_assigns_to_different_messengers_have_one_owner() {
        let repo = repo();
        let order_id = ready_order(&repo, order_with_lines("PED-403", &[("A", 1)]));
        let messengers: Vec<Uuid> = (0..6)
            .map(|i| repo.add_messenger(&format!("M{i}"), true))
            .collect();
        let service = Arc::new(MessengerService::new(repo.clone()));
        let barrier = Arc::new(Barrier::new(messengers.len()));

        let handles: Vec<_> = messengers
            .iter()
            .map(|&m| {
                let service = service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    service.assign(order_id, m).map(|o| o.assigned_messenger_id)
                })
            })
            .collect();
        let winners: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().expect("thread panicked").ok())
            .collect();

        assert_eq!(winners.len(), 1);
        let order = repo.find_order(order_id).expect("find").expect("order");
        assert_eq!(order.assigned_messenger_id, winners[0]);
    }
}
