use uuid::Uuid;

use super::errors::DomainError;
use super::events::FulfillmentEvent;
use super::messenger::{Messenger, MessengerStatus};
use super::order::{NewOrder, Order, OrderLine, OrderStatus};
use super::verification::{LineProgress, LineVerification, UnverifiedLine, VerificationSummary};

/// A compare-and-set on the messenger fields of one order.
///
/// Applied only if the stored order status, messenger status and messenger
/// all still equal the `expected_*` values; otherwise nothing is written.
#[derive(Debug, Clone)]
pub struct MessengerTransition {
    pub order_id: Uuid,
    pub expected_order_status: OrderStatus,
    pub expected_status: Option<MessengerStatus>,
    pub expected_messenger: Option<Uuid>,
    pub order_status: OrderStatus,
    pub messenger_status: Option<MessengerStatus>,
    pub messenger_id: Option<Uuid>,
    /// Written only when `Some`.
    pub failure_reason: Option<String>,
    pub event: FulfillmentEvent,
}

/// Outcome of ensuring a line's counter matches its quantity.
#[derive(Debug, Clone, PartialEq)]
pub enum Resync {
    Unchanged,
    Created,
    /// Counter had drifted from the quantity and was restarted.
    Reset(LineVerification),
}

/// Outcome of a line mutation guarded by the owning order's status.
#[derive(Debug, Clone, PartialEq)]
pub enum LineUpdate {
    Applied(Option<LineVerification>),
    /// The order was in this status, which the caller did not allow.
    Refused(OrderStatus),
}

/// Outcome of the packaging completion gate.
#[derive(Debug, Clone, PartialEq)]
pub enum PackagingGate {
    Completed,
    Unverified(Vec<UnverifiedLine>),
    NotInPackaging(OrderStatus),
}

/// Storage for orders, lines and their fulfillment bookkeeping.
///
/// Every mutating method is atomic: it either commits in full, together with
/// its outbox event, or leaves storage untouched.
pub trait FulfillmentRepository: Send + Sync + 'static {
    fn create_order(&self, order: NewOrder) -> Result<Uuid, DomainError>;
    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn find_line(&self, line_id: Uuid) -> Result<Option<OrderLine>, DomainError>;
    fn line_progress(&self, order_id: Uuid) -> Result<Vec<LineProgress>, DomainError>;
    /// Oldest first.
    fn orders_with_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, DomainError>;
    /// Orders whose messenger is `messenger_id` and still active, oldest first.
    fn orders_assigned_to(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError>;
    fn verification_summaries(
        &self,
        order_ids: &[Uuid],
    ) -> Result<Vec<VerificationSummary>, DomainError>;

    /// Move `created` → `in_packaging` and create a counter for every line
    /// lacking one. `false` if the order was no longer `created`.
    fn begin_packaging(&self, order_id: Uuid, event: &FulfillmentEvent)
        -> Result<bool, DomainError>;

    /// Make sure the line has a counter whose `required_scans` equals the
    /// current quantity. A drifted counter is restarted with `note` and
    /// `on_reset` is published.
    fn resync_verification(
        &self,
        line_id: Uuid,
        note: &str,
        on_reset: &FulfillmentEvent,
    ) -> Result<Resync, DomainError>;

    /// Count one unit if the line still needs one; `None` when it is already
    /// complete. The scan is logged under `code`, and `on_verified` is
    /// published by the increment that completes the line.
    fn increment_scan(
        &self,
        line_id: Uuid,
        code: &str,
        on_verified: &FulfillmentEvent,
    ) -> Result<Option<LineVerification>, DomainError>;

    /// Restart the line's counter from its current quantity.
    fn reset_line(
        &self,
        line_id: Uuid,
        allowed: &[OrderStatus],
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<LineUpdate, DomainError>;

    /// Change the quantity and, if a counter exists, restart it.
    fn change_line_quantity(
        &self,
        line_id: Uuid,
        quantity: i32,
        allowed: &[OrderStatus],
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<LineUpdate, DomainError>;

    /// Move `in_packaging` → `ready_for_delivery` if, under lock, every line
    /// is verified against its current quantity.
    fn complete_packaging(
        &self,
        order_id: Uuid,
        drift_note: &str,
        event: &FulfillmentEvent,
    ) -> Result<PackagingGate, DomainError>;

    /// Move `ready_for_delivery` → `in_packaging`, dropping the messenger and
    /// restarting every counter. `false` if the order, its messenger status or
    /// its messenger changed since it was read.
    fn return_to_packaging(
        &self,
        order_id: Uuid,
        expected_status: Option<MessengerStatus>,
        expected_messenger: Option<Uuid>,
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<bool, DomainError>;

    /// Orders the messenger finished, delivered or failed, newest first.
    fn delivery_history(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError>;

    fn find_messenger(&self, id: Uuid) -> Result<Option<Messenger>, DomainError>;

    /// `false` if the expected state no longer holds.
    fn apply_messenger_transition(&self, t: &MessengerTransition) -> Result<bool, DomainError>;
}
