//! Process-local implementation of [`FulfillmentRepository`].
//!
//! Every operation runs under a single mutex, which gives it the same
//! all-or-nothing, compare-and-set behaviour the Postgres repository gets
//! from row locks and conditional updates. Used by the test suites and for
//! running the HTTP surface without a database.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::events::FulfillmentEvent;
use crate::domain::messenger::{Messenger, MessengerStatus};
use crate::domain::order::{NewOrder, Order, OrderLine, OrderStatus};
use crate::domain::ports::{
    FulfillmentRepository, LineUpdate, MessengerTransition, PackagingGate, Resync,
};
use crate::domain::verification::{
    unverified_lines, LineProgress, LineVerification, VerificationSummary,
};

/// One accepted scan, as kept in the scan log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub line_id: Uuid,
    pub code: String,
    pub scan_number: i32,
}

#[derive(Debug, Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    /// Insertion order, standing in for `created_at` ordering.
    order_seq: Vec<Uuid>,
    lines: HashMap<Uuid, OrderLine>,
    lines_by_order: HashMap<Uuid, Vec<Uuid>>,
    verifications: HashMap<Uuid, LineVerification>,
    carriers: HashMap<Uuid, String>,
    messengers: HashMap<Uuid, Messenger>,
    scans: Vec<ScanRecord>,
    events: Vec<FulfillmentEvent>,
}

impl State {
    fn order(&self, id: Uuid) -> Result<&Order, DomainError> {
        self.orders
            .get(&id)
            .ok_or_else(|| DomainError::order_not_found(id))
    }

    fn line(&self, id: Uuid) -> Result<&OrderLine, DomainError> {
        self.lines.get(&id).ok_or_else(|| DomainError::line_not_found(id))
    }

    fn hydrate(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.carrier_name = order
            .carrier_id
            .and_then(|id| self.carriers.get(&id).cloned());
        order.messenger_name = order
            .assigned_messenger_id
            .and_then(|id| self.messengers.get(&id).map(|m| m.display_name.clone()));
        order
    }

    fn line_ids(&self, order_id: Uuid) -> Vec<Uuid> {
        self.lines_by_order.get(&order_id).cloned().unwrap_or_default()
    }

    fn progress(&self, order_id: Uuid) -> Vec<LineProgress> {
        self.line_ids(order_id)
            .into_iter()
            .filter_map(|id| self.lines.get(&id))
            .map(|line| LineProgress {
                line: line.clone(),
                verification: self.verifications.get(&line.id).cloned(),
            })
            .collect()
    }

    fn touch(&mut self, order_id: Uuid) {
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.updated_at = Utc::now();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFulfillmentRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryFulfillmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a carrier the way the carrier-management service would.
    pub fn add_carrier(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().carriers.insert(id, name.to_string());
        id
    }

    /// Register a messenger the way the identity service would.
    pub fn add_messenger(&self, display_name: &str, is_active: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().messengers.insert(
            id,
            Messenger {
                id,
                display_name: display_name.to_string(),
                is_active,
            },
        );
        id
    }

    pub fn set_messenger_active(&self, id: Uuid, is_active: bool) {
        if let Some(m) = self.state.lock().messengers.get_mut(&id) {
            m.is_active = is_active;
        }
    }

    /// Rewrite a line's quantity behind fulfillment's back, as an external
    /// edit to the order would.
    pub fn overwrite_quantity(&self, line_id: Uuid, quantity: i32) {
        if let Some(line) = self.state.lock().lines.get_mut(&line_id) {
            line.quantity = quantity;
        }
    }

    /// Published events, oldest first.
    pub fn events(&self) -> Vec<FulfillmentEvent> {
        self.state.lock().events.clone()
    }

    pub fn scan_log(&self, line_id: Uuid) -> Vec<ScanRecord> {
        self.state
            .lock()
            .scans
            .iter()
            .filter(|s| s.line_id == line_id)
            .cloned()
            .collect()
    }
}

impl FulfillmentRepository for InMemoryFulfillmentRepository {
    fn create_order(&self, new_order: NewOrder) -> Result<Uuid, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state
            .orders
            .values()
            .any(|o| o.order_number == new_order.order_number)
        {
            return Err(DomainError::InvalidInput(format!(
                "order number {} already exists",
                new_order.order_number
            )));
        }
        if let Some(carrier_id) = new_order.carrier_id {
            if !state.carriers.contains_key(&carrier_id) {
                return Err(DomainError::InvalidInput(
                    "carrier_id does not exist".to_string(),
                ));
            }
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        state.orders.insert(
            order_id,
            Order {
                id: order_id,
                order_number: new_order.order_number,
                customer_name: new_order.customer_name,
                status: OrderStatus::Created,
                delivery_method: new_order.delivery_method,
                carrier_id: new_order.carrier_id,
                carrier_name: None,
                assigned_messenger_id: None,
                messenger_status: None,
                messenger_name: None,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            },
        );
        state.order_seq.push(order_id);

        let mut line_ids = Vec::with_capacity(new_order.lines.len());
        for l in new_order.lines {
            let line = OrderLine {
                id: Uuid::new_v4(),
                order_id,
                product_code: l.product_code,
                description: l.description,
                quantity: l.quantity,
            };
            line_ids.push(line.id);
            state.lines.insert(line.id, line);
        }
        state.lines_by_order.insert(order_id, line_ids);

        Ok(order_id)
    }

    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let state = self.state.lock();
        Ok(state.orders.get(&id).map(|o| state.hydrate(o)))
    }

    fn find_line(&self, line_id: Uuid) -> Result<Option<OrderLine>, DomainError> {
        Ok(self.state.lock().lines.get(&line_id).cloned())
    }

    fn line_progress(&self, order_id: Uuid) -> Result<Vec<LineProgress>, DomainError> {
        Ok(self.state.lock().progress(order_id))
    }

    fn orders_with_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, DomainError> {
        let state = self.state.lock();
        Ok(state
            .order_seq
            .iter()
            .filter_map(|id| state.orders.get(id))
            .filter(|o| statuses.contains(&o.status))
            .map(|o| state.hydrate(o))
            .collect())
    }

    fn orders_assigned_to(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError> {
        let state = self.state.lock();
        Ok(state
            .order_seq
            .iter()
            .filter_map(|id| state.orders.get(id))
            .filter(|o| o.assigned_messenger_id == Some(messenger_id))
            .filter(|o| o.messenger_status.is_some_and(|s| s.is_active()))
            .map(|o| state.hydrate(o))
            .collect())
    }

    fn verification_summaries(
        &self,
        order_ids: &[Uuid],
    ) -> Result<Vec<VerificationSummary>, DomainError> {
        let state = self.state.lock();
        Ok(order_ids
            .iter()
            .map(|&order_id| {
                let progress = state.progress(order_id);
                VerificationSummary {
                    order_id,
                    total_lines: progress.len() as i64,
                    verified_lines: progress.iter().filter(|p| p.is_verified()).count() as i64,
                }
            })
            .collect())
    }

    fn begin_packaging(
        &self,
        order_id: Uuid,
        event: &FulfillmentEvent,
    ) -> Result<bool, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.order(order_id)?.status != OrderStatus::Created {
            return Ok(false);
        }

        for line_id in state.line_ids(order_id) {
            let line = state.line(line_id)?.clone();
            state
                .verifications
                .entry(line_id)
                .or_insert_with(|| LineVerification::for_line(&line));
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::InPackaging;
        }
        state.touch(order_id);
        state.events.push(event.clone());
        Ok(true)
    }

    fn resync_verification(
        &self,
        line_id: Uuid,
        note: &str,
        on_reset: &FulfillmentEvent,
    ) -> Result<Resync, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let line = state.line(line_id)?.clone();

        match state.verifications.get_mut(&line_id) {
            None => {
                state
                    .verifications
                    .insert(line_id, LineVerification::for_line(&line));
                Ok(Resync::Created)
            }
            Some(v) if v.required_scans != line.quantity => {
                v.reset(line.quantity, note);
                let reset = v.clone();
                state.events.push(on_reset.clone());
                Ok(Resync::Reset(reset))
            }
            Some(_) => Ok(Resync::Unchanged),
        }
    }

    fn increment_scan(
        &self,
        line_id: Uuid,
        code: &str,
        on_verified: &FulfillmentEvent,
    ) -> Result<Option<LineVerification>, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let v = state
            .verifications
            .get_mut(&line_id)
            .ok_or_else(|| DomainError::NotFound(format!("Verification for line {line_id}")))?;
        if !v.try_increment() {
            return Ok(None);
        }

        state.scans.push(ScanRecord {
            line_id,
            code: code.to_string(),
            scan_number: v.scanned_count,
        });
        if v.is_verified {
            state.events.push(on_verified.clone());
        }
        Ok(Some(v.clone()))
    }

    fn reset_line(
        &self,
        line_id: Uuid,
        allowed: &[OrderStatus],
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<LineUpdate, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let line = state.line(line_id)?.clone();
        let status = state.order(line.order_id)?.status;
        if !allowed.contains(&status) {
            return Ok(LineUpdate::Refused(status));
        }

        let v = state
            .verifications
            .entry(line_id)
            .or_insert_with(|| LineVerification::for_line(&line));
        v.reset(line.quantity, note);
        let reset = v.clone();
        state.touch(line.order_id);
        state.events.push(event.clone());
        Ok(LineUpdate::Applied(Some(reset)))
    }

    fn change_line_quantity(
        &self,
        line_id: Uuid,
        quantity: i32,
        allowed: &[OrderStatus],
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<LineUpdate, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let order_id = state.line(line_id)?.order_id;
        let status = state.order(order_id)?.status;
        if !allowed.contains(&status) {
            return Ok(LineUpdate::Refused(status));
        }

        if let Some(line) = state.lines.get_mut(&line_id) {
            line.quantity = quantity;
        }
        let reset = state.verifications.get_mut(&line_id).map(|v| {
            v.reset(quantity, note);
            v.clone()
        });
        state.touch(order_id);
        state.events.push(event.clone());
        Ok(LineUpdate::Applied(reset))
    }

    fn complete_packaging(
        &self,
        order_id: Uuid,
        drift_note: &str,
        event: &FulfillmentEvent,
    ) -> Result<PackagingGate, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let status = state.order(order_id)?.status;
        if status != OrderStatus::InPackaging {
            return Ok(PackagingGate::NotInPackaging(status));
        }

        for progress in state.progress(order_id) {
            if progress.is_drifted() {
                if let Some(v) = state.verifications.get_mut(&progress.line.id) {
                    v.reset(progress.line.quantity, drift_note);
                }
            }
        }

        let pending = unverified_lines(&state.progress(order_id));
        if !pending.is_empty() {
            return Ok(PackagingGate::Unverified(pending));
        }

        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::ReadyForDelivery;
        }
        state.touch(order_id);
        state.events.push(event.clone());
        Ok(PackagingGate::Completed)
    }

    fn return_to_packaging(
        &self,
        order_id: Uuid,
        expected_status: Option<MessengerStatus>,
        expected_messenger: Option<Uuid>,
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<bool, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let order = state.order(order_id)?;
        if order.status != OrderStatus::ReadyForDelivery
            || order.messenger_status != expected_status
            || order.assigned_messenger_id != expected_messenger
        {
            return Ok(false);
        }

        for line_id in state.line_ids(order_id) {
            let line = state.line(line_id)?.clone();
            state
                .verifications
                .entry(line_id)
                .or_insert_with(|| LineVerification::for_line(&line))
                .reset(line.quantity, note);
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::InPackaging;
            order.assigned_messenger_id = None;
            order.messenger_status = None;
        }
        state.touch(order_id);
        state.events.push(event.clone());
        Ok(true)
    }

    fn delivery_history(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError> {
        let state = self.state.lock();
        let mut history: Vec<Order> = state
            .order_seq
            .iter()
            .filter_map(|id| state.orders.get(id))
            .filter(|o| o.assigned_messenger_id == Some(messenger_id))
            .filter(|o| o.messenger_status.is_some_and(|s| s.is_terminal()))
            .map(|o| state.hydrate(o))
            .collect();
        // Newest first; insertion order breaks ties within one timestamp.
        history.reverse();
        history.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(history)
    }

    fn find_messenger(&self, id: Uuid) -> Result<Option<Messenger>, DomainError> {
        Ok(self.state.lock().messengers.get(&id).cloned())
    }

    fn apply_messenger_transition(&self, t: &MessengerTransition) -> Result<bool, DomainError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let order = state
            .orders
            .get_mut(&t.order_id)
            .ok_or_else(|| DomainError::order_not_found(t.order_id))?;
        if order.status != t.expected_order_status
            || order.messenger_status != t.expected_status
            || order.assigned_messenger_id != t.expected_messenger
        {
            return Ok(false);
        }

        order.status = t.order_status;
        order.messenger_status = t.messenger_status;
        order.assigned_messenger_id = t.messenger_id;
        if let Some(reason) = &t.failure_reason {
            order.failure_reason = Some(reason.clone());
        }
        order.updated_at = Utc::now();
        state.events.push(t.event.clone());
        Ok(true)
    }
}
