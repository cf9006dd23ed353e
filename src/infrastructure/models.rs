use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::messenger::{Messenger, MessengerStatus};
use crate::domain::order::{Order, OrderLine, OrderStatus};
use crate::domain::verification::LineVerification;
use crate::schema::{
    fulfillment_outbox, line_verifications, messengers, order_lines, orders, scan_events,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub status: String,
    pub delivery_method: Option<String>,
    pub carrier_id: Option<Uuid>,
    pub assigned_messenger_id: Option<Uuid>,
    pub messenger_status: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn into_domain(
        self,
        carrier_name: Option<String>,
        messenger_name: Option<String>,
    ) -> Result<Order, DomainError> {
        let status: OrderStatus = self.status.parse().map_err(DomainError::Internal)?;
        let messenger_status = self
            .messenger_status
            .as_deref()
            .map(str::parse::<MessengerStatus>)
            .transpose()
            .map_err(DomainError::Internal)?;

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_name: self.customer_name,
            status,
            delivery_method: self.delivery_method,
            carrier_id: self.carrier_id,
            carrier_name,
            assigned_messenger_id: self.assigned_messenger_id,
            messenger_status,
            messenger_name,
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub status: String,
    pub delivery_method: Option<String>,
    pub carrier_id: Option<Uuid>,
}

/// Messenger-side columns written by a workflow transition. Outer `None`
/// leaves a column untouched, `Some(None)` writes NULL.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct MessengerChangeset {
    pub status: String,
    pub messenger_status: Option<Option<String>>,
    pub assigned_messenger_id: Option<Option<Uuid>>,
    pub failure_reason: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = order_lines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderLineRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_number: i32,
    pub product_code: String,
    pub description: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        OrderLine {
            id: row.id,
            order_id: row.order_id,
            product_code: row.product_code,
            description: row.description,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_lines)]
pub struct NewOrderLineRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_number: i32,
    pub product_code: String,
    pub description: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = line_verifications)]
#[diesel(primary_key(line_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LineVerificationRow {
    pub line_id: Uuid,
    pub order_id: Uuid,
    pub required_scans: i32,
    pub scanned_count: i32,
    pub is_verified: bool,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

impl From<LineVerificationRow> for LineVerification {
    fn from(row: LineVerificationRow) -> Self {
        LineVerification {
            line_id: row.line_id,
            order_id: row.order_id,
            required_scans: row.required_scans,
            scanned_count: row.scanned_count,
            is_verified: row.is_verified,
            notes: row.notes,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = line_verifications)]
pub struct NewLineVerificationRow {
    pub line_id: Uuid,
    pub order_id: Uuid,
    pub required_scans: i32,
    pub scanned_count: i32,
    pub is_verified: bool,
    pub notes: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = scan_events)]
pub struct NewScanEventRow {
    pub id: Uuid,
    pub line_id: Uuid,
    pub code: String,
    pub scan_number: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scan_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScanEventRow {
    pub id: Uuid,
    pub line_id: Uuid,
    pub code: String,
    pub scan_number: i32,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = messengers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessengerRow {
    pub id: Uuid,
    pub display_name: String,
    pub is_active: bool,
}

impl From<MessengerRow> for Messenger {
    fn from(row: MessengerRow) -> Self {
        Messenger {
            id: row.id,
            display_name: row.display_name,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = fulfillment_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = fulfillment_outbox)]
pub struct NewOutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
}
