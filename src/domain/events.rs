use std::fmt;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Outbox `aggregate_type` for every fulfillment event; CDC routes on it.
pub const AGGREGATE_TYPE: &str = "Order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FulfillmentEventType {
    PackagingStarted,
    LineVerified,
    LineReset,
    LineQuantityChanged,
    PackagingCompleted,
    ReturnedToPackaging,
    MessengerAssigned,
    DeliveryAccepted,
    DeliveryRejected,
    DeliveryStarted,
    DeliveryCompleted,
    DeliveryFailed,
}

impl fmt::Display for FulfillmentEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A state change to publish, written in the same transaction as the change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FulfillmentEvent {
    pub order_id: Uuid,
    pub event_type: FulfillmentEventType,
    pub payload: Value,
}

impl FulfillmentEvent {
    /// Build an event; `order_id` and `event` are merged into `payload` so
    /// consumers never need the envelope.
    pub fn new(order_id: Uuid, event_type: FulfillmentEventType, payload: Value) -> Self {
        let mut payload = match payload {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(Default::default()),
            other => serde_json::json!({ "data": other }),
        };
        if let Value::Object(map) = &mut payload {
            map.insert("order_id".to_string(), Value::String(order_id.to_string()));
            map.insert("event".to_string(), Value::String(event_type.to_string()));
        }
        Self {
            order_id,
            event_type,
            payload,
        }
    }
}
