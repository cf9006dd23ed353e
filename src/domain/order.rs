use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::messenger::MessengerStatus;

/// Overall fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted by intake, waiting for the packing floor.
    Created,
    InPackaging,
    ReadyForDelivery,
    EnRoute,
    Delivered,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InPackaging => "in_packaging",
            Self::ReadyForDelivery => "ready_for_delivery",
            Self::EnRoute => "en_route",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Intake historically wrote `ready_for_packaging` for new orders.
            "created" | "ready_for_packaging" => Ok(Self::Created),
            "in_packaging" => Ok(Self::InPackaging),
            "ready_for_delivery" => Ok(Self::ReadyForDelivery),
            "en_route" => Ok(Self::EnRoute),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub delivery_method: Option<String>,
    pub carrier_id: Option<Uuid>,
    /// Resolved from the carrier directory; `None` when no carrier is set.
    pub carrier_name: Option<String>,
    pub assigned_messenger_id: Option<Uuid>,
    pub messenger_status: Option<MessengerStatus>,
    /// Display name of the assigned messenger, if any.
    pub messenger_name: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Canonical barcode the packer must scan for each unit.
    pub product_code: String,
    pub description: String,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_code: String,
    pub description: String,
    pub quantity: i32,
}

/// Order as handed over by the intake collaborator.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_name: String,
    pub delivery_method: Option<String>,
    pub carrier_id: Option<Uuid>,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), String> {
        if self.order_number.trim().is_empty() {
            return Err("order_number must not be empty".to_string());
        }
        if self.lines.is_empty() {
            return Err("an order needs at least one line".to_string());
        }
        for line in &self.lines {
            if line.product_code.trim().is_empty() {
                return Err("product_code must not be empty".to_string());
            }
            if line.quantity <= 0 {
                return Err(format!(
                    "quantity for '{}' must be positive, got {}",
                    line.product_code, line.quantity
                ));
            }
        }
        Ok(())
    }
}
