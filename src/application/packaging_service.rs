use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::events::{FulfillmentEvent, FulfillmentEventType};
use crate::domain::messenger::MessengerStatus;
use crate::domain::normalize::normalize_barcode;
use crate::domain::order::{Order, OrderLine, OrderStatus};
use crate::domain::ports::{FulfillmentRepository, LineUpdate, PackagingGate, Resync};
use crate::domain::verification::{LineProgress, LineVerification, ScanProgress};

const DRIFT_NOTE: &str = "quantity changed after scanning began; count restarted";

/// What the packing station shows for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagingChecklist {
    pub order: Order,
    pub lines: Vec<LineProgress>,
    pub verified_lines: usize,
    pub total_lines: usize,
    pub can_complete: bool,
}

/// Barcode-verified packing of orders, one unit scan at a time.
pub struct PackagingService<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: FulfillmentRepository + ?Sized> PackagingService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn load_order(&self, order_id: Uuid) -> Result<Order, DomainError> {
        self.repo
            .find_order(order_id)?
            .ok_or_else(|| DomainError::order_not_found(order_id))
    }

    pub fn checklist(&self, order_id: Uuid) -> Result<PackagingChecklist, DomainError> {
        let order = self.load_order(order_id)?;
        let lines = self.repo.line_progress(order_id)?;
        let verified_lines = lines.iter().filter(|l| l.is_verified()).count();
        let total_lines = lines.len();

        Ok(PackagingChecklist {
            can_complete: order.status == OrderStatus::InPackaging
                && total_lines > 0
                && verified_lines == total_lines,
            order,
            lines,
            verified_lines,
            total_lines,
        })
    }

    /// Open the order for scanning and create a counter per line.
    pub fn begin_packaging(&self, order_id: Uuid) -> Result<PackagingChecklist, DomainError> {
        let order = self.load_order(order_id)?;
        if order.status != OrderStatus::Created {
            return Err(DomainError::AlreadyInPackaging {
                status: order.status,
            });
        }
        let lines = self.repo.line_progress(order_id)?;
        if lines.is_empty() {
            return Err(DomainError::InvalidState(format!(
                "order {} has no lines to package",
                order.order_number
            )));
        }

        let event = FulfillmentEvent::new(
            order_id,
            FulfillmentEventType::PackagingStarted,
            json!({ "order_number": order.order_number, "lines": lines.len() }),
        );
        if !self.repo.begin_packaging(order_id, &event)? {
            let status = self
                .repo
                .find_order(order_id)?
                .map_or(OrderStatus::InPackaging, |o| o.status);
            return Err(DomainError::AlreadyInPackaging { status });
        }

        info!(
            "Packaging started for order {} ({} line(s))",
            order.order_number,
            lines.len()
        );
        self.checklist(order_id)
    }

    /// Count one unit of `line_id` if `scanned_code` is that line's product.
    ///
    /// A mismatch changes nothing. A counter whose required total no longer
    /// matches the line quantity is restarted before the scan is counted.
    pub fn record_scan(
        &self,
        order_id: Uuid,
        line_id: Uuid,
        scanned_code: &str,
    ) -> Result<ScanProgress, DomainError> {
        if scanned_code.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "scanned code must not be empty".to_string(),
            ));
        }

        let order = self.load_order(order_id)?;
        if order.status != OrderStatus::InPackaging {
            return Err(DomainError::InvalidState(format!(
                "order {} is {}, scans are only accepted while in_packaging",
                order.order_number, order.status
            )));
        }
        let line = self
            .repo
            .find_line(line_id)?
            .filter(|l| l.order_id == order_id)
            .ok_or_else(|| DomainError::line_not_found(line_id))?;

        let scanned = normalize_barcode(scanned_code);
        if scanned != normalize_barcode(&line.product_code) {
            debug!(
                "Mismatched scan '{}' on line {} (expects {})",
                scanned_code, line_id, line.product_code
            );
            return Err(DomainError::CodeMismatch {
                line_id,
                scanned: scanned_code.to_string(),
            });
        }

        let on_reset = FulfillmentEvent::new(
            order_id,
            FulfillmentEventType::LineReset,
            json!({ "line_id": line_id, "reason": DRIFT_NOTE, "required_scans": line.quantity }),
        );
        if let Resync::Reset(v) = self.repo.resync_verification(line_id, DRIFT_NOTE, &on_reset)? {
            warn!(
                "Line {} counter drifted from quantity; restarted at 0/{}",
                line_id, v.required_scans
            );
        }

        let on_verified = FulfillmentEvent::new(
            order_id,
            FulfillmentEventType::LineVerified,
            json!({
                "line_id": line_id,
                "product_code": line.product_code,
                "required_scans": line.quantity,
            }),
        );
        match self.repo.increment_scan(line_id, &scanned, &on_verified)? {
            Some(v) => {
                if v.is_verified {
                    info!(
                        "Line {} of order {} verified ({} unit(s))",
                        line_id, order.order_number, v.required_scans
                    );
                }
                Ok(v.progress())
            }
            None => Err(DomainError::AlreadyComplete {
                line_id,
                required_scans: line.quantity,
            }),
        }
    }

    /// Close packaging once every line is verified against its quantity.
    pub fn complete_packaging(&self, order_id: Uuid) -> Result<Order, DomainError> {
        let event = FulfillmentEvent::new(
            order_id,
            FulfillmentEventType::PackagingCompleted,
            json!({ "status": OrderStatus::ReadyForDelivery }),
        );

        match self.repo.complete_packaging(order_id, DRIFT_NOTE, &event)? {
            PackagingGate::Completed => {
                let order = self.load_order(order_id)?;
                info!("Order {} packed, ready for delivery", order.order_number);
                Ok(order)
            }
            PackagingGate::Unverified(lines) => {
                warn!(
                    "Order {} cannot leave packaging: {} line(s) unverified",
                    order_id,
                    lines.len()
                );
                Err(DomainError::IncompleteVerification { lines })
            }
            PackagingGate::NotInPackaging(status) => Err(DomainError::InvalidState(format!(
                "order is {status}, only in_packaging orders can complete packaging"
            ))),
        }
    }

    /// Administrative restart of one line's counter.
    pub fn reset_line(
        &self,
        line_id: Uuid,
        reason: Option<&str>,
    ) -> Result<LineVerification, DomainError> {
        let line = self
            .repo
            .find_line(line_id)?
            .ok_or_else(|| DomainError::line_not_found(line_id))?;
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("manual reset");
        let note = format!("reset: {reason}");

        let event = FulfillmentEvent::new(
            line.order_id,
            FulfillmentEventType::LineReset,
            json!({ "line_id": line_id, "reason": reason, "required_scans": line.quantity }),
        );
        match self
            .repo
            .reset_line(line_id, &[OrderStatus::InPackaging], &note, &event)?
        {
            LineUpdate::Applied(Some(v)) => {
                info!("Line {} reset to 0/{} ({})", line_id, v.required_scans, reason);
                Ok(v)
            }
            LineUpdate::Applied(None) => Err(DomainError::Internal(format!(
                "reset of line {line_id} produced no counter"
            ))),
            LineUpdate::Refused(status) => Err(DomainError::InvalidState(format!(
                "order is {status}, lines can only be reset while in_packaging"
            ))),
        }
    }

    /// Correct a line's quantity. Any scans already counted are discarded.
    pub fn change_line_quantity(
        &self,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<LineProgress, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidInput(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        let line = self
            .repo
            .find_line(line_id)?
            .ok_or_else(|| DomainError::line_not_found(line_id))?;

        let note = format!("quantity changed {} -> {}", line.quantity, quantity);
        let event = FulfillmentEvent::new(
            line.order_id,
            FulfillmentEventType::LineQuantityChanged,
            json!({
                "line_id": line_id,
                "previous_quantity": line.quantity,
                "quantity": quantity,
            }),
        );
        match self.repo.change_line_quantity(
            line_id,
            quantity,
            &[OrderStatus::Created, OrderStatus::InPackaging],
            &note,
            &event,
        )? {
            LineUpdate::Applied(verification) => {
                info!("Line {} {}", line_id, note);
                Ok(LineProgress {
                    line: OrderLine { quantity, ..line },
                    verification,
                })
            }
            LineUpdate::Refused(status) => Err(DomainError::InvalidState(format!(
                "order is {status}, quantities can only change before packaging completes"
            ))),
        }
    }

    /// Send a packed order back to the packing floor before a messenger has
    /// accepted it. Every line has to be scanned again.
    pub fn return_to_packaging(
        &self,
        order_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Order, DomainError> {
        let order = self.load_order(order_id)?;
        let messenger_settled = matches!(
            order.messenger_status,
            None | Some(MessengerStatus::Assigned)
        );
        if order.status != OrderStatus::ReadyForDelivery || !messenger_settled {
            return Err(DomainError::InvalidState(format!(
                "order {} is {} with messenger state {}, it can no longer return to packaging",
                order.order_number,
                order.status,
                MessengerStatus::describe(&order.messenger_status)
            )));
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("returned by dispatch");
        let event = FulfillmentEvent::new(
            order_id,
            FulfillmentEventType::ReturnedToPackaging,
            json!({ "reason": reason, "released_messenger_id": order.assigned_messenger_id }),
        );
        let note = format!("returned to packaging: {reason}");
        if !self
            .repo
            .return_to_packaging(
                order_id,
                order.messenger_status,
                order.assigned_messenger_id,
                &note,
                &event,
            )?
        {
            return Err(DomainError::AlreadyHandled { order_id });
        }

        info!("Order {} returned to packaging ({})", order.order_number, reason);
        self.load_order(order_id)
    }
}
