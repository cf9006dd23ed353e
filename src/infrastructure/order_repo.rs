use std::collections::HashMap;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::events::{FulfillmentEvent, AGGREGATE_TYPE};
use crate::domain::messenger::{Messenger, MessengerStatus};
use crate::domain::order::{NewOrder, Order, OrderLine, OrderStatus};
use crate::domain::ports::{
    FulfillmentRepository, LineUpdate, MessengerTransition, PackagingGate, Resync,
};
use crate::domain::verification::{
    append_note, unverified_lines, LineProgress, LineVerification, VerificationSummary,
};
use crate::schema::{
    carriers, fulfillment_outbox, line_verifications, messengers, order_lines, orders,
    scan_events,
};

use super::models::{
    LineVerificationRow, MessengerChangeset, MessengerRow, NewLineVerificationRow,
    NewOrderLineRow, NewOrderRow, NewOutboxEventRow, NewScanEventRow, OrderLineRow, OrderRow,
};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Helpers shared by the transactional operations ──────────────────────────

type OrderWithNames = (OrderRow, Option<String>, Option<String>);

fn hydrate(rows: Vec<OrderWithNames>) -> Result<Vec<Order>, DomainError> {
    rows.into_iter()
        .map(|(row, carrier, messenger)| row.into_domain(carrier, messenger))
        .collect()
}

fn parse_status(raw: &str) -> Result<OrderStatus, DomainError> {
    raw.parse().map_err(DomainError::Internal)
}

fn parse_messenger_status(raw: Option<&str>) -> Result<Option<MessengerStatus>, DomainError> {
    raw.map(str::parse::<MessengerStatus>)
        .transpose()
        .map_err(DomainError::Internal)
}

/// Take the order row lock every status-guarded mutation serialises on.
fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> Result<OrderRow, DomainError> {
    orders::table
        .find(order_id)
        .select(OrderRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::order_not_found(order_id))
}

fn load_line(conn: &mut PgConnection, line_id: Uuid) -> Result<OrderLineRow, DomainError> {
    order_lines::table
        .find(line_id)
        .select(OrderLineRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::line_not_found(line_id))
}

fn load_progress(
    conn: &mut PgConnection,
    order_id: Uuid,
    lock: bool,
) -> Result<Vec<LineProgress>, DomainError> {
    let lines: Vec<OrderLineRow> = order_lines::table
        .filter(order_lines::order_id.eq(order_id))
        .order(order_lines::line_number.asc())
        .select(OrderLineRow::as_select())
        .load(conn)?;

    let query = line_verifications::table
        .filter(line_verifications::order_id.eq(order_id))
        .select(LineVerificationRow::as_select());
    let counters: Vec<LineVerificationRow> = if lock {
        query.for_update().load(conn)?
    } else {
        query.load(conn)?
    };
    let mut counters: HashMap<Uuid, LineVerification> = counters
        .into_iter()
        .map(|row| (row.line_id, row.into()))
        .collect();

    Ok(lines
        .into_iter()
        .map(|line| {
            let verification = counters.remove(&line.id);
            LineProgress {
                line: line.into(),
                verification,
            }
        })
        .collect())
}

/// Upsert the line's counter back to zero against `quantity`.
fn restart_counter(
    conn: &mut PgConnection,
    line_id: Uuid,
    order_id: Uuid,
    quantity: i32,
    notes: String,
) -> QueryResult<LineVerificationRow> {
    diesel::insert_into(line_verifications::table)
        .values(&NewLineVerificationRow {
            line_id,
            order_id,
            required_scans: quantity,
            scanned_count: 0,
            is_verified: false,
            notes: notes.clone(),
        })
        .on_conflict(line_verifications::line_id)
        .do_update()
        .set((
            line_verifications::required_scans.eq(quantity),
            line_verifications::scanned_count.eq(0),
            line_verifications::is_verified.eq(false),
            line_verifications::notes.eq(notes),
            line_verifications::updated_at.eq(Utc::now()),
        ))
        .returning(LineVerificationRow::as_returning())
        .get_result(conn)
}

fn existing_notes(conn: &mut PgConnection, line_id: Uuid) -> QueryResult<String> {
    Ok(line_verifications::table
        .find(line_id)
        .select(line_verifications::notes)
        .first::<String>(conn)
        .optional()?
        .unwrap_or_default())
}

fn set_order_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    status: OrderStatus,
) -> QueryResult<usize> {
    diesel::update(orders::table.find(order_id))
        .set((
            orders::status.eq(status.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

fn touch_order(conn: &mut PgConnection, order_id: Uuid) -> QueryResult<usize> {
    diesel::update(orders::table.find(order_id))
        .set(orders::updated_at.eq(Utc::now()))
        .execute(conn)
}

/// Write the event to the outbox inside the caller's transaction. The relay
/// derives the destination topic from `aggregate_type`.
fn publish(conn: &mut PgConnection, event: &FulfillmentEvent) -> QueryResult<()> {
    diesel::insert_into(fulfillment_outbox::table)
        .values(&NewOutboxEventRow {
            id: Uuid::new_v4(),
            aggregate_type: AGGREGATE_TYPE.to_string(),
            aggregate_id: event.order_id.to_string(),
            event_type: event.event_type.to_string(),
            payload: event.payload.clone(),
        })
        .execute(conn)?;
    Ok(())
}

// ── Repository ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DieselFulfillmentRepository {
    pool: DbPool,
}

impl DieselFulfillmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl FulfillmentRepository for DieselFulfillmentRepository {
    fn create_order(&self, new_order: NewOrder) -> Result<Uuid, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order_id = Uuid::new_v4();
            diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    id: order_id,
                    order_number: new_order.order_number.clone(),
                    customer_name: new_order.customer_name.clone(),
                    status: OrderStatus::Created.as_str().to_string(),
                    delivery_method: new_order.delivery_method.clone(),
                    carrier_id: new_order.carrier_id,
                })
                .execute(conn)
                .map_err(|e| match e {
                    diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        DomainError::InvalidInput(format!(
                            "order number {} already exists",
                            new_order.order_number
                        ))
                    }
                    diesel::result::Error::DatabaseError(
                        DatabaseErrorKind::ForeignKeyViolation,
                        _,
                    ) => DomainError::InvalidInput("carrier_id does not exist".to_string()),
                    other => other.into(),
                })?;

            let lines: Vec<NewOrderLineRow> = new_order
                .lines
                .iter()
                .zip(1..)
                .map(|(l, line_number)| NewOrderLineRow {
                    id: Uuid::new_v4(),
                    order_id,
                    line_number,
                    product_code: l.product_code.clone(),
                    description: l.description.clone(),
                    quantity: l.quantity,
                })
                .collect();
            diesel::insert_into(order_lines::table)
                .values(&lines)
                .execute(conn)?;

            Ok(order_id)
        })
    }

    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let row: Option<OrderWithNames> = orders::table
            .left_join(carriers::table)
            .left_join(messengers::table)
            .filter(orders::id.eq(id))
            .select((
                OrderRow::as_select(),
                carriers::name.nullable(),
                messengers::display_name.nullable(),
            ))
            .first(&mut conn)
            .optional()?;

        Ok(hydrate(row.into_iter().collect())?.pop())
    }

    fn find_line(&self, line_id: Uuid) -> Result<Option<OrderLine>, DomainError> {
        let mut conn = self.pool.get()?;

        Ok(order_lines::table
            .find(line_id)
            .select(OrderLineRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Into::into))
    }

    fn line_progress(&self, order_id: Uuid) -> Result<Vec<LineProgress>, DomainError> {
        let mut conn = self.pool.get()?;
        load_progress(&mut conn, order_id, false)
    }

    fn orders_with_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;
        let wanted: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows: Vec<OrderWithNames> = orders::table
            .left_join(carriers::table)
            .left_join(messengers::table)
            .filter(orders::status.eq_any(wanted))
            .order((orders::created_at.asc(), orders::order_number.asc()))
            .select((
                OrderRow::as_select(),
                carriers::name.nullable(),
                messengers::display_name.nullable(),
            ))
            .load(&mut conn)?;

        hydrate(rows)
    }

    fn orders_assigned_to(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;
        let active: Vec<String> = [
            MessengerStatus::Assigned,
            MessengerStatus::Accepted,
            MessengerStatus::InDelivery,
        ]
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();

        let rows: Vec<OrderWithNames> = orders::table
            .left_join(carriers::table)
            .left_join(messengers::table)
            .filter(orders::assigned_messenger_id.eq(messenger_id))
            .filter(orders::messenger_status.eq_any(active))
            .order((orders::created_at.asc(), orders::order_number.asc()))
            .select((
                OrderRow::as_select(),
                carriers::name.nullable(),
                messengers::display_name.nullable(),
            ))
            .load(&mut conn)?;

        hydrate(rows)
    }

    fn verification_summaries(
        &self,
        order_ids: &[Uuid],
    ) -> Result<Vec<VerificationSummary>, DomainError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get()?;

        let rows: Vec<(Uuid, i32, Option<i32>, Option<bool>)> = order_lines::table
            .left_join(line_verifications::table)
            .filter(order_lines::order_id.eq_any(order_ids.to_vec()))
            .select((
                order_lines::order_id,
                order_lines::quantity,
                line_verifications::required_scans.nullable(),
                line_verifications::is_verified.nullable(),
            ))
            .load(&mut conn)?;

        let mut counts: HashMap<Uuid, (i64, i64)> =
            order_ids.iter().map(|&id| (id, (0, 0))).collect();
        for (order_id, quantity, required, verified) in rows {
            let entry = counts.entry(order_id).or_default();
            entry.0 += 1;
            if verified == Some(true) && required == Some(quantity) {
                entry.1 += 1;
            }
        }

        Ok(order_ids
            .iter()
            .map(|&order_id| {
                let (total_lines, verified_lines) =
                    counts.get(&order_id).copied().unwrap_or_default();
                VerificationSummary {
                    order_id,
                    total_lines,
                    verified_lines,
                }
            })
            .collect())
    }

    fn begin_packaging(
        &self,
        order_id: Uuid,
        event: &FulfillmentEvent,
    ) -> Result<bool, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = lock_order(conn, order_id)?;
            if parse_status(&order.status)? != OrderStatus::Created {
                return Ok(false);
            }

            let counters: Vec<NewLineVerificationRow> = order_lines::table
                .filter(order_lines::order_id.eq(order_id))
                .select(OrderLineRow::as_select())
                .load::<OrderLineRow>(conn)?
                .into_iter()
                .map(|line| NewLineVerificationRow {
                    line_id: line.id,
                    order_id,
                    required_scans: line.quantity,
                    scanned_count: 0,
                    is_verified: false,
                    notes: String::new(),
                })
                .collect();
            if !counters.is_empty() {
                diesel::insert_into(line_verifications::table)
                    .values(&counters)
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }

            set_order_status(conn, order_id, OrderStatus::InPackaging)?;
            publish(conn, event)?;
            Ok(true)
        })
    }

    fn resync_verification(
        &self,
        line_id: Uuid,
        note: &str,
        on_reset: &FulfillmentEvent,
    ) -> Result<Resync, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let line = load_line(conn, line_id)?;
            let counter: Option<LineVerificationRow> = line_verifications::table
                .find(line_id)
                .select(LineVerificationRow::as_select())
                .for_update()
                .first(conn)
                .optional()?;

            match counter {
                None => {
                    diesel::insert_into(line_verifications::table)
                        .values(&NewLineVerificationRow {
                            line_id,
                            order_id: line.order_id,
                            required_scans: line.quantity,
                            scanned_count: 0,
                            is_verified: false,
                            notes: String::new(),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                    Ok(Resync::Created)
                }
                Some(row) if row.required_scans != line.quantity => {
                    let notes = append_note(&row.notes, note);
                    let row = restart_counter(conn, line_id, line.order_id, line.quantity, notes)?;
                    publish(conn, on_reset)?;
                    Ok(Resync::Reset(row.into()))
                }
                Some(_) => Ok(Resync::Unchanged),
            }
        })
    }

    fn increment_scan(
        &self,
        line_id: Uuid,
        code: &str,
        on_verified: &FulfillmentEvent,
    ) -> Result<Option<LineVerification>, DomainError> {
        use crate::schema::line_verifications::dsl::{
            is_verified, required_scans, scanned_count, updated_at,
        };

        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            // Single conditional increment: concurrent scans can never push
            // the count past the required total.
            let counted: Option<LineVerificationRow> = diesel::update(
                line_verifications::table
                    .filter(line_verifications::line_id.eq(line_id))
                    .filter(scanned_count.lt(required_scans)),
            )
            .set((
                scanned_count.eq(scanned_count + 1),
                is_verified.eq((scanned_count + 1).eq(required_scans)),
                updated_at.eq(Utc::now()),
            ))
            .returning(LineVerificationRow::as_returning())
            .get_result(conn)
            .optional()?;

            let Some(row) = counted else {
                let exists: i64 = line_verifications::table
                    .find(line_id)
                    .count()
                    .get_result(conn)?;
                if exists == 0 {
                    return Err(DomainError::NotFound(format!(
                        "Verification for line {line_id}"
                    )));
                }
                return Ok(None);
            };

            diesel::insert_into(scan_events::table)
                .values(&NewScanEventRow {
                    id: Uuid::new_v4(),
                    line_id,
                    code: code.to_string(),
                    scan_number: row.scanned_count,
                })
                .execute(conn)?;
            if row.is_verified {
                publish(conn, on_verified)?;
            }
            Ok(Some(row.into()))
        })
    }

    fn reset_line(
        &self,
        line_id: Uuid,
        allowed: &[OrderStatus],
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<LineUpdate, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let line = load_line(conn, line_id)?;
            let status = parse_status(&lock_order(conn, line.order_id)?.status)?;
            if !allowed.contains(&status) {
                return Ok(LineUpdate::Refused(status));
            }

            let notes = append_note(&existing_notes(conn, line_id)?, note);
            let row = restart_counter(conn, line_id, line.order_id, line.quantity, notes)?;
            touch_order(conn, line.order_id)?;
            publish(conn, event)?;
            Ok(LineUpdate::Applied(Some(row.into())))
        })
    }

    fn change_line_quantity(
        &self,
        line_id: Uuid,
        quantity: i32,
        allowed: &[OrderStatus],
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<LineUpdate, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let line = load_line(conn, line_id)?;
            let status = parse_status(&lock_order(conn, line.order_id)?.status)?;
            if !allowed.contains(&status) {
                return Ok(LineUpdate::Refused(status));
            }

            diesel::update(order_lines::table.find(line_id))
                .set(order_lines::quantity.eq(quantity))
                .execute(conn)?;

            let counter: Option<String> = line_verifications::table
                .find(line_id)
                .select(line_verifications::notes)
                .for_update()
                .first(conn)
                .optional()?;
            let reset = match counter {
                Some(notes) => {
                    let notes = append_note(&notes, note);
                    Some(restart_counter(conn, line_id, line.order_id, quantity, notes)?.into())
                }
                None => None,
            };

            touch_order(conn, line.order_id)?;
            publish(conn, event)?;
            Ok(LineUpdate::Applied(reset))
        })
    }

    fn complete_packaging(
        &self,
        order_id: Uuid,
        drift_note: &str,
        event: &FulfillmentEvent,
    ) -> Result<PackagingGate, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let status = parse_status(&lock_order(conn, order_id)?.status)?;
            if status != OrderStatus::InPackaging {
                return Ok(PackagingGate::NotInPackaging(status));
            }

            let mut progress = load_progress(conn, order_id, true)?;
            for p in progress.iter_mut().filter(|p| p.is_drifted()) {
                let notes = p
                    .verification
                    .as_ref()
                    .map(|v| append_note(&v.notes, drift_note))
                    .unwrap_or_else(|| drift_note.to_string());
                let row = restart_counter(conn, p.line.id, order_id, p.line.quantity, notes)?;
                p.verification = Some(row.into());
            }

            // Drift resets above commit even when the gate stays closed.
            let pending = unverified_lines(&progress);
            if !pending.is_empty() {
                return Ok(PackagingGate::Unverified(pending));
            }

            set_order_status(conn, order_id, OrderStatus::ReadyForDelivery)?;
            publish(conn, event)?;
            Ok(PackagingGate::Completed)
        })
    }

    fn return_to_packaging(
        &self,
        order_id: Uuid,
        expected_status: Option<MessengerStatus>,
        expected_messenger: Option<Uuid>,
        note: &str,
        event: &FulfillmentEvent,
    ) -> Result<bool, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = lock_order(conn, order_id)?;
            if parse_status(&order.status)? != OrderStatus::ReadyForDelivery
                || parse_messenger_status(order.messenger_status.as_deref())? != expected_status
                || order.assigned_messenger_id != expected_messenger
            {
                return Ok(false);
            }

            for p in load_progress(conn, order_id, true)? {
                let notes = p
                    .verification
                    .as_ref()
                    .map(|v| append_note(&v.notes, note))
                    .unwrap_or_else(|| note.to_string());
                restart_counter(conn, p.line.id, order_id, p.line.quantity, notes)?;
            }

            diesel::update(orders::table.find(order_id))
                .set((
                    orders::status.eq(OrderStatus::InPackaging.as_str()),
                    orders::assigned_messenger_id.eq(None::<Uuid>),
                    orders::messenger_status.eq(None::<String>),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            publish(conn, event)?;
            Ok(true)
        })
    }

    fn delivery_history(&self, messenger_id: Uuid) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;
        let finished: Vec<String> = [MessengerStatus::Completed, MessengerStatus::Failed]
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let rows: Vec<OrderWithNames> = orders::table
            .left_join(carriers::table)
            .left_join(messengers::table)
            .filter(orders::assigned_messenger_id.eq(messenger_id))
            .filter(orders::messenger_status.eq_any(finished))
            .order((orders::updated_at.desc(), orders::order_number.desc()))
            .select((
                OrderRow::as_select(),
                carriers::name.nullable(),
                messengers::display_name.nullable(),
            ))
            .load(&mut conn)?;

        hydrate(rows)
    }

    fn find_messenger(&self, id: Uuid) -> Result<Option<Messenger>, DomainError> {
        let mut conn = self.pool.get()?;

        Ok(messengers::table
            .find(id)
            .select(MessengerRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Into::into))
    }

    fn apply_messenger_transition(&self, t: &MessengerTransition) -> Result<bool, DomainError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, DomainError, _>(|conn| {
            let changes = MessengerChangeset {
                status: t.order_status.as_str().to_string(),
                messenger_status: Some(t.messenger_status.map(|s| s.as_str().to_string())),
                assigned_messenger_id: Some(t.messenger_id),
                failure_reason: t.failure_reason.clone().map(Some),
                updated_at: Utc::now(),
            };

            // Compare-and-set: the update only lands if nobody moved the
            // order since the caller read it.
            let applied = diesel::update(
                orders::table
                    .filter(orders::id.eq(t.order_id))
                    .filter(orders::status.eq(t.expected_order_status.as_str()))
                    .filter(
                        orders::messenger_status.is_not_distinct_from(
                            t.expected_status.map(|s| s.as_str().to_string()),
                        ),
                    )
                    .filter(orders::assigned_messenger_id.is_not_distinct_from(t.expected_messenger)),
            )
            .set(&changes)
            .execute(conn)?;

            if applied == 0 {
                let exists: i64 = orders::table
                    .find(t.order_id)
                    .count()
                    .get_result(conn)?;
                if exists == 0 {
                    return Err(DomainError::order_not_found(t.order_id));
                }
                return Ok(false);
            }

            publish(conn, &t.event)?;
            Ok(true)
        })
    }
}
