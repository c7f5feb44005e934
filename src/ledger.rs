use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{Result, SalesOpsError};
use crate::events::{Event, EventStore};
use crate::schedule::InstallmentSchedule;
use crate::types::{ClientId, InstallmentId, InstallmentStatus, OrderId, PaymentHistoryEntry};

/// days ahead of the due date at which an installment turns due-soon
const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// persisted installment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRecord {
    pub id: InstallmentId,
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub number: u32,
    pub total_installments: u32,
    pub due_date: NaiveDate,
    pub base_amount: Money,
    pub interest: Money,
    pub amount: Money,
    pub is_paid: bool,
    pub paid_amount: Money,
    pub paid_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl InstallmentRecord {
    /// amount - paid_amount, floored at zero
    pub fn outstanding(&self) -> Money {
        (self.amount - self.paid_amount).max(Money::ZERO)
    }

    /// display status as of `today` (see `derive_status`)
    pub fn status(&self, today: NaiveDate) -> InstallmentStatus {
        derive_status(self.due_date, self.is_paid, today)
    }
}

/// derive installment status from durable facts and the clock (pure)
///
/// paid is forever once `is_paid` is set; otherwise overdue when past due,
/// due-soon within 7 days of the due date, pending beyond that. the derived
/// states are never persisted as ground truth.
pub fn derive_status(due_date: NaiveDate, is_paid: bool, today: NaiveDate) -> InstallmentStatus {
    if is_paid {
        return InstallmentStatus::Paid;
    }
    let days_until = (due_date - today).num_days();
    if days_until < 0 {
        InstallmentStatus::Overdue
    } else if days_until <= DUE_SOON_WINDOW_DAYS {
        InstallmentStatus::DueSoon
    } else {
        InstallmentStatus::Pending
    }
}

/// result of applying one payment to one installment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentApplication {
    /// portion applied to the installment
    pub applied: Money,
    /// portion beyond the installment amount, returned to the caller to route
    pub excess: Money,
    /// cumulative paid amount after this payment
    pub paid_amount: Money,
    pub is_paid: bool,
}

/// per-order totals over the persisted schedule
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_base: Money,
    pub total_interest: Money,
    pub total_paid: Money,
    /// sum of the full amount of every unpaid installment. partial payments
    /// are ignored here, so this overstates the remaining balance when an
    /// installment is partially paid
    pub total_pending: Money,
}

#[derive(Debug, Default)]
struct LedgerState {
    rows: HashMap<InstallmentId, InstallmentRecord>,
    by_order: HashMap<OrderId, Vec<InstallmentId>>,
    history: Vec<PaymentHistoryEntry>,
}

/// installment ledger: persists generated schedules and applies payments
///
/// one mutex guards all rows, so each payment is an atomic
/// read-modify-write and two concurrent payments can never lose an update
#[derive(Debug, Default)]
pub struct InstallmentLedger {
    state: Mutex<LedgerState>,
}

impl InstallmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// bulk-insert a generated schedule, preserving installment order
    pub fn persist(
        &self,
        schedule: &InstallmentSchedule,
        order_id: OrderId,
        client_id: ClientId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Vec<InstallmentId>> {
        let mut state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        let total = schedule.len() as u32;
        let mut ids = Vec::with_capacity(schedule.len());

        for inst in &schedule.installments {
            let id = Uuid::new_v4();
            state.rows.insert(
                id,
                InstallmentRecord {
                    id,
                    order_id,
                    client_id,
                    number: inst.number,
                    total_installments: total,
                    due_date: inst.due_date,
                    base_amount: inst.base_amount,
                    interest: inst.interest,
                    amount: inst.amount,
                    is_paid: inst.is_paid,
                    paid_amount: inst.paid_amount,
                    paid_date: inst.paid_date,
                    payment_method: None,
                    reference: None,
                    notes: inst.notes.clone(),
                },
            );
            ids.push(id);
        }
        state.by_order.entry(order_id).or_default().extend(&ids);

        debug!(%order_id, installments = total, "schedule persisted");
        events.emit(Event::SchedulePersisted {
            order_id,
            client_id,
            installments: total,
            total_amount: schedule.total_amount,
            timestamp: time_provider.now(),
        });

        Ok(ids)
    }

    /// apply a payment to one installment
    ///
    /// the applied portion never raises `paid_amount` above the installment
    /// amount; anything beyond comes back as `excess` for the caller to
    /// route. settles the installment when the full amount is covered. a
    /// payment against an already settled installment applies nothing and
    /// comes back entirely as excess, leaving the event stream and the
    /// payment history untouched.
    pub fn record_payment(
        &self,
        installment_id: InstallmentId,
        amount: Money,
        value_date: NaiveDate,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<PaymentApplication> {
        if !amount.is_positive() {
            return Err(SalesOpsError::InvalidPaymentAmount { amount });
        }

        let mut state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        let row = state
            .rows
            .get_mut(&installment_id)
            .ok_or(SalesOpsError::InstallmentNotFound { id: installment_id })?;

        let applied = amount.min(row.outstanding());
        let excess = amount - applied;
        let was_paid = row.is_paid;

        row.paid_amount += applied;
        row.is_paid = row.paid_amount >= row.amount;
        if row.is_paid && row.paid_date.is_none() {
            row.paid_date = Some(value_date);
        }

        let application = PaymentApplication {
            applied,
            excess,
            paid_amount: row.paid_amount,
            is_paid: row.is_paid,
        };
        let (order_id, number, paid_date) = (row.order_id, row.number, row.paid_date);
        let newly_paid = row.is_paid && !was_paid;

        // nothing applied means nothing happened: no event, no history row
        if applied.is_positive() {
            debug!(%installment_id, %applied, %excess, "payment recorded");
            events.emit(Event::PaymentRecorded {
                installment_id,
                order_id,
                applied,
                excess,
                paid_amount: application.paid_amount,
                value_date,
                timestamp: time_provider.now(),
            });
            if newly_paid {
                if let Some(paid_date) = paid_date {
                    events.emit(Event::InstallmentSettled {
                        installment_id,
                        order_id,
                        number,
                        paid_date,
                        timestamp: time_provider.now(),
                    });
                }
            }

            state.history.push(PaymentHistoryEntry {
                installment_id,
                installment_number: number,
                amount: applied,
                date: value_date,
                timestamp: time_provider.now(),
            });
        }

        Ok(application)
    }

    pub fn get(&self, installment_id: InstallmentId) -> Result<Option<InstallmentRecord>> {
        let state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        Ok(state.rows.get(&installment_id).cloned())
    }

    /// installments for an order, in schedule order
    pub fn installments(&self, order_id: OrderId) -> Result<Vec<InstallmentRecord>> {
        let state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        let mut rows: Vec<_> = state
            .by_order
            .get(&order_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.rows.get(id).cloned())
            .collect();
        rows.sort_by_key(|r| r.number);
        Ok(rows)
    }

    /// append-only payment history for an order, oldest first
    pub fn history(&self, order_id: OrderId) -> Result<Vec<PaymentHistoryEntry>> {
        let state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        let ids: std::collections::HashSet<_> = state
            .by_order
            .get(&order_id)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        Ok(state
            .history
            .iter()
            .filter(|e| ids.contains(&e.installment_id))
            .cloned()
            .collect())
    }

    /// totals over the order's schedule
    pub fn totals(&self, order_id: OrderId) -> Result<LedgerTotals> {
        let rows = self.installments(order_id)?;
        let mut totals = LedgerTotals::default();
        for row in &rows {
            totals.total_base += row.base_amount;
            totals.total_interest += row.interest;
            totals.total_paid += row.paid_amount;
            if !row.is_paid {
                totals.total_pending += row.amount;
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallmentPlanConfig;
    use crate::decimal::Rate;
    use chrono::{NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        ))
    }

    fn persisted_schedule(
        ledger: &InstallmentLedger,
        total: i64,
        n: u32,
    ) -> (OrderId, Vec<InstallmentId>) {
        let config = InstallmentPlanConfig::simple(n, date(2024, 1, 15));
        let schedule = InstallmentSchedule::generate(Money::from_major(total), &config).unwrap();
        let order_id = Uuid::new_v4();
        let ids = ledger
            .persist(&schedule, order_id, Uuid::new_v4(), &test_clock(), &mut EventStore::new())
            .unwrap();
        (order_id, ids)
    }

    #[test]
    fn test_status_derivation() {
        let today = date(2024, 6, 15);
        assert_eq!(derive_status(date(2024, 6, 14), false, today), InstallmentStatus::Overdue);
        assert_eq!(derive_status(date(2024, 6, 15), false, today), InstallmentStatus::DueSoon);
        assert_eq!(derive_status(date(2024, 6, 18), false, today), InstallmentStatus::DueSoon);
        assert_eq!(derive_status(date(2024, 6, 22), false, today), InstallmentStatus::DueSoon);
        assert_eq!(derive_status(date(2024, 6, 23), false, today), InstallmentStatus::Pending);
        assert_eq!(derive_status(date(2024, 7, 15), false, today), InstallmentStatus::Pending);
        // paid wins regardless of date
        assert_eq!(derive_status(date(2020, 1, 1), true, today), InstallmentStatus::Paid);
    }

    #[test]
    fn test_persist_preserves_order() {
        let ledger = InstallmentLedger::new();
        let (order_id, ids) = persisted_schedule(&ledger, 300, 3);

        assert_eq!(ids.len(), 3);
        let rows = ledger.installments(order_id).unwrap();
        assert_eq!(
            rows.iter().map(|r| r.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(rows.iter().all(|r| r.total_installments == 3));
    }

    #[test]
    fn test_partial_then_full_payment() {
        let ledger = InstallmentLedger::new();
        let (_, ids) = persisted_schedule(&ledger, 300, 3);
        let clock = test_clock();
        let mut events = EventStore::new();

        let first = ledger
            .record_payment(ids[0], Money::from_major(50), date(2024, 2, 10), &clock, &mut events)
            .unwrap();
        assert_eq!(first.applied, Money::from_major(50));
        assert_eq!(first.paid_amount, Money::from_major(50));
        assert!(!first.is_paid);

        let second = ledger
            .record_payment(ids[0], Money::from_major(50), date(2024, 2, 12), &clock, &mut events)
            .unwrap();
        assert_eq!(second.paid_amount, Money::from_major(100));
        assert!(second.is_paid);

        let row = ledger.get(ids[0]).unwrap().unwrap();
        assert!(row.is_paid);
        assert_eq!(row.paid_date, Some(date(2024, 2, 12)));
        assert_eq!(row.status(date(2024, 6, 1)), InstallmentStatus::Paid);

        // one settlement event, two payment events
        let settled = events
            .events()
            .iter()
            .filter(|e| matches!(e, Event::InstallmentSettled { .. }))
            .count();
        assert_eq!(settled, 1);
    }

    #[test]
    fn test_overpayment_clamped_with_excess() {
        let ledger = InstallmentLedger::new();
        let (_, ids) = persisted_schedule(&ledger, 300, 3);

        let app = ledger
            .record_payment(
                ids[0],
                Money::from_major(150),
                date(2024, 2, 10),
                &test_clock(),
                &mut EventStore::new(),
            )
            .unwrap();
        assert_eq!(app.applied, Money::from_major(100));
        assert_eq!(app.excess, Money::from_major(50));
        assert_eq!(app.paid_amount, Money::from_major(100));
        assert!(app.is_paid);
    }

    #[test]
    fn test_payment_on_settled_installment_is_all_excess() {
        let ledger = InstallmentLedger::new();
        let (order_id, ids) = persisted_schedule(&ledger, 300, 3);
        let clock = test_clock();
        let mut events = EventStore::new();

        ledger
            .record_payment(ids[0], Money::from_major(100), date(2024, 2, 10), &clock, &mut events)
            .unwrap();
        events.clear();

        let app = ledger
            .record_payment(ids[0], Money::from_major(25), date(2024, 2, 20), &clock, &mut events)
            .unwrap();
        assert_eq!(app.applied, Money::ZERO);
        assert_eq!(app.excess, Money::from_major(25));
        assert_eq!(app.paid_amount, Money::from_major(100));
        assert!(app.is_paid);

        // the no-op payment leaves no trace in the stream or the history
        assert!(events.events().is_empty());
        assert_eq!(ledger.history(order_id).unwrap().len(), 1);

        // the original settlement date survives
        let row = ledger.get(ids[0]).unwrap().unwrap();
        assert_eq!(row.paid_amount, Money::from_major(100));
        assert_eq!(row.paid_date, Some(date(2024, 2, 10)));
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        let ledger = InstallmentLedger::new();
        let (_, ids) = persisted_schedule(&ledger, 300, 3);

        let err = ledger
            .record_payment(ids[0], Money::ZERO, date(2024, 2, 10), &test_clock(), &mut EventStore::new())
            .unwrap_err();
        assert!(matches!(err, SalesOpsError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn test_unknown_installment() {
        let ledger = InstallmentLedger::new();
        let err = ledger
            .record_payment(
                Uuid::new_v4(),
                Money::from_major(10),
                date(2024, 2, 10),
                &test_clock(),
                &mut EventStore::new(),
            )
            .unwrap_err();
        assert!(matches!(err, SalesOpsError::InstallmentNotFound { .. }));
    }

    #[test]
    fn test_totals_with_interest() {
        let ledger = InstallmentLedger::new();
        let config = InstallmentPlanConfig::simple(3, date(2024, 1, 15))
            .with_interest(Rate::from_percentage(10));
        let schedule = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap();
        let order_id = Uuid::new_v4();
        let clock = test_clock();
        let ids = ledger
            .persist(&schedule, order_id, Uuid::new_v4(), &clock, &mut EventStore::new())
            .unwrap();

        ledger
            .record_payment(ids[0], Money::from_major(130), date(2024, 2, 15), &clock, &mut EventStore::new())
            .unwrap();

        let totals = ledger.totals(order_id).unwrap();
        assert_eq!(totals.total_base, Money::from_major(300));
        assert_eq!(totals.total_interest, Money::from_major(60));
        assert_eq!(totals.total_paid, Money::from_major(130));
        // installments 2 and 3 remain unpaid: 120 + 110
        assert_eq!(totals.total_pending, Money::from_major(230));
    }

    #[test]
    fn test_total_pending_ignores_partial_payments() {
        let ledger = InstallmentLedger::new();
        let (order_id, ids) = persisted_schedule(&ledger, 300, 3);

        ledger
            .record_payment(ids[0], Money::from_major(40), date(2024, 2, 10), &test_clock(), &mut EventStore::new())
            .unwrap();

        let totals = ledger.totals(order_id).unwrap();
        // the partially paid installment still contributes its full amount,
        // overstating the remaining balance by the 40 already paid
        assert_eq!(totals.total_pending, Money::from_major(300));
        assert_eq!(totals.total_paid, Money::from_major(40));
    }

    #[test]
    fn test_history_is_append_only_per_order() {
        let ledger = InstallmentLedger::new();
        let (order_id, ids) = persisted_schedule(&ledger, 300, 3);
        let clock = test_clock();
        let mut events = EventStore::new();

        ledger
            .record_payment(ids[0], Money::from_major(30), date(2024, 2, 1), &clock, &mut events)
            .unwrap();
        ledger
            .record_payment(ids[1], Money::from_major(100), date(2024, 3, 1), &clock, &mut events)
            .unwrap();

        let history = ledger.history(order_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].installment_number, 1);
        assert_eq!(history[0].amount, Money::from_major(30));
        assert_eq!(history[1].installment_number, 2);
    }
}
