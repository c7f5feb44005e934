use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::ledger::InstallmentRecord;
use crate::types::{ClientId, OrderId};

/// days ahead included in the upcoming-collections window
const UPCOMING_WINDOW_DAYS: i64 = 7;

/// anything owed to the business that carries a due date
///
/// implemented by installment rows and by raw orders with a paid-so-far
/// figure, so the aging logic exists exactly once
pub trait Receivable {
    fn due_date(&self) -> NaiveDate;
    fn amount(&self) -> Money;
    fn paid_amount(&self) -> Money;
    fn cancelled(&self) -> bool;

    /// amount - paid_amount, floored at zero
    fn outstanding(&self) -> Money {
        (self.amount() - self.paid_amount()).max(Money::ZERO)
    }
}

impl Receivable for InstallmentRecord {
    fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    fn amount(&self) -> Money {
        self.amount
    }

    fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    fn cancelled(&self) -> bool {
        false
    }
}

/// whole-order receivable for orders sold on open account rather than a
/// generated schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceivable {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub due_date: NaiveDate,
    pub total: Money,
    pub amount_paid: Money,
    pub cancelled: bool,
}

impl Receivable for OrderReceivable {
    fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    fn amount(&self) -> Money {
        self.total
    }

    fn paid_amount(&self) -> Money {
        self.amount_paid
    }

    fn cancelled(&self) -> bool {
        self.cancelled
    }
}

/// outstanding amounts bucketed by days past due
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgingBuckets {
    /// 0-30 days past due (inclusive)
    pub bucket_0_30: Money,
    /// 31-60 days past due
    pub bucket_31_60: Money,
    /// 61-90 days past due
    pub bucket_61_90: Money,
    /// more than 90 days past due
    pub bucket_90_plus: Money,
}

impl AgingBuckets {
    fn add(&mut self, days_past_due: i64, outstanding: Money) {
        match days_past_due {
            0..=30 => self.bucket_0_30 += outstanding,
            31..=60 => self.bucket_31_60 += outstanding,
            61..=90 => self.bucket_61_90 += outstanding,
            _ => self.bucket_90_plus += outstanding,
        }
    }

    pub fn total(&self) -> Money {
        self.bucket_0_30 + self.bucket_31_60 + self.bucket_61_90 + self.bucket_90_plus
    }
}

/// receivables due inside the next week
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UpcomingWindow {
    pub count: usize,
    pub total: Money,
}

/// summary statistics over a set of receivables, computed at query time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReceivablesReport {
    pub count: usize,
    pub overdue_count: usize,
    pub total_outstanding: Money,
    pub total_paid: Money,
    pub aging: AgingBuckets,
    pub upcoming: UpcomingWindow,
}

impl ReceivablesReport {
    /// aggregate `records` as of `today`
    ///
    /// cancelled records never contribute. aging buckets take records with a
    /// past-or-present due date and an outstanding balance above the
    /// collection epsilon; the upcoming window takes not-yet-overdue records
    /// due within the next 7 days.
    pub fn compute<'a, R, I>(records: I, today: NaiveDate) -> Self
    where
        R: Receivable + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let upcoming_end = today + Duration::days(UPCOMING_WINDOW_DAYS);
        let mut report = Self::default();

        for record in records {
            if record.cancelled() {
                continue;
            }

            let outstanding = record.outstanding();
            report.count += 1;
            report.total_outstanding += outstanding;
            report.total_paid += record.paid_amount();

            if !outstanding.is_outstanding() {
                continue;
            }

            let due = record.due_date();
            if due <= today {
                let days_past_due = (today - due).num_days();
                if days_past_due > 0 {
                    report.overdue_count += 1;
                }
                report.aging.add(days_past_due, outstanding);
            }
            // the windows overlap at `today`: a record due today is current
            // in the aging sense and still collectible this week
            if due >= today && due <= upcoming_end {
                report.upcoming.count += 1;
                report.upcoming.total += outstanding;
            }
        }

        report
    }
}
