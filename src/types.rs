use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// unique identifier for a seller
pub type SellerId = Uuid;

/// unique identifier for a client conversation
pub type ClientId = Uuid;

/// unique identifier for an order
pub type OrderId = Uuid;

/// unique identifier for an installment row
pub type InstallmentId = Uuid;

/// seller availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellerStatus {
    Available,
    Busy,
    Offline,
}

/// assignment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    /// conversation in progress
    Active,
    /// conversation ended and load released
    Completed,
}

/// installment status, derived from durable facts and the clock
///
/// only `Paid` follows a durable fact (`is_paid`); the rest are recomputed
/// on every read and never persisted as ground truth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    Pending,
    DueSoon,
    Overdue,
    Paid,
}

/// how the credit schedule was originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditType {
    /// generated from a plan configuration
    Scheduled,
    /// entered by an operator
    Manual,
}

/// payment period between consecutive installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    /// due date of installment `number` (1-based) counted from `start`
    ///
    /// weekly adds `7 * number` days, biweekly `14 * number` days, monthly
    /// adds `number` calendar months. calendar-month arithmetic clamps the
    /// day-of-month at short months (Jan 31 + 1 month = Feb 28/29), so the
    /// day can drift near month boundaries.
    pub fn due_date(&self, start: NaiveDate, number: u32) -> NaiveDate {
        match self {
            PaymentFrequency::Weekly => start + Duration::days(7 * number as i64),
            PaymentFrequency::Biweekly => start + Duration::days(14 * number as i64),
            PaymentFrequency::Monthly => start
                .checked_add_months(Months::new(number))
                .unwrap_or(NaiveDate::MAX),
        }
    }
}

impl Default for PaymentFrequency {
    fn default() -> Self {
        PaymentFrequency::Monthly
    }
}

/// sales agent with a capacity limit on simultaneous active clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub id: SellerId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub active: bool,
    pub specialty: Option<String>,
    pub max_clients: u32,
    pub current_clients: u32,
    pub status: SellerStatus,
    pub rating: Option<Decimal>,
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Seller {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, max_clients: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            email: None,
            active: true,
            specialty: None,
            max_clients,
            current_clients: 0,
            status: SellerStatus::Available,
            rating: None,
            assigned_at: None,
        }
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    /// eligible for new assignments
    pub fn is_assignable(&self) -> bool {
        self.active && self.status != SellerStatus::Offline
    }

    /// under the simultaneous-client cap
    pub fn has_capacity(&self) -> bool {
        self.current_clients < self.max_clients
    }

    /// case-insensitive specialty match
    pub fn matches_specialty(&self, specialty: &str) -> bool {
        self.specialty
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case(specialty))
            .unwrap_or(false)
    }
}

/// client-to-seller assignment record, append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub client_id: ClientId,
    pub seller_id: SellerId,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
}

/// append-only record of a payment applied to an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    pub installment_id: InstallmentId,
    pub installment_number: u32,
    pub amount: Money,
    /// value date of the payment
    pub date: NaiveDate,
    /// when the payment was recorded
    pub timestamp: DateTime<Utc>,
}
