use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{CreditType, PaymentFrequency};

/// installment plan configuration
///
/// every recognized option is an explicit field; there is no pass-through
/// options map. effects:
/// - `initial_payment` is subtracted from the total before splitting; it
///   must not exceed the total
/// - `frequency` drives due-date arithmetic (see `PaymentFrequency::due_date`)
/// - `interest_rate` is percent per payment period and only applies when
///   `apply_interest` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPlanConfig {
    /// whether credit is offered at all for this sale
    pub enabled: bool,
    /// down payment collected up front, excluded from the schedule
    pub initial_payment: Money,
    /// number of scheduled installments; below 1 yields an empty schedule
    pub number_of_installments: u32,
    pub frequency: PaymentFrequency,
    /// date the schedule is counted from; the first due date is one period later
    pub start_date: NaiveDate,
    /// percent per period, e.g. 10 means 10% of the base per period
    pub interest_rate: Rate,
    pub apply_interest: bool,
    pub credit_type: CreditType,
}

impl InstallmentPlanConfig {
    /// plan split into `n` periods starting at `start_date`, no interest
    pub fn simple(n: u32, start_date: NaiveDate) -> Self {
        Self {
            enabled: true,
            initial_payment: Money::ZERO,
            number_of_installments: n,
            frequency: PaymentFrequency::default(),
            start_date,
            interest_rate: Rate::ZERO,
            apply_interest: false,
            credit_type: CreditType::Scheduled,
        }
    }

    pub fn with_initial_payment(mut self, initial_payment: Money) -> Self {
        self.initial_payment = initial_payment;
        self
    }

    pub fn with_interest(mut self, rate: Rate) -> Self {
        self.interest_rate = rate;
        self.apply_interest = true;
        self
    }

    pub fn with_frequency(mut self, frequency: PaymentFrequency) -> Self {
        self.frequency = frequency;
        self
    }
}

impl Default for InstallmentPlanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_payment: Money::ZERO,
            number_of_installments: 1,
            frequency: PaymentFrequency::Monthly,
            start_date: NaiveDate::MIN,
            interest_rate: Rate::ZERO,
            apply_interest: false,
            credit_type: CreditType::Scheduled,
        }
    }
}
