use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::InstallmentPlanConfig;
use crate::decimal::Money;
use crate::errors::{Result, SalesOpsError};
use crate::types::CreditType;

/// one scheduled partial payment of a larger debt
///
/// `is_paid`, `paid_amount` and `paid_date` are the durable payment facts;
/// display status is derived from them and the clock (see `ledger`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position in the schedule
    pub number: u32,
    pub due_date: NaiveDate,
    pub base_amount: Money,
    pub interest: Money,
    /// base_amount + interest
    pub amount: Money,
    pub is_paid: bool,
    pub paid_amount: Money,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Installment {
    /// amount - paid_amount, floored at zero
    pub fn outstanding(&self) -> Money {
        (self.amount - self.paid_amount).max(Money::ZERO)
    }
}

/// generated installment schedule with running totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    pub installments: Vec<Installment>,
    pub initial_payment: Money,
    pub credit_type: CreditType,
    pub total_base: Money,
    pub total_interest: Money,
    /// total_base + total_interest
    pub total_amount: Money,
}

impl InstallmentSchedule {
    /// generate a schedule for `total` under `config` (pure)
    ///
    /// equal-principal split: each installment carries `(total - initial) / n`
    /// of base. interest per installment is
    /// `base * rate * (n - number + 1)` — the multiplier decreases with the
    /// installment number, so earlier installments carry more interest.
    ///
    /// fewer than 1 installment yields an empty schedule by policy, not an
    /// error. an initial payment above the total is rejected.
    pub fn generate(total: Money, config: &InstallmentPlanConfig) -> Result<Self> {
        if config.initial_payment.is_negative() {
            return Err(SalesOpsError::InvalidPlanConfig {
                message: format!("negative initial payment: {}", config.initial_payment),
            });
        }
        if config.initial_payment > total {
            return Err(SalesOpsError::InitialPaymentExceedsTotal {
                initial_payment: config.initial_payment,
                total,
            });
        }

        let n = config.number_of_installments;
        if n < 1 {
            return Ok(Self::empty(config));
        }

        let remaining = total - config.initial_payment;
        let base = remaining / Decimal::from(n);

        let mut installments = Vec::with_capacity(n as usize);
        let mut total_base = Money::ZERO;
        let mut total_interest = Money::ZERO;

        for number in 1..=n {
            let due_date = config.frequency.due_date(config.start_date, number);
            let interest = if config.apply_interest {
                let periods_remaining = Decimal::from(n - number + 1);
                base * config.interest_rate.as_decimal() * periods_remaining
            } else {
                Money::ZERO
            };

            total_base += base;
            total_interest += interest;

            installments.push(Installment {
                number,
                due_date,
                base_amount: base,
                interest,
                amount: base + interest,
                is_paid: false,
                paid_amount: Money::ZERO,
                paid_date: None,
                notes: None,
            });
        }

        Ok(Self {
            installments,
            initial_payment: config.initial_payment,
            credit_type: config.credit_type,
            total_base,
            total_interest,
            total_amount: total_base + total_interest,
        })
    }

    fn empty(config: &InstallmentPlanConfig) -> Self {
        Self {
            installments: Vec::new(),
            initial_payment: config.initial_payment,
            credit_type: config.credit_type,
            total_base: Money::ZERO,
            total_interest: Money::ZERO,
            total_amount: Money::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }

    /// installment by 1-based number
    pub fn get(&self, number: u32) -> Option<&Installment> {
        self.installments.get(number.saturating_sub(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::types::PaymentFrequency;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_even_split_without_interest() {
        let config = InstallmentPlanConfig::simple(3, date(2024, 1, 15));
        let schedule = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap();

        assert_eq!(schedule.len(), 3);
        for inst in &schedule.installments {
            assert_eq!(inst.base_amount, Money::from_major(100));
            assert_eq!(inst.interest, Money::ZERO);
            assert_eq!(inst.amount, Money::from_major(100));
            assert!(!inst.is_paid);
            assert_eq!(inst.paid_amount, Money::ZERO);
        }
        assert_eq!(schedule.total_base, Money::from_major(300));
        assert_eq!(schedule.total_amount, Money::from_major(300));
    }

    #[test]
    fn test_front_loaded_interest_formula() {
        let config = InstallmentPlanConfig::simple(3, date(2024, 1, 15))
            .with_interest(Rate::from_percentage(10));
        let schedule = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap();

        // base 100 at 10% per period: multipliers 3, 2, 1
        assert_eq!(schedule.get(1).unwrap().interest, Money::from_major(30));
        assert_eq!(schedule.get(2).unwrap().interest, Money::from_major(20));
        assert_eq!(schedule.get(3).unwrap().interest, Money::from_major(10));
        assert_eq!(schedule.total_interest, Money::from_major(60));
        assert_eq!(schedule.total_amount, Money::from_major(360));
    }

    #[test]
    fn test_initial_payment_reduces_base() {
        let config = InstallmentPlanConfig::simple(2, date(2024, 1, 15))
            .with_initial_payment(Money::from_major(100));
        let schedule = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap();

        assert_eq!(schedule.get(1).unwrap().base_amount, Money::from_major(100));
        assert_eq!(schedule.total_base, Money::from_major(200));
        assert_eq!(schedule.initial_payment, Money::from_major(100));
    }

    #[test]
    fn test_initial_payment_above_total_rejected() {
        let config = InstallmentPlanConfig::simple(3, date(2024, 1, 15))
            .with_initial_payment(Money::from_major(500));
        let err = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap_err();
        assert!(matches!(err, SalesOpsError::InitialPaymentExceedsTotal { .. }));
    }

    #[test]
    fn test_zero_installments_yield_empty_schedule() {
        let mut config = InstallmentPlanConfig::simple(3, date(2024, 1, 15));
        config.number_of_installments = 0;
        let schedule = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap();
        assert!(schedule.is_empty());
        assert_eq!(schedule.total_amount, Money::ZERO);
    }

    #[test]
    fn test_monthly_due_dates() {
        let config = InstallmentPlanConfig::simple(3, date(2024, 1, 15));
        let schedule = InstallmentSchedule::generate(Money::from_major(300), &config).unwrap();

        assert_eq!(schedule.get(1).unwrap().due_date, date(2024, 2, 15));
        assert_eq!(schedule.get(2).unwrap().due_date, date(2024, 3, 15));
        assert_eq!(schedule.get(3).unwrap().due_date, date(2024, 4, 15));
    }

    #[test]
    fn test_weekly_due_dates() {
        let config = InstallmentPlanConfig::simple(2, date(2024, 3, 1))
            .with_frequency(PaymentFrequency::Weekly);
        let schedule = InstallmentSchedule::generate(Money::from_major(200), &config).unwrap();

        assert_eq!(schedule.get(1).unwrap().due_date, date(2024, 3, 8));
        assert_eq!(schedule.get(2).unwrap().due_date, date(2024, 3, 15));
    }

    #[test]
    fn test_uneven_split_rounds_to_cents() {
        let config = InstallmentPlanConfig::simple(3, date(2024, 1, 15));
        let schedule = InstallmentSchedule::generate(Money::from_major(100), &config).unwrap();

        // 100 / 3 rounds to 33.33 per installment; the remainder is not
        // folded into the last installment
        for inst in &schedule.installments {
            assert_eq!(inst.base_amount, Money::from_str_exact("33.33").unwrap());
        }
        assert_eq!(schedule.total_base, Money::from_str_exact("99.99").unwrap());
    }
}
