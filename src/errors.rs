use thiserror::Error;

use crate::decimal::Money;
use crate::types::{InstallmentId, SellerId};

#[derive(Error, Debug)]
pub enum SalesOpsError {
    #[error("no active sellers available for assignment")]
    NoSellersAvailable,

    #[error("seller not found: {id}")]
    SellerNotFound {
        id: SellerId,
    },

    #[error("seller still has {current_clients} active clients")]
    SellerStillLoaded {
        id: SellerId,
        current_clients: u32,
    },

    #[error("installment not found: {id}")]
    InstallmentNotFound {
        id: InstallmentId,
    },

    #[error("invalid plan configuration: {message}")]
    InvalidPlanConfig {
        message: String,
    },

    #[error("initial payment {initial_payment} exceeds total amount {total}")]
    InitialPaymentExceedsTotal {
        initial_payment: Money,
        total: Money,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("store lock poisoned")]
    StorePoisoned,
}

pub type Result<T> = std::result::Result<T, SalesOpsError>;
