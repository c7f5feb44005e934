use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::Result;
use crate::types::{ClientId, OrderId};

/// order creation data handed to the order collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub client_id: ClientId,
    pub total: Money,
    pub description: Option<String>,
}

/// order management, implemented outside this core
pub trait OrderService {
    fn create_order(&self, draft: OrderDraft) -> Result<OrderId>;
}

/// outbound notification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub seller_contact: String,
    pub client_contact: String,
    pub reason: String,
    pub context: Option<String>,
}

/// best-effort notification dispatch, implemented outside this core
///
/// callers treat failures as fire-and-forget: an alert error is logged and
/// recorded but never rolls back assignment or ledger state
pub trait AlertsService {
    fn send_alert(&self, request: AlertRequest) -> Result<()>;
}
