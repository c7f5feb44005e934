pub mod balancer;
pub mod collaborators;
pub mod config;
pub mod decimal;
pub mod directory;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod receivables;
pub mod schedule;
pub mod service;
pub mod types;

// re-export key types
pub use balancer::{AssignmentBalancer, BalancerStats};
pub use collaborators::{AlertRequest, AlertsService, OrderDraft, OrderService};
pub use config::InstallmentPlanConfig;
pub use decimal::{Money, Rate, OUTSTANDING_EPSILON};
pub use directory::SellerDirectory;
pub use errors::{Result, SalesOpsError};
pub use events::{Event, EventStore};
pub use ledger::{
    derive_status, InstallmentLedger, InstallmentRecord, LedgerTotals, PaymentApplication,
};
pub use receivables::{
    AgingBuckets, OrderReceivable, Receivable, ReceivablesReport, UpcomingWindow,
};
pub use schedule::{Installment, InstallmentSchedule};
pub use service::SalesOps;
pub use types::{
    Assignment, AssignmentStatus, ClientId, CreditType, InstallmentId, InstallmentStatus,
    OrderId, PaymentFrequency, PaymentHistoryEntry, Seller, SellerId, SellerStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
