use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use tracing::warn;

use crate::balancer::{AssignmentBalancer, BalancerStats};
use crate::collaborators::{AlertRequest, AlertsService, OrderDraft, OrderService};
use crate::config::InstallmentPlanConfig;
use crate::decimal::Money;
use crate::directory::SellerDirectory;
use crate::errors::{Result, SalesOpsError};
use crate::events::{Event, EventStore};
use crate::ledger::{InstallmentLedger, InstallmentRecord, LedgerTotals, PaymentApplication};
use crate::receivables::{Receivable, ReceivablesReport};
use crate::schedule::InstallmentSchedule;
use crate::types::{ClientId, InstallmentId, OrderId, PaymentHistoryEntry, Seller};

/// sales operations service: the one entry point controllers and bot
/// scripting talk to
///
/// owns the clock, the event store and the stores backing the balancer and
/// the ledger, so their lifecycle is tied to service startup and assignment
/// state lives in exactly one place
pub struct SalesOps {
    balancer: AssignmentBalancer,
    ledger: InstallmentLedger,
    time_provider: SafeTimeProvider,
    events: Mutex<EventStore>,
}

impl SalesOps {
    pub fn new(directory: Arc<SellerDirectory>, time_provider: SafeTimeProvider) -> Self {
        Self {
            balancer: AssignmentBalancer::new(directory),
            ledger: InstallmentLedger::new(),
            time_provider,
            events: Mutex::new(EventStore::new()),
        }
    }

    pub fn directory(&self) -> &Arc<SellerDirectory> {
        self.balancer.directory()
    }

    pub fn time_provider(&self) -> &SafeTimeProvider {
        &self.time_provider
    }

    /// current date according to the service clock
    pub fn today(&self) -> NaiveDate {
        self.time_provider.now().date_naive()
    }

    fn with_events<T>(&self, f: impl FnOnce(&mut EventStore) -> Result<T>) -> Result<T> {
        let mut events = self.events.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        f(&mut events)
    }

    /// drain events emitted since the last call
    pub fn take_events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|mut e| e.take_events())
            .unwrap_or_default()
    }

    // assignment operations

    pub fn assign(&self, client_id: ClientId, specialty: Option<&str>) -> Result<Seller> {
        self.with_events(|events| {
            self.balancer
                .assign(client_id, specialty, &self.time_provider, events)
        })
    }

    pub fn release(&self, client_id: ClientId) -> Result<Option<Seller>> {
        self.with_events(|events| self.balancer.release(client_id, &self.time_provider, events))
    }

    pub fn get_assigned(&self, client_id: ClientId) -> Result<Option<Seller>> {
        self.balancer.get_assigned(client_id)
    }

    pub fn stats(&self) -> Result<BalancerStats> {
        self.balancer.stats()
    }

    // credit operations

    /// generate an installment schedule for a sale
    ///
    /// a disabled plan yields an empty schedule: the sale proceeds without
    /// credit and nothing is persisted for it
    pub fn generate_schedule(
        &self,
        total: Money,
        config: &InstallmentPlanConfig,
    ) -> Result<InstallmentSchedule> {
        if !config.enabled {
            let mut disabled = config.clone();
            disabled.number_of_installments = 0;
            return InstallmentSchedule::generate(total, &disabled);
        }
        InstallmentSchedule::generate(total, config)
    }

    /// create an order through the order collaborator and persist its
    /// installment schedule in one step
    ///
    /// the schedule is generated before the order is created, so an invalid
    /// plan never leaves an order behind
    pub fn open_credit_order(
        &self,
        orders: &dyn OrderService,
        client_id: ClientId,
        total: Money,
        config: &InstallmentPlanConfig,
    ) -> Result<(OrderId, Vec<InstallmentId>)> {
        let schedule = self.generate_schedule(total, config)?;
        let order_id = orders.create_order(OrderDraft {
            client_id,
            total,
            description: None,
        })?;
        let ids = self.persist_schedule(&schedule, order_id, client_id)?;
        Ok((order_id, ids))
    }

    pub fn persist_schedule(
        &self,
        schedule: &InstallmentSchedule,
        order_id: OrderId,
        client_id: ClientId,
    ) -> Result<Vec<InstallmentId>> {
        self.with_events(|events| {
            self.ledger
                .persist(schedule, order_id, client_id, &self.time_provider, events)
        })
    }

    pub fn record_payment(
        &self,
        installment_id: InstallmentId,
        amount: Money,
        value_date: NaiveDate,
    ) -> Result<PaymentApplication> {
        self.with_events(|events| {
            self.ledger
                .record_payment(installment_id, amount, value_date, &self.time_provider, events)
        })
    }

    pub fn installments(&self, order_id: OrderId) -> Result<Vec<InstallmentRecord>> {
        self.ledger.installments(order_id)
    }

    pub fn payment_history(&self, order_id: OrderId) -> Result<Vec<PaymentHistoryEntry>> {
        self.ledger.history(order_id)
    }

    pub fn totals(&self, order_id: OrderId) -> Result<LedgerTotals> {
        self.ledger.totals(order_id)
    }

    // reporting

    /// receivables statistics over an order's persisted schedule, as of now
    pub fn order_receivables(&self, order_id: OrderId) -> Result<ReceivablesReport> {
        let rows = self.ledger.installments(order_id)?;
        Ok(ReceivablesReport::compute(&rows, self.today()))
    }

    /// receivables statistics over any record set, as of now
    pub fn receivables_report<'a, R>(&self, records: impl IntoIterator<Item = &'a R>) -> ReceivablesReport
    where
        R: Receivable + 'a,
    {
        ReceivablesReport::compute(records, self.today())
    }

    // collaborators

    /// dispatch a notification, fire-and-forget
    ///
    /// failures are logged and recorded as an event; they never affect
    /// assignment or ledger state
    pub fn send_alert(&self, alerts: &dyn AlertsService, request: AlertRequest) {
        if let Err(err) = alerts.send_alert(request) {
            warn!(error = %err, "alert dispatch failed");
            if let Ok(mut events) = self.events.lock() {
                events.emit(Event::AlertDispatchFailed {
                    reason: err.to_string(),
                    timestamp: self.time_provider.now(),
                });
            }
        }
    }
}
