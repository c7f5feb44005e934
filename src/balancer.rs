use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::SellerDirectory;
use crate::errors::{Result, SalesOpsError};
use crate::events::{Event, EventStore};
use crate::types::{Assignment, AssignmentStatus, ClientId, Seller, SellerId};

/// aggregate conversation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalancerStats {
    pub total_assignments: u64,
    pub active_conversations: u64,
    pub completed_conversations: u64,
}

#[derive(Debug, Default)]
struct BalancerState {
    /// latest assignment per client; superseded records move to `history`
    assignments: HashMap<ClientId, Assignment>,
    /// completed assignments that were later replaced, append-only
    history: Vec<Assignment>,
    /// single shared rotation pointer, global across specialty pools
    rotating_index: usize,
    stats: BalancerStats,
}

/// round-robin seller workload balancer
///
/// one mutex guards the assignment map, the rotation pointer and the
/// counters, and seller load is only mutated while it is held. the capacity
/// check, the selection, the load increment and the assignment write are
/// therefore one serialized transaction: concurrent `assign`/`release`
/// calls can neither lose a load update nor skip/repeat a rotation slot.
#[derive(Debug)]
pub struct AssignmentBalancer {
    directory: Arc<SellerDirectory>,
    state: Mutex<BalancerState>,
}

impl AssignmentBalancer {
    pub fn new(directory: Arc<SellerDirectory>) -> Self {
        Self {
            directory,
            state: Mutex::new(BalancerState::default()),
        }
    }

    pub fn directory(&self) -> &Arc<SellerDirectory> {
        &self.directory
    }

    /// pick a seller for a client contact
    ///
    /// sticky: a client with an in-progress conversation keeps its seller
    /// while that seller is still active. when the seller was deactivated or
    /// removed mid-conversation the stale conversation is completed and its
    /// slot released before the client is reassigned. otherwise the rotation
    /// runs over under-capacity sellers (narrowed by specialty when one
    /// matches); when everyone is at capacity it falls back to the
    /// least-loaded active seller, so a client is never hard-rejected while
    /// any seller is active.
    pub fn assign(
        &self,
        client_id: ClientId,
        specialty: Option<&str>,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Seller> {
        let mut state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;

        // sticky reuse for an in-progress conversation
        let mut stale_seller: Option<SellerId> = None;
        if let Some(existing) = state.assignments.get(&client_id) {
            if existing.status == AssignmentStatus::Active {
                if let Some(seller) = self.directory.find_by_id(existing.seller_id)? {
                    if seller.active {
                        events.emit(Event::AssignmentReused {
                            client_id,
                            seller_id: seller.id,
                            timestamp: time_provider.now(),
                        });
                        return Ok(seller);
                    }
                }
                // assigned seller vanished or was deactivated: the stale
                // conversation is completed below, then the client reassigned
                stale_seller = Some(existing.seller_id);
            }
        }

        let active = self.directory.find_active()?;
        if active.is_empty() {
            return Err(SalesOpsError::NoSellersAvailable);
        }

        // primary pool: under-capacity sellers, narrowed by specialty when
        // at least one member matches
        let mut pool: Vec<&Seller> = active.iter().filter(|s| s.has_capacity()).collect();
        if let Some(specialty) = specialty {
            let specialists: Vec<&Seller> = pool
                .iter()
                .copied()
                .filter(|s| s.matches_specialty(specialty))
                .collect();
            if !specialists.is_empty() {
                pool = specialists;
            }
        }

        // graceful overflow: everyone is full, so take the least-loaded
        // active seller instead of a rotation slot, ties broken by the
        // stable pool order
        let over_capacity = pool.is_empty();
        let selected = if over_capacity {
            active
                .iter()
                .min_by_key(|s| s.current_clients)
                .cloned()
                .ok_or(SalesOpsError::NoSellersAvailable)?
        } else {
            let index = state.rotating_index % pool.len();
            let selected = pool[index].clone();
            state.rotating_index = (state.rotating_index + 1) % pool.len();
            selected
        };

        // the increment is the only fallible write; it happens before the
        // assignment-map write so a failure leaves no partial state behind
        let now = time_provider.now();
        let seller_load = self.directory.increment_load(selected.id, now)?;

        // complete the stale conversation before writing its replacement so
        // the old seller's slot and the active counter do not leak; the old
        // seller record may already be gone
        if let Some(stale_id) = stale_seller {
            let stale_load = match self.directory.decrement_load(stale_id) {
                Ok(load) => load,
                Err(SalesOpsError::SellerNotFound { .. }) => 0,
                Err(err) => return Err(err),
            };
            state.stats.active_conversations =
                state.stats.active_conversations.saturating_sub(1);
            state.stats.completed_conversations += 1;
            events.emit(Event::AssignmentReleased {
                client_id,
                seller_id: stale_id,
                seller_load: stale_load,
                timestamp: now,
            });
        }

        if let Some(mut previous) = state.assignments.insert(
            client_id,
            Assignment {
                client_id,
                seller_id: selected.id,
                assigned_at: now,
                status: AssignmentStatus::Active,
            },
        ) {
            // still active when the old seller was deactivated mid-conversation
            previous.status = AssignmentStatus::Completed;
            state.history.push(previous);
        }
        state.stats.total_assignments += 1;
        state.stats.active_conversations += 1;

        debug!(%client_id, seller_id = %selected.id, seller_load, over_capacity, "client assigned");
        events.emit(Event::SellerAssigned {
            client_id,
            seller_id: selected.id,
            seller_load,
            over_capacity,
            timestamp: time_provider.now(),
        });

        // reflect the write in the returned record
        let mut seller = selected;
        seller.current_clients = seller_load;
        seller.assigned_at = Some(now);
        Ok(seller)
    }

    /// end a client's conversation and release the seller's slot
    ///
    /// a client with no active assignment is a no-op, so repeated or stray
    /// releases never drive a load counter negative. returns the released
    /// seller record when something was released.
    pub fn release(
        &self,
        client_id: ClientId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Option<Seller>> {
        let mut state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;

        let seller_id = match state.assignments.get(&client_id) {
            Some(a) if a.status == AssignmentStatus::Active => a.seller_id,
            _ => return Ok(None),
        };

        // decrement before flipping the assignment so a store failure leaves
        // the conversation active rather than half-released
        let seller_load = self.directory.decrement_load(seller_id)?;

        if let Some(assignment) = state.assignments.get_mut(&client_id) {
            assignment.status = AssignmentStatus::Completed;
        }
        state.stats.active_conversations = state.stats.active_conversations.saturating_sub(1);
        state.stats.completed_conversations += 1;

        debug!(%client_id, %seller_id, seller_load, "client released");
        events.emit(Event::AssignmentReleased {
            client_id,
            seller_id,
            seller_load,
            timestamp: time_provider.now(),
        });

        Ok(self.directory.find_by_id(seller_id)?)
    }

    /// seller handling the client's conversation, for active assignments only
    pub fn get_assigned(&self, client_id: ClientId) -> Result<Option<Seller>> {
        let state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        match state.assignments.get(&client_id) {
            Some(a) if a.status == AssignmentStatus::Active => {
                self.directory.find_by_id(a.seller_id)
            }
            _ => Ok(None),
        }
    }

    /// the client's assignment record, regardless of status
    pub fn assignment(&self, client_id: ClientId) -> Result<Option<Assignment>> {
        let state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        Ok(state.assignments.get(&client_id).cloned())
    }

    pub fn stats(&self) -> Result<BalancerStats> {
        let state = self.state.lock().map_err(|_| SalesOpsError::StorePoisoned)?;
        Ok(state.stats)
    }
}
