use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::errors::{Result, SalesOpsError};
use crate::types::{Seller, SellerId, SellerStatus};

/// in-memory seller store
///
/// the shape is storage-technology-agnostic: every operation here is the
/// unit a row-locking SQL implementation would also have to make atomic.
/// load counters are mutated only through `increment_load` / `decrement_load`,
/// and only by the assignment balancer.
#[derive(Debug, Default)]
pub struct SellerDirectory {
    sellers: RwLock<HashMap<SellerId, Seller>>,
}

impl SellerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// insert or replace a seller record
    pub fn insert(&self, seller: Seller) -> Result<SellerId> {
        let mut sellers = self.sellers.write().map_err(|_| SalesOpsError::StorePoisoned)?;
        let id = seller.id;
        sellers.insert(id, seller);
        Ok(id)
    }

    pub fn find_by_id(&self, id: SellerId) -> Result<Option<Seller>> {
        let sellers = self.sellers.read().map_err(|_| SalesOpsError::StorePoisoned)?;
        Ok(sellers.get(&id).cloned())
    }

    /// sellers with `active = true` and a non-offline status
    ///
    /// sorted by id so callers iterating the pool see a stable order
    pub fn find_active(&self) -> Result<Vec<Seller>> {
        let sellers = self.sellers.read().map_err(|_| SalesOpsError::StorePoisoned)?;
        let mut active: Vec<Seller> = sellers.values().filter(|s| s.is_assignable()).cloned().collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }

    /// increment the seller's load and stamp `assigned_at`, returning the new load
    pub fn increment_load(&self, id: SellerId, at: DateTime<Utc>) -> Result<u32> {
        let mut sellers = self.sellers.write().map_err(|_| SalesOpsError::StorePoisoned)?;
        let seller = sellers
            .get_mut(&id)
            .ok_or(SalesOpsError::SellerNotFound { id })?;
        seller.current_clients += 1;
        seller.assigned_at = Some(at);
        Ok(seller.current_clients)
    }

    /// decrement the seller's load, flooring at zero, returning the new load
    pub fn decrement_load(&self, id: SellerId) -> Result<u32> {
        let mut sellers = self.sellers.write().map_err(|_| SalesOpsError::StorePoisoned)?;
        let seller = sellers
            .get_mut(&id)
            .ok_or(SalesOpsError::SellerNotFound { id })?;
        seller.current_clients = seller.current_clients.saturating_sub(1);
        Ok(seller.current_clients)
    }

    pub fn set_status(&self, id: SellerId, status: SellerStatus) -> Result<()> {
        let mut sellers = self.sellers.write().map_err(|_| SalesOpsError::StorePoisoned)?;
        let seller = sellers
            .get_mut(&id)
            .ok_or(SalesOpsError::SellerNotFound { id })?;
        seller.status = status;
        Ok(())
    }

    /// remove a seller; refused while the seller still carries active clients
    pub fn remove(&self, id: SellerId) -> Result<Seller> {
        let mut sellers = self.sellers.write().map_err(|_| SalesOpsError::StorePoisoned)?;
        match sellers.entry(id) {
            Entry::Occupied(entry) => {
                let current_clients = entry.get().current_clients;
                if current_clients > 0 {
                    return Err(SalesOpsError::SellerStillLoaded { id, current_clients });
                }
                Ok(entry.remove())
            }
            Entry::Vacant(_) => Err(SalesOpsError::SellerNotFound { id }),
        }
    }

    pub fn len(&self) -> usize {
        self.sellers.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_active_excludes_offline_and_inactive() {
        let dir = SellerDirectory::new();
        let a = dir.insert(Seller::new("Ana", "555-0001", 5)).unwrap();

        let mut offline = Seller::new("Beto", "555-0002", 5);
        offline.status = SellerStatus::Offline;
        dir.insert(offline).unwrap();

        let mut inactive = Seller::new("Carla", "555-0003", 5);
        inactive.active = false;
        dir.insert(inactive).unwrap();

        let active = dir.find_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a);
    }

    #[test]
    fn test_load_counters() {
        let dir = SellerDirectory::new();
        let id = dir.insert(Seller::new("Ana", "555-0001", 5)).unwrap();

        assert_eq!(dir.increment_load(id, Utc::now()).unwrap(), 1);
        assert_eq!(dir.increment_load(id, Utc::now()).unwrap(), 2);
        assert_eq!(dir.decrement_load(id).unwrap(), 1);
        assert_eq!(dir.decrement_load(id).unwrap(), 0);
        // floors at zero
        assert_eq!(dir.decrement_load(id).unwrap(), 0);
    }

    #[test]
    fn test_remove_refused_while_loaded() {
        let dir = SellerDirectory::new();
        let id = dir.insert(Seller::new("Ana", "555-0001", 5)).unwrap();
        dir.increment_load(id, Utc::now()).unwrap();

        assert!(matches!(
            dir.remove(id),
            Err(SalesOpsError::SellerStillLoaded { current_clients: 1, .. })
        ));

        dir.decrement_load(id).unwrap();
        assert!(dir.remove(id).is_ok());
        assert!(dir.is_empty());
    }

    #[test]
    fn test_unknown_seller() {
        let dir = SellerDirectory::new();
        let id = SellerId::new_v4();
        assert!(matches!(
            dir.increment_load(id, Utc::now()),
            Err(SalesOpsError::SellerNotFound { .. })
        ));
    }
}
