use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::util::random_index;

/// Resolved addresses keyed by `host:port`.
///
/// Every operation holds the lock for its whole duration, so a concurrent
/// [`select`](AddressCache::select) never sees a set in the middle of a
/// [`bulk_insert`](AddressCache::bulk_insert). Entries are never evicted.
#[derive(Debug, Default)]
pub struct AddressCache {
    records: RwLock<HashMap<String, Vec<SocketAddr>>>,
}

impl AddressCache {
    /// Creates an empty cache.
    pub fn new() -> AddressCache {
        AddressCache::default()
    }

    /// Returns true if `key` has an entry.
    pub fn exists(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Appends `addr` to the set for `key`, creating the set if needed.
    pub fn insert(&self, key: &str, addr: SocketAddr) {
        self.write().entry(key.to_owned()).or_default().push(addr);
    }

    /// Appends every address in order. Duplicates are kept.
    ///
    /// No addresses means no entry: an empty `addrs` leaves the cache
    /// untouched.
    pub fn bulk_insert<I>(&self, key: &str, addrs: I)
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        let addrs: Vec<SocketAddr> = addrs.into_iter().collect();
        if addrs.is_empty() {
            return;
        }
        self.write().entry(key.to_owned()).or_default().extend(addrs);
    }

    /// Stores `addrs` for `key` only if `key` has no entry yet.
    ///
    /// Returns false, leaving the cache untouched, if someone got there
    /// first or if `addrs` is empty.
    pub fn populate(&self, key: &str, addrs: Vec<SocketAddr>) -> bool {
        if addrs.is_empty() {
            return false;
        }
        let mut records = self.write();
        if records.contains_key(key) {
            return false;
        }
        records.insert(key.to_owned(), addrs);
        true
    }

    /// Picks an address for `key`: a uniformly random one if `randomize`,
    /// otherwise the first one inserted.
    ///
    /// # Errors
    ///
    /// Fails with an empty-address-set error if `key` is absent or has no
    /// addresses.
    pub fn select(&self, key: &str, randomize: bool) -> crate::Result<SocketAddr> {
        let records = self.read();
        let addrs = match records.get(key) {
            Some(addrs) if !addrs.is_empty() => addrs,
            _ => return Err(crate::error::empty(key)),
        };
        if randomize {
            Ok(addrs[random_index(addrs.len())])
        } else {
            Ok(addrs[0])
        }
    }

    /// Number of addresses cached for `key`, 0 if absent.
    pub fn count(&self, key: &str) -> usize {
        self.read().get(key).map_or(0, Vec::len)
    }

    // A panic while holding the lock cannot leave a set half written:
    // every mutation is a single push/extend/insert.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<SocketAddr>>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<SocketAddr>>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}
