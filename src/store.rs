//! Process-wide shared data.
//!
//! Every controller instance sees the same [`SharedStore`] through its
//! [`Context`](crate::Context). The store is a concurrent map: any number of
//! blocking workers may read and write it at once. Entries never expire.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::info;

static GLOBAL: OnceCell<SharedStore> = OnceCell::new();

/// A concurrent key/value map shared by reference.
///
/// Cloning is cheap and yields a handle to the *same* map. A missing key and
/// a key that was never written are indistinguishable from [`get`](Self::get).
pub struct SharedStore<K = String, V = Value>
where
    K: Eq + Hash,
{
    map: Arc<DashMap<K, V>>,
}

impl SharedStore {
    /// The process instance. Created on first use; concurrent first callers
    /// all observe the one instance that won initialisation.
    pub fn global() -> &'static SharedStore {
        GLOBAL.get_or_init(|| {
            info!("initialized shared data store");
            SharedStore::new()
        })
    }
}

impl<K, V> SharedStore<K, V>
where
    K: Eq + Hash,
{
    /// A fresh, empty store not connected to [`SharedStore::global`].
    pub fn new() -> Self {
        Self { map: Arc::new(DashMap::new()) }
    }

    /// Adds or replaces the value for `key`.
    pub fn put(&self, key: impl Into<K>, value: V) {
        self.map.insert(key.into(), value);
    }

    /// Looks `key` up in any borrowed form of `K`, e.g. `&str` for `String`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.map.get(key).map(|v| v.value().clone())
    }

    /// Removes `key`, returning the value it held.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key).map(|(_, v)| v)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Snapshot of the keys present right now.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.map.iter().map(|e| e.key().clone()).collect()
    }
}

impl<K: Eq + Hash, V> Clone for SharedStore<K, V> {
    fn clone(&self) -> Self {
        Self { map: Arc::clone(&self.map) }
    }
}

impl<K: Eq + Hash, V> Default for SharedStore<K, V> {
    fn default() -> Self { Self::new() }
}

impl<K: Eq + Hash, V> std::fmt::Debug for SharedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore").field("len", &self.map.len()).finish()
    }
}
