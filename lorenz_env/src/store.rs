//! State store abstraction and the in-process reference store.

use crate::error::StoreError;
use crate::types::{Handle, StateVector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Key/value store for bulk state payloads.
///
/// # Contract
///
/// - `put` stores a copy; the caller keeps ownership of its own value.
/// - `get` returns a fresh, independently owned copy. Mutating it never
///   affects a later `get` of the same handle.
/// - Implementations do their own locking; callers share them freely.
pub trait StateStore: Send + Sync + 'static {
    /// Stores `value` and returns a handle to it.
    fn put(&self, value: &StateVector, label: &str) -> Result<Handle, StoreError>;

    /// Resolves a handle to a copy of its value.
    fn get(&self, handle: &Handle) -> Result<StateVector, StoreError>;

    /// Drops a value no reader will ever resolve.
    fn remove(&self, handle: &Handle) -> Result<(), StoreError>;
}

/// In-memory store shared between actors of one process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<Uuid, StateVector>>>,

    /// Maximum number of entries (None = unbounded)
    capacity: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses writes once `capacity` entries exist.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            capacity: Some(capacity),
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemoryStore {
    fn put(&self, value: &StateVector, label: &str) -> Result<Handle, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;

        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity {
                return Err(StoreError::Full(capacity));
            }
        }

        let handle = Handle::new(label);
        entries.insert(handle.id(), value.clone());
        Ok(handle)
    }

    fn get(&self, handle: &Handle) -> Result<StateVector, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    fn remove(&self, handle: &Handle) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries
            .remove(&handle.id())
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }
}
