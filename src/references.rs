// ABOUTME: Per-call identity table mapping shared instances to sequential reference ids.
// ABOUTME: The write side keys on instance address; the read side holds reserved slots by id.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;

/// Sequential reference id, assigned in traversal order starting at 0.
pub type RefId = u64;

/// Identity map for one top-level write or read call.
///
/// Only identity-bearing values (lists, maps, instances) are ever registered.
/// Ids are assigned in the order instances are first encountered, which is
/// the same order on the write and the read side.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    /// Write side: instance address to id.
    written: HashMap<usize, RefId>,
    /// Registered handles, held so addresses stay unique for the whole call.
    retained: Vec<Value>,
    /// Read side: slot per id, `None` while reserved but not yet constructed.
    read: Vec<Option<Value>>,
}

impl ReferenceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all entries. Called once at the start of every top-level call.
    pub fn reset(&mut self) {
        self.written.clear();
        self.retained.clear();
        self.read.clear();
    }

    /// Number of ids assigned in the current call (write or read side).
    #[must_use]
    pub fn len(&self) -> usize {
        self.written.len().max(self.read.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `value` on the write side.
    ///
    /// Returns the existing id if the instance was already registered in this
    /// call, meaning only a back-reference should be emitted. Otherwise a new
    /// id is assigned and `None` is returned: the full value must be encoded.
    /// Values without identity are never registered and always return `None`.
    pub fn register(&mut self, value: &Value) -> Option<RefId> {
        let address = value.identity()?;
        if let Some(&id) = self.written.get(&address) {
            return Some(id);
        }
        let id = self.written.len() as RefId;
        self.written.insert(address, id);
        self.retained.push(value.clone());
        None
    }

    /// Reserve the next id on the read side, before its instance exists.
    pub fn reserve(&mut self) -> RefId {
        self.read.push(None);
        (self.read.len() - 1) as RefId
    }

    /// Store the (possibly partially constructed) instance for a reserved id.
    pub fn fill(&mut self, id: RefId, value: Value) {
        if let Some(slot) = usize::try_from(id).ok().and_then(|i| self.read.get_mut(i)) {
            *slot = Some(value);
        }
    }

    /// Returns true if `id` is reserved and still waiting for its instance.
    #[must_use]
    pub fn is_pending(&self, id: RefId) -> bool {
        matches!(self.slot(id), Some(None))
    }

    /// The instance previously constructed for a back-reference id.
    ///
    /// Fails with [`Error::DanglingBackReference`] for an id that was never
    /// assigned, and [`Error::IdentityMismatch`] for one that is reserved but
    /// whose instance has not been constructed yet.
    pub fn resolve(&self, id: RefId) -> Result<Value> {
        match self.slot(id) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(Error::IdentityMismatch(id)),
            None => Err(Error::DanglingBackReference(id)),
        }
    }

    fn slot(&self, id: RefId) -> Option<&Option<Value>> {
        usize::try_from(id).ok().and_then(|i| self.read.get(i))
    }
}
