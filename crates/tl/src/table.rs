//! Tables: flat associative containers keyed by any keyable value.

use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::key::Keys;
use crate::value::{Table, TableId, Value};
use tl_mem::{FitOutcome, FitPolicy, HashTable, HtError};

impl Heap {
    /// A new empty table.
    ///
    /// # Errors
    ///
    /// [`Error::HashTable`] for a zero capacity, [`Error::OutOfMemory`] if
    /// anything is refused.
    pub fn new_table(&mut self, capacity: usize) -> Result<TableId> {
        let map = HashTable::with_capacity(capacity, &mut *self.alloc)?;
        match self.tables.try_alloc(Table { map }, &mut *self.alloc) {
            Ok(id) => Ok(id),
            Err((table, err)) => {
                table.map.release(&mut *self.alloc);
                Err(err.into())
            }
        }
    }

    /// Maps `key` to `value`, replacing the value of an equal key. Returns
    /// the replaced value.
    ///
    /// # Errors
    ///
    /// [`Error::Unkeyable`] or [`Error::MultipartKey`] for keys that cannot
    /// be hashed, [`Error::InvalidHandle`], [`Error::OutOfMemory`].
    pub fn table_insert(&mut self, table: TableId, key: Value, value: Value) -> Result<Option<Value>> {
        let keys = Keys { strings: &self.strings, segments: &self.segments };
        let hash = keys.hash(key)?;
        let target = self.tables.get_mut(table).ok_or(Error::InvalidHandle)?;
        let replaced = target.map.insert(hash, key, value, |a, b| keys.eq(a, b), &mut *self.alloc)?;
        Ok(replaced.map(|(_, old)| old))
    }

    /// The value for `key`, or `Ok(None)`.
    ///
    /// # Errors
    ///
    /// As for [`Heap::table_insert`], minus allocation.
    pub fn table_get(&self, table: TableId, key: Value) -> Result<Option<Value>> {
        let keys = self.keys();
        let hash = keys.hash(key)?;
        let target = self.tables.get(table).ok_or(Error::InvalidHandle)?;
        Ok(target.map.get(hash, &key, |a, b| keys.eq(a, b)).map(|(_, v)| *v))
    }

    /// Replaces the value of an existing key.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn table_set(&mut self, table: TableId, key: Value, value: Value) -> Result<()> {
        let keys = Keys { strings: &self.strings, segments: &self.segments };
        let hash = keys.hash(key)?;
        let target = self.tables.get_mut(table).ok_or(Error::InvalidHandle)?;
        match target.map.get_mut(hash, &key, |a, b| keys.eq(a, b)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => {
                tl_log::debug!("set of absent {} key", key.type_name());
                Err(Error::KeyNotFound)
            }
        }
    }

    /// Removes `key`, returning its value, or `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// As for [`Heap::table_get`].
    pub fn table_remove(&mut self, table: TableId, key: Value) -> Result<Option<Value>> {
        let keys = Keys { strings: &self.strings, segments: &self.segments };
        let hash = keys.hash(key)?;
        let target = self.tables.get_mut(table).ok_or(Error::InvalidHandle)?;
        match target.map.remove(hash, &key, |a, b| keys.eq(a, b), &mut *self.alloc) {
            Ok((_, value)) => Ok(Some(value)),
            Err(HtError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Runs [`HashTable::fit`] on a table.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`], or the engine's parameter and allocation
    /// errors.
    pub fn table_fit(&mut self, table: TableId, policy: FitPolicy) -> Result<FitOutcome> {
        let target = self.tables.get_mut(table).ok_or(Error::InvalidHandle)?;
        Ok(target.map.fit(policy, &mut *self.alloc)?)
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`].
    pub fn table_len(&self, table: TableId) -> Result<usize> {
        Ok(self.tables.get(table).ok_or(Error::InvalidHandle)?.map.len())
    }

    /// Bucket-array capacity.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`].
    pub fn table_capacity(&self, table: TableId) -> Result<usize> {
        Ok(self.tables.get(table).ok_or(Error::InvalidHandle)?.map.capacity())
    }

    /// Entries in insertion order.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`].
    pub fn table_entries(&self, table: TableId) -> Result<Vec<(Value, Value)>> {
        let target = self.tables.get(table).ok_or(Error::InvalidHandle)?;
        Ok(target.map.iter().map(|(k, v)| (*k, *v)).collect())
    }
}
