//! Environment scopes.
//!
//! A scope binds single-segment symbols to values and may have a parent.
//! Binding and removal touch only the given scope; lookup and `set` walk
//! up the parent chain.

use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::key::Keys;
use crate::value::{Env, EnvId, SymId, Value};
use tl_mem::{FitOutcome, FitPolicy, HashTable, HtError, one_at_a_time};

impl Heap {
    /// A new empty scope under `parent`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for a dead parent, [`Error::HashTable`] for a
    /// zero capacity, [`Error::OutOfMemory`] if anything is refused.
    pub fn new_env(&mut self, parent: Option<EnvId>, capacity: usize) -> Result<EnvId> {
        if parent.is_some_and(|p| !self.envs.contains(p)) {
            return Err(Error::InvalidHandle);
        }
        let bindings = HashTable::with_capacity(capacity, &mut *self.alloc)?;
        match self.envs.try_alloc(Env { bindings, parent }, &mut *self.alloc) {
            Ok(id) => Ok(id),
            Err((env, err)) => {
                env.bindings.release(&mut *self.alloc);
                Err(err.into())
            }
        }
    }

    /// The scope behind `id`.
    #[must_use]
    pub fn env(&self, id: EnvId) -> Option<&Env> {
        self.envs.get(id)
    }

    /// Frees a scope and its bindings table. Bound values are left to the
    /// collector.
    ///
    /// Child scopes must go first: lookups that reach a freed parent fail
    /// with [`Error::InvalidHandle`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if the scope is already gone.
    pub fn free_env(&mut self, id: EnvId) -> Result<()> {
        let env = self.envs.free(id, &mut *self.alloc).ok_or(Error::InvalidHandle)?;
        env.bindings.release(&mut *self.alloc);
        Ok(())
    }

    /// Binds `key` in `env` only, replacing an existing binding of the same
    /// name in that scope. Returns the replaced value.
    ///
    /// # Errors
    ///
    /// [`Error::MultipartKey`] for dotted symbols, [`Error::InvalidHandle`],
    /// or [`Error::OutOfMemory`].
    pub fn env_insert(&mut self, env: EnvId, key: SymId, value: Value) -> Result<Option<Value>> {
        let keys = Keys { strings: &self.strings, segments: &self.segments };
        let hash = keys.hash_ident(key)?;
        let scope = self.envs.get_mut(env).ok_or(Error::InvalidHandle)?;
        let replaced = scope
            .bindings
            .insert(hash, key, value, |a, b| keys.ident_eq(*a, *b), &mut *self.alloc)?;
        Ok(replaced.map(|(_, old)| old))
    }

    /// The nearest scope, starting at `env`, that binds `key`.
    fn env_find(&self, env: EnvId, key: SymId, hash: u64) -> Result<Option<EnvId>> {
        let keys = self.keys();
        let mut cur = Some(env);
        while let Some(id) = cur {
            let scope = self.envs.get(id).ok_or(Error::InvalidHandle)?;
            if scope.bindings.get(hash, &key, |a, b| keys.ident_eq(*a, *b)).is_some() {
                return Ok(Some(id));
            }
            cur = scope.parent;
        }
        Ok(None)
    }

    /// Looks `key` up from `env` outwards. An unbound name is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`Error::MultipartKey`] or [`Error::InvalidHandle`].
    pub fn env_get(&self, env: EnvId, key: SymId) -> Result<Option<Value>> {
        let keys = self.keys();
        let hash = keys.hash_ident(key)?;
        let Some(found) = self.env_find(env, key, hash)? else {
            return Ok(None);
        };
        let scope = self.envs.get(found).ok_or(Error::InvalidHandle)?;
        Ok(scope.bindings.get(hash, &key, |a, b| keys.ident_eq(*a, *b)).map(|(_, v)| *v))
    }

    /// Looks an identifier up by its text from `env` outwards, without
    /// building a symbol for it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if the chain reaches a freed scope.
    pub fn env_get_name(&self, env: EnvId, name: &[u8]) -> Result<Option<Value>> {
        let keys = self.keys();
        let hash = one_at_a_time(name);
        let mut cur = Some(env);
        while let Some(id) = cur {
            let scope = self.envs.get(id).ok_or(Error::InvalidHandle)?;
            let found = scope.bindings.get(hash, name, |k: &SymId, q: &[u8]| keys.ident(*k).is_ok_and(|t| t == q));
            if let Some((_, value)) = found {
                return Ok(Some(*value));
            }
            cur = scope.parent;
        }
        Ok(None)
    }

    /// Assigns to the nearest existing binding of `key`, searching from
    /// `env` outwards.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`] if no scope in the chain binds `key`; otherwise as
    /// for [`Heap::env_get`].
    pub fn env_set(&mut self, env: EnvId, key: SymId, value: Value) -> Result<()> {
        let hash = self.keys().hash_ident(key)?;
        let Some(found) = self.env_find(env, key, hash)? else {
            let name = self.symbol_text(key)?;
            tl_log::debug!("set of unbound identifier '{name}'");
            return Err(Error::Unbound { name });
        };

        let keys = Keys { strings: &self.strings, segments: &self.segments };
        let scope = self.envs.get_mut(found).ok_or(Error::InvalidHandle)?;
        let slot = scope
            .bindings
            .get_mut(hash, &key, |a, b| keys.ident_eq(*a, *b))
            .ok_or(Error::InvalidHandle)?;
        *slot = value;
        Ok(())
    }

    /// Unbinds `key` from `env` only. Returns the removed value, or
    /// `Ok(None)` if the scope did not bind it.
    ///
    /// # Errors
    ///
    /// [`Error::MultipartKey`] or [`Error::InvalidHandle`].
    pub fn env_remove(&mut self, env: EnvId, key: SymId) -> Result<Option<Value>> {
        let keys = Keys { strings: &self.strings, segments: &self.segments };
        let hash = keys.hash_ident(key)?;
        let scope = self.envs.get_mut(env).ok_or(Error::InvalidHandle)?;
        match scope.bindings.remove(hash, &key, |a, b| keys.ident_eq(*a, *b), &mut *self.alloc) {
            Ok((_, value)) => Ok(Some(value)),
            Err(HtError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Runs [`HashTable::fit`] on a scope's bindings.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`], or the engine's parameter and allocation
    /// errors.
    pub fn env_fit(&mut self, env: EnvId, policy: FitPolicy) -> Result<FitOutcome> {
        let scope = self.envs.get_mut(env).ok_or(Error::InvalidHandle)?;
        Ok(scope.bindings.fit(policy, &mut *self.alloc)?)
    }

    /// Bindings made directly in `env`, oldest first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`].
    pub fn env_bindings(&self, env: EnvId) -> Result<Vec<(SymId, Value)>> {
        let scope = self.envs.get(env).ok_or(Error::InvalidHandle)?;
        Ok(scope.bindings.iter().map(|(k, v)| (*k, *v)).collect())
    }
}
