//! Chained hash table with an insertion-ordered entry list.
//!
//! Each [`Bucket`] is threaded through two structures at once:
//!
//! - its collision chain, reached from `heads[hash % capacity]` through
//!   `next_col`
//! - the global list of all live buckets in insertion order, through
//!   `prev`/`next`, with the table holding `first` and `last`
//!
//! Buckets live in an [`Arena`] and link to each other by index, so both
//! structures are plain integers and unlinking is O(1) in both.
//!
//! The engine knows nothing about key types. Callers pass the precomputed
//! hash and an equality callback, which is how environments (identifier
//! keys) and tables (any keyable value) share it.
//!
//! Resizing is explicit: [`HashTable::fit`] moves the load factor back into a
//! band, and is never called by the engine itself.
//!
//! # Examples
//!
//! ```
//! use tl_mem::{FitOutcome, FitPolicy, HashTable, SystemAllocator, mix_int};
//!
//! let mut alloc = SystemAllocator;
//! let mut table: HashTable<u64, &str> = HashTable::with_capacity(2, &mut alloc).unwrap();
//! let eq = |a: &u64, b: &u64| a == b;
//!
//! for (k, v) in [(1, "one"), (2, "two"), (3, "three")] {
//!     table.insert(mix_int(k), k, v, eq, &mut alloc).unwrap();
//! }
//! assert_eq!(table.get(mix_int(2), &2, eq), Some((&2, &"two")));
//!
//! // 3 entries in 2 slots: grow until the load factor is at most 0.75.
//! let outcome = table.fit(FitPolicy::GROW, &mut alloc).unwrap();
//! assert_eq!(outcome, FitOutcome::Resized { from: 2, to: 4 });
//!
//! // Iteration follows insertion order, whatever the capacity.
//! let keys: Vec<u64> = table.iter().map(|(k, _)| *k).collect();
//! assert_eq!(keys, vec![1, 2, 3]);
//! ```

use crate::alloc::{AllocError, AllocKind, Allocator};
use crate::arena::Arena;
use std::fmt;

/// Largest bucket-array capacity [`HashTable::fit`] will grow to.
pub const MAX_CAPACITY: usize = 1 << 30;

/// Errors of the hash table engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HtError {
    /// No bucket matched the search key.
    NotFound,
    /// A bucket array needs between 1 and [`MAX_CAPACITY`] slots.
    InvalidCapacity(usize),
    /// Load-factor bounds outside `[0, 1)` / `(0, 1]`, or not ordered.
    InvalidRatio {
        /// Requested lower bound.
        lower: f64,
        /// Requested upper bound.
        upper: f64,
    },
    /// Resize factor not greater than 1.
    InvalidFactor(f64),
    /// The allocator refused a bucket or a bucket array.
    OutOfMemory(AllocError),
}

impl fmt::Display for HtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtError::NotFound => write!(f, "no matching entry"),
            HtError::InvalidCapacity(cap) => write!(f, "invalid bucket array capacity {cap}"),
            HtError::InvalidRatio { lower, upper } => {
                write!(f, "invalid load factor band [{lower}, {upper}]")
            }
            HtError::InvalidFactor(factor) => {
                write!(f, "resize factor must be greater than 1, got {factor}")
            }
            HtError::OutOfMemory(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for HtError {}

impl From<AllocError> for HtError {
    fn from(err: AllocError) -> Self {
        HtError::OutOfMemory(err)
    }
}

/// Target load-factor band and step for [`HashTable::fit`].
///
/// `lower == 0.0` never shrinks; `upper == 1.0` never grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPolicy {
    /// Smallest acceptable `len / capacity`, in `[0, 1)`.
    pub lower: f64,
    /// Largest acceptable `len / capacity`, in `(0, 1]`.
    pub upper: f64,
    /// Capacity is multiplied or divided by this per step; must exceed 1.
    pub factor: f64,
}

impl FitPolicy {
    /// Grow-only policy, for use after insertions.
    pub const GROW: FitPolicy = FitPolicy { lower: 0.0, upper: 0.75, factor: 2.0 };

    /// Shrink-only policy, for use after removals.
    pub const SHRINK: FitPolicy = FitPolicy { lower: 0.25, upper: 1.0, factor: 2.0 };

    /// Checks bounds and factor.
    ///
    /// # Errors
    ///
    /// [`HtError::InvalidFactor`] or [`HtError::InvalidRatio`].
    pub fn validate(&self) -> Result<(), HtError> {
        let FitPolicy { lower, upper, factor } = *self;
        if !(factor > 1.0) || !factor.is_finite() {
            return Err(HtError::InvalidFactor(factor));
        }
        let lower_ok = (0.0..1.0).contains(&lower);
        let upper_ok = upper > 0.0 && upper <= 1.0;
        if !lower_ok || !upper_ok || lower >= upper {
            return Err(HtError::InvalidRatio { lower, upper });
        }
        Ok(())
    }

    fn shrinks(&self) -> bool {
        self.lower > 0.0
    }

    fn grows(&self) -> bool {
        self.upper < 1.0
    }
}

/// What [`HashTable::fit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitOutcome {
    /// The load factor was already inside the band.
    Unchanged,
    /// Buckets were rehashed into a new array.
    Resized {
        /// Previous capacity.
        from: usize,
        /// New capacity.
        to: usize,
    },
    /// No capacity reachable by the factor lands inside the band; nothing
    /// was changed.
    Infeasible,
}

/// One entry, linked into its collision chain and the insertion-order list.
struct Bucket<K, V> {
    hash: u64,
    key: K,
    value: V,
    next_col: Option<u32>,
    prev: Option<u32>,
    next: Option<u32>,
}

/// The chained hash table engine.
pub struct HashTable<K, V> {
    heads: Vec<Option<u32>>,
    buckets: Arena<u32, Bucket<K, V>>,
    first: Option<u32>,
    last: Option<u32>,
    len: usize,
}

fn array_bytes(capacity: usize) -> usize {
    capacity * std::mem::size_of::<Option<u32>>()
}

impl<K, V> HashTable<K, V> {
    /// An empty table with `capacity` chain heads.
    ///
    /// # Errors
    ///
    /// [`HtError::InvalidCapacity`] for zero or oversized capacities,
    /// [`HtError::OutOfMemory`] if the bucket array is refused.
    pub fn with_capacity<A>(capacity: usize, alloc: &mut A) -> Result<Self, HtError>
    where
        A: Allocator + ?Sized,
    {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(HtError::InvalidCapacity(capacity));
        }
        alloc.allocate(AllocKind::BucketArray, array_bytes(capacity))?;
        Ok(Self {
            heads: vec![None; capacity],
            buckets: Arena::new(AllocKind::HtBucket),
            first: None,
            last: None,
            len: 0,
        })
    }

    /// Live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chain heads in the bucket array.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.heads.len()
    }

    /// `len / capacity`.
    #[must_use]
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.heads.len() as f64
    }

    fn slot(&self, hash: u64) -> usize {
        (hash % self.heads.len() as u64) as usize
    }

    fn bucket(&self, idx: u32) -> &Bucket<K, V> {
        self.buckets.get(idx).expect("hash table links a vacant bucket")
    }

    fn bucket_mut(&mut self, idx: u32) -> &mut Bucket<K, V> {
        self.buckets.get_mut(idx).expect("hash table links a vacant bucket")
    }

    /// Finds the bucket matching `query`, with its predecessor in the chain.
    fn find<Q, F>(&self, hash: u64, query: &Q, eq: F) -> Option<(Option<u32>, u32)>
    where
        Q: ?Sized,
        F: Fn(&K, &Q) -> bool,
    {
        let mut prev = None;
        let mut cur = self.heads[self.slot(hash)];
        while let Some(idx) = cur {
            let bucket = self.bucket(idx);
            if bucket.hash == hash && eq(&bucket.key, query) {
                return Some((prev, idx));
            }
            prev = Some(idx);
            cur = bucket.next_col;
        }
        None
    }

    fn chain_tail(&self, slot: usize) -> Option<u32> {
        let mut cur = self.heads[slot]?;
        while let Some(next) = self.bucket(cur).next_col {
            cur = next;
        }
        Some(cur)
    }

    /// Inserts `key -> value`.
    ///
    /// If a bucket with the same hash and an `eq`-equal key exists, its key
    /// and value are replaced in place (same bucket, same list position)
    /// and the old pair is handed back. Otherwise a new bucket is appended
    /// to its chain and to the end of the insertion-order list.
    ///
    /// # Errors
    ///
    /// [`HtError::OutOfMemory`] if a new bucket is refused; the table is
    /// unchanged and `key`/`value` are dropped.
    pub fn insert<F, A>(
        &mut self,
        hash: u64,
        key: K,
        value: V,
        eq: F,
        alloc: &mut A,
    ) -> Result<Option<(K, V)>, HtError>
    where
        F: Fn(&K, &K) -> bool,
        A: Allocator + ?Sized,
    {
        if let Some((_, idx)) = self.find(hash, &key, eq) {
            let bucket = self.bucket_mut(idx);
            let old_key = std::mem::replace(&mut bucket.key, key);
            let old_value = std::mem::replace(&mut bucket.value, value);
            return Ok(Some((old_key, old_value)));
        }

        let slot = self.slot(hash);
        let tail = self.chain_tail(slot);
        let idx = self.buckets.alloc(
            Bucket { hash, key, value, next_col: None, prev: self.last, next: None },
            alloc,
        )?;

        match tail {
            Some(tail) => self.bucket_mut(tail).next_col = Some(idx),
            None => self.heads[slot] = Some(idx),
        }
        match self.last {
            Some(last) => self.bucket_mut(last).next = Some(idx),
            None => self.first = Some(idx),
        }
        self.last = Some(idx);
        self.len += 1;
        Ok(None)
    }

    /// Unlinks the bucket matching `query` from its chain and from the
    /// insertion-order list, and hands back its key and value.
    ///
    /// # Errors
    ///
    /// [`HtError::NotFound`] if nothing matches.
    pub fn remove<Q, F, A>(&mut self, hash: u64, query: &Q, eq: F, alloc: &mut A) -> Result<(K, V), HtError>
    where
        Q: ?Sized,
        F: Fn(&K, &Q) -> bool,
        A: Allocator + ?Sized,
    {
        let (chain_prev, idx) = self.find(hash, query, eq).ok_or(HtError::NotFound)?;
        let (next_col, prev, next) = {
            let bucket = self.bucket(idx);
            (bucket.next_col, bucket.prev, bucket.next)
        };

        match chain_prev {
            Some(p) => self.bucket_mut(p).next_col = next_col,
            None => {
                let slot = self.slot(hash);
                self.heads[slot] = next_col;
            }
        }
        match prev {
            Some(p) => self.bucket_mut(p).next = next,
            None => self.first = next,
        }
        match next {
            Some(n) => self.bucket_mut(n).prev = prev,
            None => self.last = prev,
        }

        self.len -= 1;
        let bucket = self.buckets.free(idx, alloc).expect("found bucket is live");
        Ok((bucket.key, bucket.value))
    }

    /// The entry matching `query`. Absence is `None`, not an error.
    pub fn get<Q, F>(&self, hash: u64, query: &Q, eq: F) -> Option<(&K, &V)>
    where
        Q: ?Sized,
        F: Fn(&K, &Q) -> bool,
    {
        let (_, idx) = self.find(hash, query, eq)?;
        let bucket = self.bucket(idx);
        Some((&bucket.key, &bucket.value))
    }

    /// Mutable access to the value matching `query`.
    pub fn get_mut<Q, F>(&mut self, hash: u64, query: &Q, eq: F) -> Option<&mut V>
    where
        Q: ?Sized,
        F: Fn(&K, &Q) -> bool,
    {
        let (_, idx) = self.find(hash, query, eq)?;
        Some(&mut self.bucket_mut(idx).value)
    }

    /// Resizes the bucket array so that `policy.lower <= len / capacity <=
    /// policy.upper`, stepping capacity by `policy.factor`.
    ///
    /// Only chains are rebuilt; the insertion-order list threads through the
    /// buckets themselves and is untouched.
    ///
    /// # Errors
    ///
    /// Invalid policies are rejected before anything is looked at; an
    /// allocator refusal of the new array leaves the table as it was.
    pub fn fit<A>(&mut self, policy: FitPolicy, alloc: &mut A) -> Result<FitOutcome, HtError>
    where
        A: Allocator + ?Sized,
    {
        policy.validate()?;

        let cap = self.heads.len();
        let len = self.len as f64;
        let ratio = len / cap as f64;
        let mut target = cap;

        if policy.shrinks() && ratio < policy.lower {
            loop {
                let old = target;
                target = (target as f64 / policy.factor) as usize;
                if target >= old {
                    target = old - 1;
                }
                if target == 0 {
                    return Ok(FitOutcome::Infeasible);
                }
                if len / (target as f64) >= policy.lower {
                    break;
                }
            }
            if len / (target as f64) > policy.upper {
                return Ok(FitOutcome::Infeasible);
            }
        } else if policy.grows() && ratio > policy.upper {
            loop {
                let old = target;
                target = (target as f64 * policy.factor) as usize;
                if target <= old {
                    target = old + 1;
                }
                if target > MAX_CAPACITY {
                    return Ok(FitOutcome::Infeasible);
                }
                if len / (target as f64) <= policy.upper {
                    break;
                }
            }
            if len / (target as f64) < policy.lower {
                return Ok(FitOutcome::Infeasible);
            }
        } else {
            return Ok(FitOutcome::Unchanged);
        }

        self.rehash(target, alloc)?;
        Ok(FitOutcome::Resized { from: cap, to: target })
    }

    fn rehash<A>(&mut self, capacity: usize, alloc: &mut A) -> Result<(), HtError>
    where
        A: Allocator + ?Sized,
    {
        alloc.allocate(AllocKind::BucketArray, array_bytes(capacity))?;

        let mut heads = vec![None; capacity];
        // Walking backwards and pushing onto chain fronts keeps every chain
        // in insertion order.
        let mut cur = self.last;
        while let Some(idx) = cur {
            let bucket = self.bucket_mut(idx);
            let slot = (bucket.hash % capacity as u64) as usize;
            bucket.next_col = heads[slot];
            heads[slot] = Some(idx);
            cur = bucket.prev;
        }

        let old = std::mem::replace(&mut self.heads, heads);
        alloc.deallocate(AllocKind::BucketArray, array_bytes(old.len()));
        Ok(())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter { table: self, cur: self.first, left: self.len }
    }

    /// Drops every entry, keeping the bucket array.
    pub fn clear<A>(&mut self, alloc: &mut A)
    where
        A: Allocator + ?Sized,
    {
        self.buckets.release_all(alloc);
        self.heads.iter_mut().for_each(|head| *head = None);
        self.first = None;
        self.last = None;
        self.len = 0;
    }

    /// Returns every accounted byte (buckets and bucket array) to `alloc`.
    pub fn release<A>(mut self, alloc: &mut A)
    where
        A: Allocator + ?Sized,
    {
        self.clear(alloc);
        alloc.deallocate(AllocKind::BucketArray, array_bytes(self.heads.len()));
    }

    /// Checks both linkages against each other.
    ///
    /// # Errors
    ///
    /// A description of the first inconsistency found.
    pub fn validate(&self) -> Result<(), String> {
        let mut count = 0;
        let mut prev = None;
        let mut cur = self.first;
        while let Some(idx) = cur {
            let bucket = self.buckets.get(idx).ok_or_else(|| format!("list reaches vacant bucket {idx}"))?;
            if bucket.prev != prev {
                return Err(format!("bucket {idx} has a stale prev link"));
            }
            let mut in_chain = false;
            let mut chain = self.heads[self.slot(bucket.hash)];
            while let Some(c) = chain {
                if c == idx {
                    in_chain = true;
                    break;
                }
                chain = self.bucket(c).next_col;
            }
            if !in_chain {
                return Err(format!("bucket {idx} is missing from its chain"));
            }
            count += 1;
            if count > self.len {
                return Err("insertion list is longer than len".to_string());
            }
            prev = Some(idx);
            cur = bucket.next;
        }
        if prev != self.last {
            return Err("last does not end the insertion list".to_string());
        }
        if count != self.len {
            return Err(format!("insertion list has {count} entries, len is {}", self.len));
        }

        let mut chained = 0;
        for (slot, head) in self.heads.iter().enumerate() {
            let mut chain = *head;
            while let Some(idx) = chain {
                let bucket = self.buckets.get(idx).ok_or_else(|| format!("chain reaches vacant bucket {idx}"))?;
                if self.slot(bucket.hash) != slot {
                    return Err(format!("bucket {idx} is chained under the wrong slot"));
                }
                chained += 1;
                if chained > self.len {
                    return Err("chains hold more buckets than len".to_string());
                }
                chain = bucket.next_col;
            }
        }
        if chained != self.len {
            return Err(format!("chains hold {chained} buckets, len is {}", self.len));
        }
        if self.buckets.len() != self.len {
            return Err("bucket arena and len disagree".to_string());
        }
        Ok(())
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Insertion-order iterator over a [`HashTable`].
pub struct Iter<'a, K, V> {
    table: &'a HashTable<K, V>,
    cur: Option<u32>,
    left: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let bucket = self.table.bucket(idx);
        self.cur = bucket.next;
        self.left -= 1;
        Some((&bucket.key, &bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left, Some(self.left))
    }
}

impl<'a, K, V> IntoIterator for &'a HashTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
