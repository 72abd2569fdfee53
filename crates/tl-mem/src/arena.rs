//! Typed slot arenas.
//!
//! An [`Arena`] stores values of one type for one [`AllocKind`] and hands out
//! small copyable indices instead of pointers. Freed slots go on a free list
//! and are reused before the arena grows. Growth happens in chunks that
//! double in size up to a ceiling, so a busy arena settles quickly.
//!
//! Each slot carries a generation that moves on every time the slot is
//! freed. Typed indices remember the generation they were issued for, so a
//! handle kept past a free finds nothing instead of the slot's next
//! occupant.
//!
//! Every allocation is first granted by an [`Allocator`]; every free is
//! reported back to it. An arena never hands out an index the allocator did
//! not approve.
//!
//! # Examples
//!
//! ```
//! use tl_mem::{AllocKind, Arena, SystemAllocator};
//!
//! let mut alloc = SystemAllocator;
//! let mut cells: Arena<u32, (i64, i64)> = Arena::new(AllocKind::Node);
//!
//! let a = cells.alloc((1, 2), &mut alloc).unwrap();
//! let b = cells.alloc((3, 4), &mut alloc).unwrap();
//! assert_eq!(cells.get(a), Some(&(1, 2)));
//!
//! cells.free(a, &mut alloc);
//! let c = cells.alloc((5, 6), &mut alloc).unwrap();
//! assert_eq!(c, a); // plain `u32` indices carry no generation
//! assert_eq!(cells.len(), 2);
//! # let _ = b;
//! ```

use crate::alloc::{AllocError, AllocKind, Allocator};
use std::marker::PhantomData;

/// Slots reserved by the first chunk.
const MIN_CHUNK_SLOTS: usize = 16;

/// Largest chunk reserved in one step.
const MAX_CHUNK_SLOTS: usize = 64 * 1024;

/// Highest slot number an index can name.
const MAX_SLOTS: usize = u32::MAX as usize;

/// A typed handle into an [`Arena`].
pub trait ArenaIndex: Copy + Eq {
    /// Builds a handle for `slot` as occupied at `generation`.
    fn from_parts(slot: u32, generation: u32) -> Self;

    /// The slot number.
    fn slot(self) -> u32;

    /// The generation the handle was issued for. `None` matches any
    /// generation.
    fn generation(self) -> Option<u32>;
}

impl ArenaIndex for u32 {
    fn from_parts(slot: u32, _generation: u32) -> Self {
        slot
    }

    fn slot(self) -> u32 {
        self
    }

    fn generation(self) -> Option<u32> {
        None
    }
}

/// Occupancy snapshot of an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Occupied slots.
    pub live: usize,
    /// Slots ever created (occupied or on the free list).
    pub slots: usize,
    /// Slots the backing storage can hold without growing.
    pub capacity: usize,
    /// Growth steps taken so far.
    pub chunks: usize,
}

struct Slot<T> {
    generation: u32,
    entry: Entry<T>,
}

enum Entry<T> {
    Occupied(T),
    Vacant { next_free: Option<u32> },
}

impl<T> Slot<T> {
    fn matches<I: ArenaIndex>(&self, index: I) -> bool {
        matches!(self.entry, Entry::Occupied(_)) && index.generation().is_none_or(|g| g == self.generation)
    }
}

/// Slot storage for one allocation kind.
pub struct Arena<I, T> {
    kind: AllocKind,
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    live: usize,
    chunks: usize,
    _index: PhantomData<fn() -> I>,
}

impl<I: ArenaIndex, T> Arena<I, T> {
    /// An empty arena whose allocations are accounted as `kind`.
    #[must_use]
    pub fn new(kind: AllocKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            free_head: None,
            live: 0,
            chunks: 0,
            _index: PhantomData,
        }
    }

    /// The kind every allocation from this arena is accounted as.
    #[must_use]
    pub fn kind(&self) -> AllocKind {
        self.kind
    }

    /// Bytes requested from the allocator per slot.
    #[must_use]
    pub fn slot_size() -> usize {
        std::mem::size_of::<T>().max(1)
    }

    /// Stores `value` and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator refuses the slot or the arena
    /// has run out of indices. `value` is dropped in that case.
    pub fn alloc<A>(&mut self, value: T, alloc: &mut A) -> Result<I, AllocError>
    where
        A: Allocator + ?Sized,
    {
        self.try_alloc(value, alloc).map_err(|(_, err)| err)
    }

    /// Like [`Arena::alloc`], but a refused `value` is handed back so the
    /// caller can release whatever it owns.
    ///
    /// # Errors
    ///
    /// The value together with the [`AllocError`].
    pub fn try_alloc<A>(&mut self, value: T, alloc: &mut A) -> Result<I, (T, AllocError)>
    where
        A: Allocator + ?Sized,
    {
        let size = Self::slot_size();
        if self.free_head.is_none() && self.slots.len() >= MAX_SLOTS {
            return Err((value, AllocError { kind: self.kind, size }));
        }
        if let Err(err) = alloc.allocate(self.kind, size) {
            return Err((value, err));
        }

        let (raw, generation) = match self.free_head {
            Some(raw) => {
                let slot = &mut self.slots[raw as usize];
                self.free_head = match slot.entry {
                    Entry::Vacant { next_free } => next_free,
                    Entry::Occupied(_) => unreachable!("free list points at an occupied slot"),
                };
                slot.entry = Entry::Occupied(value);
                (raw, slot.generation)
            }
            None => {
                self.grow_if_full();
                let raw = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, entry: Entry::Occupied(value) });
                (raw, 0)
            }
        };

        self.live += 1;
        Ok(I::from_parts(raw, generation))
    }

    fn grow_if_full(&mut self) {
        if self.slots.len() < self.slots.capacity() {
            return;
        }
        let step = self.slots.capacity().clamp(MIN_CHUNK_SLOTS, MAX_CHUNK_SLOTS);
        self.slots.reserve_exact(step);
        self.chunks += 1;
    }

    /// Removes the value at `index`, reporting the slot back to `alloc`.
    ///
    /// Returns `None` (and reports nothing) if `index` does not name an
    /// occupied slot, including a stale index whose slot was reused.
    pub fn free<A>(&mut self, index: I, alloc: &mut A) -> Option<T>
    where
        A: Allocator + ?Sized,
    {
        let raw = index.slot();
        let slot = self.slots.get_mut(raw as usize)?;
        if !slot.matches(index) {
            return None;
        }

        let old = std::mem::replace(&mut slot.entry, Entry::Vacant { next_free: self.free_head });
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = Some(raw);
        self.live -= 1;
        alloc.deallocate(self.kind, Self::slot_size());

        match old {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    /// Frees every occupied slot. Returns how many were freed.
    ///
    /// Slot storage is dropped too, so generations start over; only use it
    /// when no handle into the arena survives.
    pub fn release_all<A>(&mut self, alloc: &mut A) -> usize
    where
        A: Allocator + ?Sized,
    {
        let freed = self.live;
        for _ in 0..freed {
            alloc.deallocate(self.kind, Self::slot_size());
        }
        self.slots.clear();
        self.free_head = None;
        self.live = 0;
        freed
    }

    /// The value at `index`, if occupied by the object `index` was issued
    /// for.
    #[must_use]
    pub fn get(&self, index: I) -> Option<&T> {
        match self.slots.get(index.slot() as usize) {
            Some(slot) if slot.matches(index) => match &slot.entry {
                Entry::Occupied(value) => Some(value),
                Entry::Vacant { .. } => None,
            },
            _ => None,
        }
    }

    /// Mutable form of [`Arena::get`].
    pub fn get_mut(&mut self, index: I) -> Option<&mut T> {
        match self.slots.get_mut(index.slot() as usize) {
            Some(slot) if slot.matches(index) => match &mut slot.entry {
                Entry::Occupied(value) => Some(value),
                Entry::Vacant { .. } => None,
            },
            _ => None,
        }
    }

    /// Whether `index` names an occupied slot.
    #[must_use]
    pub fn contains(&self, index: I) -> bool {
        self.get(index).is_some()
    }

    /// Occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots ever created; every valid slot number is below this.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(raw, slot)| match &slot.entry {
            Entry::Occupied(value) => Some((I::from_parts(raw as u32, slot.generation), value)),
            Entry::Vacant { .. } => None,
        })
    }

    /// Indices of occupied slots, collected so the arena can be mutated
    /// while walking them.
    #[must_use]
    pub fn indices(&self) -> Vec<I> {
        self.iter().map(|(index, _)| index).collect()
    }

    /// Occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live: self.live,
            slots: self.slots.len(),
            capacity: self.slots.capacity(),
            chunks: self.chunks,
        }
    }
}

impl<I, T: std::fmt::Debug> std::fmt::Debug for Arena<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("kind", &self.kind)
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .finish()
    }
}
