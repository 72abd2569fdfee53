//! Memory infrastructure for the TL runtime.
//!
//! - [`alloc`]: allocation kinds and the pluggable [`Allocator`] capability
//! - [`arena`]: typed slot arenas, one per allocation kind
//! - [`hash`]: the byte and integer hash functions used for keys
//! - [`hashtable`]: the chained hash table engine behind environments and tables

#![warn(missing_docs)]

pub mod alloc;
pub mod arena;
pub mod hash;
pub mod hashtable;

pub use alloc::{AllocError, AllocKind, AllocStats, Allocator, KindStats, SystemAllocator, TrackingAllocator};
pub use arena::{Arena, ArenaIndex, ArenaStats};
pub use hash::{mix_int, one_at_a_time};
pub use hashtable::{FitOutcome, FitPolicy, HashTable, HtError};
