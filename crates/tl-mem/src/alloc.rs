//! Allocation kinds and the pluggable allocator capability.
//!
//! Every heap-owning structure in the runtime asks an [`Allocator`] before it
//! takes memory, naming both the size in bytes and the semantic
//! [`AllocKind`]. The allocator may refuse; a refusal is an ordinary
//! [`AllocError`] that callers unwind from, never an abort.
//!
//! Storage itself lives in typed arenas (see [`crate::arena`]), so an
//! allocator is the policy half of the pair: it grants, accounts and limits.
//!
//! # Examples
//!
//! ```
//! use tl_mem::{AllocKind, Allocator, TrackingAllocator};
//!
//! let mut alloc = TrackingAllocator::new().with_kind_limit(AllocKind::Node, 64);
//! assert!(alloc.allocate(AllocKind::Node, 48).is_ok());
//! assert!(alloc.allocate(AllocKind::Node, 48).is_err());
//!
//! alloc.deallocate(AllocKind::Node, 48);
//! assert_eq!(alloc.live_bytes(AllocKind::Node), 0);
//! ```

use std::fmt;

/// What an allocation is for.
///
/// A custom allocator can use the kind to pick a strategy per kind, for
/// example a separate budget for string bytes and cons cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AllocKind {
    /// The evaluation stack's value array.
    Stack,
    /// A cons cell.
    Node,
    /// A string header (length and buffer handle).
    StrHeader,
    /// A string's raw bytes.
    StrBytes,
    /// One segment of a (possibly dotted) symbol.
    SymbolSegment,
    /// One hash table entry.
    HtBucket,
    /// A hash table's capacity-indexed chain-head array.
    BucketArray,
    /// An environment scope.
    Env,
    /// A table object.
    Table,
    /// A function or macro object.
    Function,
}

impl AllocKind {
    /// Number of kinds.
    pub const COUNT: usize = 10;

    /// All kinds, in declaration order.
    pub const ALL: [AllocKind; Self::COUNT] = [
        AllocKind::Stack,
        AllocKind::Node,
        AllocKind::StrHeader,
        AllocKind::StrBytes,
        AllocKind::SymbolSegment,
        AllocKind::HtBucket,
        AllocKind::BucketArray,
        AllocKind::Env,
        AllocKind::Table,
        AllocKind::Function,
    ];

    /// Dense index, usable for per-kind arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AllocKind::Stack => "stack",
            AllocKind::Node => "node",
            AllocKind::StrHeader => "string header",
            AllocKind::StrBytes => "string bytes",
            AllocKind::SymbolSegment => "symbol segment",
            AllocKind::HtBucket => "hash bucket",
            AllocKind::BucketArray => "bucket array",
            AllocKind::Env => "environment",
            AllocKind::Table => "table",
            AllocKind::Function => "function",
        }
    }
}

impl fmt::Display for AllocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An allocation request the allocator refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    /// Kind of the refused request.
    pub kind: AllocKind,
    /// Requested size in bytes.
    pub size: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out of memory: {} bytes of {}", self.size, self.kind)
    }
}

impl std::error::Error for AllocError {}

/// Accounting for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Bytes currently granted and not yet returned.
    pub live_bytes: usize,
    /// Allocations currently outstanding.
    pub live_count: usize,
    /// Allocations ever granted.
    pub total_count: usize,
    /// Requests refused.
    pub refused: usize,
}

/// Per-kind accounting snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Indexed by [`AllocKind::index`].
    pub kinds: [KindStats; AllocKind::COUNT],
}

impl AllocStats {
    /// Stats for one kind.
    #[must_use]
    pub fn kind(&self, kind: AllocKind) -> KindStats {
        self.kinds[kind.index()]
    }

    /// Bytes outstanding across all kinds.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.kinds.iter().map(|k| k.live_bytes).sum()
    }

    /// Allocations outstanding across all kinds.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.kinds.iter().map(|k| k.live_count).sum()
    }
}

/// The allocation capability every heap-owning structure goes through.
///
/// Only [`Allocator::allocate`] is required. `deallocate` and `destroy`
/// default to no-ops, for allocators that release everything at once or
/// never need to.
pub trait Allocator {
    /// Grants or refuses `size` bytes of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when the request cannot be satisfied.
    fn allocate(&mut self, kind: AllocKind, size: usize) -> Result<(), AllocError>;

    /// Returns `size` bytes of `kind` granted earlier.
    fn deallocate(&mut self, kind: AllocKind, size: usize) {
        let _ = (kind, size);
    }

    /// Called once when the owning runtime goes away.
    fn destroy(&mut self) {}

    /// Accounting snapshot, if this allocator keeps one.
    fn stats(&self) -> Option<AllocStats> {
        None
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn allocate(&mut self, kind: AllocKind, size: usize) -> Result<(), AllocError> {
        (**self).allocate(kind, size)
    }

    fn deallocate(&mut self, kind: AllocKind, size: usize) {
        (**self).deallocate(kind, size);
    }

    fn destroy(&mut self) {
        (**self).destroy();
    }

    fn stats(&self) -> Option<AllocStats> {
        (**self).stats()
    }
}

/// Grants every request and keeps no books.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&mut self, _kind: AllocKind, _size: usize) -> Result<(), AllocError> {
        Ok(())
    }
}

/// Counts every grant and release per kind, with optional limits.
///
/// Limits make it possible to drive each out-of-memory path on purpose:
/// a total byte limit, a per-kind byte limit, or failing after a fixed
/// number of successful grants.
#[derive(Debug, Clone, Default)]
pub struct TrackingAllocator {
    stats: AllocStats,
    total_limit: Option<usize>,
    kind_limits: [Option<usize>; AllocKind::COUNT],
    grants_left: Option<usize>,
    destroyed: bool,
}

impl TrackingAllocator {
    /// An allocator with no limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the bytes outstanding across all kinds.
    #[must_use]
    pub fn with_total_limit(mut self, bytes: usize) -> Self {
        self.total_limit = Some(bytes);
        self
    }

    /// Caps the bytes outstanding for one kind.
    #[must_use]
    pub fn with_kind_limit(mut self, kind: AllocKind, bytes: usize) -> Self {
        self.kind_limits[kind.index()] = Some(bytes);
        self
    }

    /// Refuses every request after `grants` more successful ones.
    #[must_use]
    pub fn failing_after(mut self, grants: usize) -> Self {
        self.grants_left = Some(grants);
        self
    }

    /// Lifts the grant countdown set by [`TrackingAllocator::failing_after`].
    pub fn stop_failing(&mut self) {
        self.grants_left = None;
    }

    /// Bytes outstanding for `kind`.
    #[must_use]
    pub fn live_bytes(&self, kind: AllocKind) -> usize {
        self.stats.kind(kind).live_bytes
    }

    /// Whether [`Allocator::destroy`] has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn refuse(&mut self, kind: AllocKind, size: usize) -> Result<(), AllocError> {
        self.stats.kinds[kind.index()].refused += 1;
        tl_log::debug!("refused {size} bytes of {kind}");
        Err(AllocError { kind, size })
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&mut self, kind: AllocKind, size: usize) -> Result<(), AllocError> {
        if self.grants_left == Some(0) {
            return self.refuse(kind, size);
        }
        if let Some(limit) = self.total_limit {
            if self.stats.live_bytes().saturating_add(size) > limit {
                return self.refuse(kind, size);
            }
        }
        if let Some(limit) = self.kind_limits[kind.index()] {
            if self.stats.kind(kind).live_bytes.saturating_add(size) > limit {
                return self.refuse(kind, size);
            }
        }

        if let Some(left) = self.grants_left.as_mut() {
            *left -= 1;
        }
        let entry = &mut self.stats.kinds[kind.index()];
        entry.live_bytes += size;
        entry.live_count += 1;
        entry.total_count += 1;
        Ok(())
    }

    fn deallocate(&mut self, kind: AllocKind, size: usize) {
        let entry = &mut self.stats.kinds[kind.index()];
        debug_assert!(entry.live_count > 0, "release of {kind} with nothing outstanding");
        entry.live_bytes = entry.live_bytes.saturating_sub(size);
        entry.live_count = entry.live_count.saturating_sub(1);
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }

    fn stats(&self) -> Option<AllocStats> {
        Some(self.stats)
    }
}
