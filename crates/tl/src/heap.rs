//! The object heap.
//!
//! One typed arena per allocation kind, plus the allocator every arena
//! reports to. Values are handles into these arenas; the heap is the only
//! place that turns a handle back into an object.
//!
//! Freeing is explicit ([`Heap::free`]) or done by the tracing collector
//! (see [`crate::gc`]). Both walk object graphs with an explicit work list,
//! so arbitrarily long lists never grow the native stack.

use crate::error::{Error, Result};
use crate::key::Keys;
use crate::value::{Closure, Env, EnvId, FuncId, Node, NodeId, Segment, Str, StrId, SymId, Table, TableId, Value};
use tl_mem::{AllocKind, AllocStats, Allocator, Arena, SystemAllocator};

/// Live object counts per arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Cons cells.
    pub nodes: usize,
    /// Strings, including symbol segment texts.
    pub strings: usize,
    /// Symbol segments.
    pub segments: usize,
    /// Function and macro closures.
    pub closures: usize,
    /// Environment scopes.
    pub envs: usize,
    /// Tables.
    pub tables: usize,
}

impl HeapStats {
    /// Objects across all arenas.
    #[must_use]
    pub fn total(&self) -> usize {
        self.nodes + self.strings + self.segments + self.closures + self.envs + self.tables
    }
}

/// Owner of every heap object and of the allocator.
pub struct Heap {
    pub(crate) alloc: Box<dyn Allocator>,
    pub(crate) nodes: Arena<NodeId, Node>,
    pub(crate) strings: Arena<StrId, Str>,
    pub(crate) segments: Arena<SymId, Segment>,
    pub(crate) closures: Arena<FuncId, Closure>,
    pub(crate) envs: Arena<EnvId, Env>,
    pub(crate) tables: Arena<TableId, Table>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(Box::new(SystemAllocator))
    }
}

impl Heap {
    /// An empty heap drawing on `alloc`.
    #[must_use]
    pub fn new(alloc: Box<dyn Allocator>) -> Self {
        Self {
            alloc,
            nodes: Arena::new(AllocKind::Node),
            strings: Arena::new(AllocKind::StrHeader),
            segments: Arena::new(AllocKind::SymbolSegment),
            closures: Arena::new(AllocKind::Function),
            envs: Arena::new(AllocKind::Env),
            tables: Arena::new(AllocKind::Table),
        }
    }

    /// The allocator.
    pub fn allocator_mut(&mut self) -> &mut dyn Allocator {
        &mut *self.alloc
    }

    /// The allocator's accounting, if it keeps any.
    #[must_use]
    pub fn alloc_stats(&self) -> Option<AllocStats> {
        self.alloc.stats()
    }

    /// Live objects per arena.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            nodes: self.nodes.len(),
            strings: self.strings.len(),
            segments: self.segments.len(),
            closures: self.closures.len(),
            envs: self.envs.len(),
            tables: self.tables.len(),
        }
    }

    pub(crate) fn keys(&self) -> Keys<'_> {
        Keys { strings: &self.strings, segments: &self.segments }
    }

    // Strings

    /// A new string holding `text`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the header or the bytes are refused.
    pub fn string(&mut self, text: &str) -> Result<StrId> {
        self.string_from_bytes(text.as_bytes())
    }

    /// A new string holding `bytes`. Empty strings get no byte buffer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the header or the bytes are refused.
    pub fn string_from_bytes(&mut self, bytes: &[u8]) -> Result<StrId> {
        let buffer = if bytes.is_empty() {
            None
        } else {
            self.alloc.allocate(AllocKind::StrBytes, bytes.len())?;
            Some(Box::from(bytes))
        };
        match self.strings.try_alloc(Str { bytes: buffer }, &mut *self.alloc) {
            Ok(id) => Ok(id),
            Err((header, err)) => {
                if let Some(bytes) = header.bytes {
                    self.alloc.deallocate(AllocKind::StrBytes, bytes.len());
                }
                Err(err.into())
            }
        }
    }

    /// The string behind `id`.
    #[must_use]
    pub fn str(&self, id: StrId) -> Option<&Str> {
        self.strings.get(id)
    }

    /// The bytes of the string behind `id`.
    #[must_use]
    pub fn str_bytes(&self, id: StrId) -> Option<&[u8]> {
        self.strings.get(id).map(Str::as_bytes)
    }

    pub(crate) fn free_string(&mut self, id: StrId) {
        if let Some(string) = self.strings.free(id, &mut *self.alloc) {
            if let Some(bytes) = string.bytes {
                self.alloc.deallocate(AllocKind::StrBytes, bytes.len());
            }
        }
    }

    // Symbols

    /// A symbol with one segment per element of `parts`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSymbol`] for no parts, an empty part or a part
    /// containing `.`; [`Error::OutOfMemory`] if any piece is refused, in
    /// which case nothing stays allocated.
    pub fn symbol(&mut self, parts: &[&str]) -> Result<SymId> {
        let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_bytes()).collect();
        self.symbol_from_parts(&parts)
    }

    /// A symbol from `a.b.c` notation.
    ///
    /// # Errors
    ///
    /// As for [`Heap::symbol`].
    pub fn symbol_from_dotted(&mut self, text: &str) -> Result<SymId> {
        let parts: Vec<&[u8]> = text.as_bytes().split(|b| *b == b'.').collect();
        self.symbol_from_parts(&parts)
    }

    pub(crate) fn symbol_from_parts(&mut self, parts: &[&[u8]]) -> Result<SymId> {
        if parts.is_empty() || parts.iter().any(|p| p.is_empty() || p.contains(&b'.')) {
            let text = parts.iter().map(|p| String::from_utf8_lossy(p)).collect::<Vec<_>>().join(".");
            return Err(Error::InvalidSymbol { text });
        }

        // Built back to front so each segment can link to the next one.
        let mut next: Option<SymId> = None;
        for part in parts.iter().rev() {
            let built = match self.string_from_bytes(part) {
                Ok(text) => match self.segments.try_alloc(Segment { part: text, next }, &mut *self.alloc) {
                    Ok(id) => Ok(id),
                    Err((segment, err)) => {
                        self.free_string(segment.part);
                        Err(Error::from(err))
                    }
                },
                Err(err) => Err(err),
            };
            match built {
                Ok(id) => next = Some(id),
                Err(err) => {
                    if let Some(done) = next {
                        self.free_symbol(done);
                    }
                    return Err(err);
                }
            }
        }
        next.ok_or(Error::InvalidHandle)
    }

    /// Segment texts of a symbol, first to last.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if any segment is gone.
    pub fn symbol_parts(&self, id: SymId) -> Result<Vec<&[u8]>> {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(seg) = cur {
            let segment = self.segments.get(seg).ok_or(Error::InvalidHandle)?;
            parts.push(self.str_bytes(segment.part).ok_or(Error::InvalidHandle)?);
            cur = segment.next;
        }
        Ok(parts)
    }

    /// The symbol in `a.b.c` notation.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if any segment is gone.
    pub fn symbol_text(&self, id: SymId) -> Result<String> {
        let parts = self.symbol_parts(id)?;
        Ok(parts.iter().map(|p| String::from_utf8_lossy(p)).collect::<Vec<_>>().join("."))
    }

    /// Whether the symbol has more than one segment.
    #[must_use]
    pub fn is_multipart(&self, id: SymId) -> bool {
        self.segments.get(id).is_some_and(|s| s.next.is_some())
    }

    pub(crate) fn free_symbol(&mut self, id: SymId) {
        let mut cur = Some(id);
        while let Some(seg) = cur {
            let Some(segment) = self.segments.free(seg, &mut *self.alloc) else {
                break;
            };
            self.free_string(segment.part);
            cur = segment.next;
        }
    }

    // Nodes

    /// A new cons cell.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the cell is refused.
    pub fn cons(&mut self, head: Value, tail: Value) -> Result<NodeId> {
        Ok(self.nodes.alloc(Node { head, tail }, &mut *self.alloc)?)
    }

    /// The cell behind `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Replaces a cell's head.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if the cell is gone.
    pub fn set_head(&mut self, id: NodeId, head: Value) -> Result<()> {
        self.nodes.get_mut(id).ok_or(Error::InvalidHandle)?.head = head;
        Ok(())
    }

    /// Replaces a cell's tail.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if the cell is gone.
    pub fn set_tail(&mut self, id: NodeId, tail: Value) -> Result<()> {
        self.nodes.get_mut(id).ok_or(Error::InvalidHandle)?.tail = tail;
        Ok(())
    }

    /// A proper list of `items`; the empty slice gives [`Value::Nil`].
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`]; cells built so far are freed, the items are
    /// left alone.
    pub fn list(&mut self, items: &[Value]) -> Result<Value> {
        let mut list = Value::Nil;
        for item in items.iter().rev() {
            match self.cons(*item, list) {
                Ok(id) => list = Value::Node(id),
                Err(err) => {
                    self.free_spine(list);
                    return Err(err);
                }
            }
        }
        Ok(list)
    }

    /// Elements of a list and its terminator (`Nil` for proper lists).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if a cell is gone.
    pub fn list_items(&self, list: Value) -> Result<(Vec<Value>, Value)> {
        let mut items = Vec::new();
        let mut cur = list;
        while let Value::Node(id) = cur {
            let node = self.node(id).ok_or(Error::InvalidHandle)?;
            items.push(node.head);
            cur = node.tail;
        }
        Ok((items, cur))
    }

    fn free_spine(&mut self, list: Value) {
        let mut cur = list;
        while let Value::Node(id) = cur {
            match self.nodes.free(id, &mut *self.alloc) {
                Some(node) => cur = node.tail,
                None => break,
            }
        }
    }

    // Closures

    /// A new closure over `env`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for a dead environment,
    /// [`Error::OutOfMemory`] if the closure is refused.
    pub fn closure(&mut self, env: EnvId, params: Value, body: Value) -> Result<FuncId> {
        if !self.envs.contains(env) {
            return Err(Error::InvalidHandle);
        }
        Ok(self.closures.alloc(Closure { env, params, body }, &mut *self.alloc)?)
    }

    /// The closure behind `id`.
    #[must_use]
    pub fn closure_ref(&self, id: FuncId) -> Option<&Closure> {
        self.closures.get(id)
    }

    // Freeing and comparing

    /// Frees `value`. With `deep`, everything it owns goes too; otherwise
    /// only the outer object, leaving children to the collector.
    ///
    /// Symbols always go with all their segments. Immediates and handles
    /// that are already free are ignored; a freed handle stays dead even
    /// after its slot is reused. Environments are never freed from
    /// here; see [`Heap::free_env`].
    pub fn free(&mut self, value: Value, deep: bool) {
        let mut work = vec![value];
        while let Some(value) = work.pop() {
            match value {
                Value::Node(id) => {
                    if let Some(node) = self.nodes.free(id, &mut *self.alloc) {
                        if deep {
                            work.push(node.tail);
                            work.push(node.head);
                        }
                    }
                }
                Value::Str(id) => self.free_string(id),
                Value::Symbol(id) => self.free_symbol(id),
                Value::Function(id) | Value::Macro(id) => {
                    if let Some(closure) = self.closures.free(id, &mut *self.alloc) {
                        if deep {
                            work.push(closure.body);
                            work.push(closure.params);
                        }
                    }
                }
                Value::Table(id) => {
                    if let Some(table) = self.tables.free(id, &mut *self.alloc) {
                        if deep {
                            work.extend(table.map.iter().flat_map(|(k, v)| [*k, *v]));
                        }
                        table.map.release(&mut *self.alloc);
                    }
                }
                _ => {}
            }
        }
    }

    /// Structural equality.
    ///
    /// Strings compare by length and bytes, symbols segment by segment,
    /// lists element by element including dotted tails. Closures and tables
    /// compare by identity, doubles numerically. Dead handles are unequal to
    /// everything.
    #[must_use]
    pub fn equal(&self, a: Value, b: Value) -> bool {
        let mut work = vec![(a, b)];
        while let Some(pair) = work.pop() {
            let same = match pair {
                (Value::Node(x), Value::Node(y)) if x == y => self.nodes.contains(x),
                (Value::Node(x), Value::Node(y)) => match (self.node(x), self.node(y)) {
                    (Some(p), Some(q)) => {
                        work.push((p.tail, q.tail));
                        work.push((p.head, q.head));
                        true
                    }
                    _ => false,
                },
                (Value::Str(x), Value::Str(y)) => match (self.str_bytes(x), self.str_bytes(y)) {
                    (Some(p), Some(q)) => p == q,
                    _ => false,
                },
                (Value::Symbol(x), Value::Symbol(y)) => match (self.symbol_parts(x), self.symbol_parts(y)) {
                    (Ok(p), Ok(q)) => p == q,
                    _ => false,
                },
                (x, y) => x == y,
            };
            if !same {
                return false;
            }
        }
        true
    }

    fn release_everything(&mut self) {
        let alloc = &mut *self.alloc;
        for id in self.envs.indices() {
            if let Some(env) = self.envs.free(id, alloc) {
                env.bindings.release(alloc);
            }
        }
        for id in self.tables.indices() {
            if let Some(table) = self.tables.free(id, alloc) {
                table.map.release(alloc);
            }
        }
        for id in self.strings.indices() {
            self.free_string(id);
        }
        let alloc = &mut *self.alloc;
        self.nodes.release_all(alloc);
        self.segments.release_all(alloc);
        self.closures.release_all(alloc);
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.release_everything();
        self.alloc.destroy();
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap").field("stats", &self.stats()).finish()
    }
}
