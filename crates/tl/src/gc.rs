//! Tracing collector.
//!
//! Mark and sweep, run only when asked. Every live environment is a root,
//! together with whatever values the caller passes in (the runtime passes
//! its evaluation stack). Marking follows cells, symbol segments and their
//! texts, closure parameters and bodies, and table entries; sweeping frees
//! every unmarked slot through the allocator.

use crate::heap::Heap;
use crate::value::Value;
use tl_mem::ArenaIndex;

/// What a collection did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Objects found reachable.
    pub retained: usize,
    /// Objects freed.
    pub freed: usize,
}

/// One mark bit per arena slot.
struct Marks(Vec<bool>);

impl Marks {
    fn new(slots: usize) -> Self {
        Self(vec![false; slots])
    }

    /// Marks `index`; true if it was not marked before.
    fn mark<I: ArenaIndex>(&mut self, index: I) -> bool {
        match self.0.get_mut(index.slot() as usize) {
            Some(bit) if !*bit => {
                *bit = true;
                true
            }
            _ => false,
        }
    }

    fn is_marked<I: ArenaIndex>(&self, index: I) -> bool {
        self.0.get(index.slot() as usize).copied().unwrap_or(false)
    }

    fn count(&self) -> usize {
        self.0.iter().filter(|b| **b).count()
    }
}

impl Heap {
    /// Frees every object not reachable from `roots` or from a live
    /// environment.
    pub fn collect(&mut self, roots: &[Value]) -> GcReport {
        let mut nodes = Marks::new(self.nodes.slot_count());
        let mut strings = Marks::new(self.strings.slot_count());
        let mut segments = Marks::new(self.segments.slot_count());
        let mut closures = Marks::new(self.closures.slot_count());
        let mut tables = Marks::new(self.tables.slot_count());

        let mut work: Vec<Value> = roots.to_vec();
        for (_, env) in self.envs.iter() {
            work.extend(env.bindings.iter().flat_map(|(k, v)| [Value::Symbol(*k), *v]));
        }

        // Stale handles name reused slots; only live objects get marked.
        while let Some(value) = work.pop() {
            match value {
                Value::Node(id) => {
                    if let Some(node) = self.nodes.get(id) {
                        if nodes.mark(id) {
                            work.push(node.tail);
                            work.push(node.head);
                        }
                    }
                }
                Value::Str(id) => {
                    if self.strings.contains(id) {
                        strings.mark(id);
                    }
                }
                Value::Symbol(id) => {
                    let mut cur = Some(id);
                    while let Some(seg) = cur {
                        let Some(segment) = self.segments.get(seg) else {
                            break;
                        };
                        if !segments.mark(seg) {
                            break;
                        }
                        if self.strings.contains(segment.part) {
                            strings.mark(segment.part);
                        }
                        cur = segment.next;
                    }
                }
                Value::Function(id) | Value::Macro(id) => {
                    if let Some(closure) = self.closures.get(id) {
                        if closures.mark(id) {
                            work.push(closure.body);
                            work.push(closure.params);
                        }
                    }
                }
                Value::Table(id) => {
                    if let Some(table) = self.tables.get(id) {
                        if tables.mark(id) {
                            work.extend(table.map.iter().flat_map(|(k, v)| [*k, *v]));
                        }
                    }
                }
                _ => {}
            }
        }

        let retained = nodes.count() + strings.count() + segments.count() + closures.count() + tables.count();
        let mut freed = 0;
        let alloc = &mut *self.alloc;

        for id in self.nodes.indices() {
            if !nodes.is_marked(id) && self.nodes.free(id, alloc).is_some() {
                freed += 1;
            }
        }
        for id in self.segments.indices() {
            if !segments.is_marked(id) && self.segments.free(id, alloc).is_some() {
                freed += 1;
            }
        }
        for id in self.closures.indices() {
            if !closures.is_marked(id) && self.closures.free(id, alloc).is_some() {
                freed += 1;
            }
        }
        for id in self.tables.indices() {
            if tables.is_marked(id) {
                continue;
            }
            if let Some(table) = self.tables.free(id, alloc) {
                table.map.release(alloc);
                freed += 1;
            }
        }
        for id in self.strings.indices() {
            if !strings.is_marked(id) {
                self.free_string(id);
                freed += 1;
            }
        }

        tl_log::debug!("collected: {retained} retained, {freed} freed");
        GcReport { retained, freed }
    }
}
