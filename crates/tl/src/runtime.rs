//! The runtime façade.
//!
//! A [`Runtime`] owns a heap, a fixed-capacity evaluation stack, the top
//! environment and the installed [`Evaluator`]. Host code and native
//! functions talk to it through the stack: values are read onto it, popped
//! off to be evaluated, and results pushed back.

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::eval::{Evaluator, Passthrough};
use crate::gc::GcReport;
use crate::heap::Heap;
use crate::reader;
use crate::stack::Stack;
use crate::value::{EnvId, NativeFn, SymId, TableId, Value};
use std::rc::Rc;
use tl_mem::{AllocStats, Allocator, FitPolicy, SystemAllocator};

/// One runtime instance.
pub struct Runtime {
    heap: Heap,
    stack: Stack,
    top: EnvId,
    config: RuntimeConfig,
    evaluator: Rc<dyn Evaluator>,
}

impl Runtime {
    /// A runtime on the system allocator.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a bad configuration.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_allocator(config, Box::new(SystemAllocator))
    }

    /// A runtime drawing on `alloc`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a bad configuration,
    /// [`Error::OutOfMemory`] if the stack or the top environment is
    /// refused.
    pub fn with_allocator(config: RuntimeConfig, alloc: Box<dyn Allocator>) -> Result<Self> {
        config.validate()?;
        let mut heap = Heap::new(alloc);
        let top = heap.new_env(None, config.env_capacity)?;
        let stack = Stack::with_capacity(config.stack_size, heap.allocator_mut())?;

        let mut rt = Self { heap, stack, top, config, evaluator: Rc::new(Passthrough) };
        for value in rt.config.preinit.clone() {
            rt.stack.push(value)?;
        }
        tl_log::info!(
            "runtime ready: {} stack slots, {} preinit values",
            rt.config.stack_size,
            rt.config.preinit.len()
        );
        Ok(rt)
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The heap, mutably.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The allocator's accounting, if it keeps any.
    #[must_use]
    pub fn alloc_stats(&self) -> Option<AllocStats> {
        self.heap.alloc_stats()
    }

    // Stack

    /// Pushes `value`.
    ///
    /// # Errors
    ///
    /// [`Error::StackOverflow`].
    pub fn push(&mut self, value: Value) -> Result<()> {
        self.stack.push(value)
    }

    /// Pops the top value.
    ///
    /// # Errors
    ///
    /// [`Error::StackUnderflow`].
    pub fn pop(&mut self) -> Result<Value> {
        self.stack.pop()
    }

    /// The top value.
    ///
    /// # Errors
    ///
    /// [`Error::StackUnderflow`].
    pub fn peek(&self) -> Result<Value> {
        self.stack.peek()
    }

    /// Values on the stack.
    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Stack slots.
    #[must_use]
    pub fn stack_capacity(&self) -> usize {
        self.stack.capacity()
    }

    /// The stack, bottom to top.
    #[must_use]
    pub fn stack_values(&self) -> &[Value] {
        self.stack.as_slice()
    }

    /// Pushes a value nothing else refers to yet, freeing it if the stack
    /// is full.
    fn push_owned(&mut self, value: Value) -> Result<()> {
        if let Err(err) = self.stack.push(value) {
            self.heap.free(value, true);
            return Err(err);
        }
        Ok(())
    }

    // Reading

    /// Reads one value from the start of `src` and pushes it. Returns the
    /// bytes consumed; input holding only whitespace pushes nothing.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`], [`Error::OutOfMemory`] or
    /// [`Error::StackOverflow`]. Nothing is pushed or left allocated.
    pub fn read_raw(&mut self, src: impl AsRef<[u8]>) -> Result<usize> {
        let parsed = reader::parse(&mut self.heap, src.as_ref())?;
        if let Some(value) = parsed.value {
            self.push_owned(value)?;
            tl_log::trace!("read {} in {} bytes", value.type_name(), parsed.consumed);
        }
        Ok(parsed.consumed)
    }

    /// Pops a string and reads one value from its text.
    ///
    /// The string itself is left to the collector.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the top of the stack is not a string, in
    /// which case it stays there; otherwise as for [`Runtime::read_raw`].
    pub fn read(&mut self) -> Result<usize> {
        let top = self.stack.pop()?;
        let Value::Str(id) = top else {
            self.stack.push(top)?;
            return Err(Error::TypeMismatch { expected: "String", found: top.type_name() });
        };
        let src = self.heap.str_bytes(id).ok_or(Error::InvalidHandle)?.to_vec();
        self.read_raw(src)
    }

    /// Reads every value in `src`, pushing each. Returns how many were
    /// read.
    ///
    /// # Errors
    ///
    /// As for [`Runtime::read_raw`]; values read before the error stay on
    /// the stack.
    pub fn read_all(&mut self, src: impl AsRef<[u8]>) -> Result<usize> {
        let src = src.as_ref();
        let mut offset = 0;
        let mut count = 0;
        while offset < src.len() {
            let parsed = reader::parse(&mut self.heap, &src[offset..])?;
            let Some(value) = parsed.value else {
                break;
            };
            self.push_owned(value)?;
            offset += parsed.consumed;
            count += 1;
        }
        Ok(count)
    }

    // Evaluation

    /// Replaces the evaluator.
    pub fn set_evaluator(&mut self, evaluator: Rc<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    /// Pops a value, evaluates it in the top environment and pushes the
    /// result.
    ///
    /// # Errors
    ///
    /// [`Error::StackUnderflow`], or whatever evaluation reports.
    pub fn eval(&mut self) -> Result<()> {
        let value = self.stack.pop()?;
        let result = self.eval_value(value, self.top)?;
        self.stack.push(result)
    }

    /// Evaluates `value` in `env`. Literals evaluate to themselves; lists
    /// and symbols go to the evaluator.
    ///
    /// # Errors
    ///
    /// [`Error::NotEvaluable`] for closures, natives, opaque words and
    /// tables; otherwise whatever the evaluator reports.
    pub fn eval_value(&mut self, value: Value, env: EnvId) -> Result<Value> {
        match value {
            Value::Nil
            | Value::Str(_)
            | Value::Char(_)
            | Value::Bool(_)
            | Value::Int(_)
            | Value::UInt(_)
            | Value::Double(_) => Ok(value),
            Value::Node(id) => {
                let evaluator = Rc::clone(&self.evaluator);
                evaluator.eval_list(self, id, env)
            }
            Value::Symbol(id) => {
                let evaluator = Rc::clone(&self.evaluator);
                evaluator.eval_symbol(self, id, env)
            }
            other => {
                tl_log::debug!("refusing to evaluate a {}", other.type_name());
                Err(Error::NotEvaluable { type_name: other.type_name() })
            }
        }
    }

    /// Calls a native function against this runtime.
    ///
    /// # Errors
    ///
    /// Whatever the function reports.
    pub fn run_native(&mut self, function: NativeFn) -> Result<()> {
        (function.0)(self)
    }

    // Environments

    /// The top environment.
    #[must_use]
    pub fn top_env(&self) -> EnvId {
        self.top
    }

    /// A new scope under `parent`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] or [`Error::OutOfMemory`].
    pub fn new_scope(&mut self, parent: EnvId) -> Result<EnvId> {
        self.heap.new_env(Some(parent), self.config.env_capacity)
    }

    /// Frees a scope created with [`Runtime::new_scope`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for a dead scope or the top environment.
    pub fn drop_scope(&mut self, env: EnvId) -> Result<()> {
        if env == self.top {
            tl_log::debug!("refusing to drop the top environment");
            return Err(Error::InvalidHandle);
        }
        self.heap.free_env(env)
    }

    fn symbol_key(key: Value) -> Result<SymId> {
        match key {
            Value::Symbol(id) => Ok(id),
            other => Err(Error::TypeMismatch { expected: "Symbol", found: other.type_name() }),
        }
    }

    fn fit_env(&mut self, env: EnvId, policy: FitPolicy) {
        if !self.config.fit_after_mutation {
            return;
        }
        if let Err(err) = self.heap.env_fit(env, policy) {
            tl_log::warn!("environment fit failed: {err}");
        }
    }

    fn fit_table(&mut self, table: TableId, policy: FitPolicy) {
        if !self.config.fit_after_mutation {
            return;
        }
        if let Err(err) = self.heap.table_fit(table, policy) {
            tl_log::warn!("table fit failed: {err}");
        }
    }

    /// Binds the symbol `key` in `env`. Returns the replaced value.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] for a non-symbol key; otherwise as for
    /// [`Heap::env_insert`].
    pub fn env_insert(&mut self, env: EnvId, key: Value, value: Value) -> Result<Option<Value>> {
        let replaced = self.heap.env_insert(env, Self::symbol_key(key)?, value)?;
        if replaced.is_none() {
            self.fit_env(env, self.config.grow);
        }
        Ok(replaced)
    }

    /// Looks the symbol `key` up from `env` outwards.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`]; otherwise as for [`Heap::env_get`].
    pub fn env_get(&self, env: EnvId, key: Value) -> Result<Option<Value>> {
        self.heap.env_get(env, Self::symbol_key(key)?)
    }

    /// Assigns to the nearest binding of `key`.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`]; otherwise as for [`Heap::env_set`].
    pub fn env_set(&mut self, env: EnvId, key: Value, value: Value) -> Result<()> {
        self.heap.env_set(env, Self::symbol_key(key)?, value)
    }

    /// Unbinds `key` from `env` only.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`]; otherwise as for [`Heap::env_remove`].
    pub fn env_remove(&mut self, env: EnvId, key: Value) -> Result<Option<Value>> {
        let removed = self.heap.env_remove(env, Self::symbol_key(key)?)?;
        if removed.is_some() {
            self.fit_env(env, self.config.shrink);
        }
        Ok(removed)
    }

    /// Binds `name` in the top environment.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSymbol`], [`Error::MultipartKey`] or
    /// [`Error::OutOfMemory`].
    pub fn define(&mut self, name: &str, value: Value) -> Result<()> {
        let key = self.heap.symbol_from_dotted(name)?;
        let result = self.env_insert(self.top, Value::Symbol(key), value);
        if result.is_err() {
            self.heap.free(Value::Symbol(key), false);
        }
        result.map(|_| ())
    }

    /// Looks `name` up in the top environment. Nothing is allocated.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSymbol`] or [`Error::MultipartKey`], as for
    /// [`Runtime::define`].
    pub fn lookup(&self, name: &str) -> Result<Option<Value>> {
        if name.split('.').any(str::is_empty) {
            return Err(Error::InvalidSymbol { text: name.to_string() });
        }
        if name.contains('.') {
            tl_log::debug!("multipart symbol used as a key");
            return Err(Error::MultipartKey);
        }
        self.heap.env_get_name(self.top, name.as_bytes())
    }

    // Tables

    /// A new empty table with the configured capacity.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`].
    pub fn new_table(&mut self) -> Result<TableId> {
        self.heap.new_table(self.config.table_capacity)
    }

    /// Maps `key` to `value`. Returns the replaced value.
    ///
    /// # Errors
    ///
    /// As for [`Heap::table_insert`].
    pub fn table_insert(&mut self, table: TableId, key: Value, value: Value) -> Result<Option<Value>> {
        let replaced = self.heap.table_insert(table, key, value)?;
        if replaced.is_none() {
            self.fit_table(table, self.config.grow);
        }
        Ok(replaced)
    }

    /// The value for `key`.
    ///
    /// # Errors
    ///
    /// As for [`Heap::table_get`].
    pub fn table_get(&self, table: TableId, key: Value) -> Result<Option<Value>> {
        self.heap.table_get(table, key)
    }

    /// Replaces the value of an existing key.
    ///
    /// # Errors
    ///
    /// As for [`Heap::table_set`].
    pub fn table_set(&mut self, table: TableId, key: Value, value: Value) -> Result<()> {
        self.heap.table_set(table, key, value)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// As for [`Heap::table_remove`].
    pub fn table_remove(&mut self, table: TableId, key: Value) -> Result<Option<Value>> {
        let removed = self.heap.table_remove(table, key)?;
        if removed.is_some() {
            self.fit_table(table, self.config.shrink);
        }
        Ok(removed)
    }

    // Heap helpers

    /// Printed form of `value`.
    #[must_use]
    pub fn show(&self, value: Value) -> String {
        self.heap.show(value).to_string()
    }

    /// Printed form of `value` with string and symbol bytes as stored.
    #[must_use]
    pub fn show_bytes(&self, value: Value) -> Vec<u8> {
        self.heap.show_bytes(value)
    }

    /// Structural equality.
    #[must_use]
    pub fn equal(&self, a: Value, b: Value) -> bool {
        self.heap.equal(a, b)
    }

    /// Frees everything unreachable from the stack and the environments.
    pub fn collect_garbage(&mut self) -> GcReport {
        self.heap.collect(self.stack.as_slice())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stack.release(self.heap.allocator_mut());
        tl_log::debug!("runtime dropped");
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("heap", &self.heap)
            .field("stack", &self.stack.len())
            .field("top", &self.top)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_mem::{AllocKind, TrackingAllocator};

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default()).unwrap()
    }

    fn tracked(config: RuntimeConfig) -> Runtime {
        Runtime::with_allocator(config, Box::new(TrackingAllocator::new())).unwrap()
    }

    fn sym(rt: &mut Runtime, name: &str) -> Value {
        Value::Symbol(rt.heap_mut().symbol_from_dotted(name).unwrap())
    }

    #[test]
    fn test_stack_operations() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_stack_size(2)).unwrap();
        rt.push(Value::Int(1)).unwrap();
        rt.push(Value::Int(2)).unwrap();
        assert_eq!(rt.push(Value::Int(3)), Err(Error::StackOverflow { capacity: 2 }));
        assert_eq!(rt.peek().unwrap(), Value::Int(2));
        assert_eq!(rt.stack_values(), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(rt.pop().unwrap(), Value::Int(2));
        assert_eq!(rt.stack_len(), 1);
        assert_eq!(rt.stack_capacity(), 2);
    }

    #[test]
    fn test_preinit_stack() {
        let config = RuntimeConfig::default().preinit_stack([Value::Int(7), Value::FALSE]);
        let mut rt = Runtime::new(config).unwrap();
        assert_eq!(rt.pop().unwrap(), Value::FALSE);
        assert_eq!(rt.pop().unwrap(), Value::Int(7));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Runtime::new(RuntimeConfig::default().with_stack_size(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_read_raw_pushes() {
        let mut rt = runtime();
        assert_eq!(rt.read_raw("  (1 2) rest").unwrap(), 7);
        assert_eq!(rt.show(rt.peek().unwrap()), "(1 2)");
        assert_eq!(rt.read_raw("   ").unwrap(), 3);
        assert_eq!(rt.stack_len(), 1);
    }

    #[test]
    fn test_read_raw_overflow_frees_value() {
        let mut rt = tracked(RuntimeConfig::default().with_stack_size(1).preinit_stack([Value::Nil]));
        let before = rt.heap().stats();
        assert_eq!(rt.read_raw("(a \"b\")"), Err(Error::StackOverflow { capacity: 1 }));
        assert_eq!(rt.heap().stats(), before);
    }

    #[test]
    fn test_read_from_string() {
        let mut rt = runtime();
        let src = Value::Str(rt.heap_mut().string("(x . 1) ignored").unwrap());
        rt.push(src).unwrap();
        assert_eq!(rt.read().unwrap(), 7);
        assert_eq!(rt.stack_len(), 1);
        assert_eq!(rt.show(rt.peek().unwrap()), "(x . 1)");

        rt.push(Value::Int(1)).unwrap();
        assert_eq!(rt.read(), Err(Error::TypeMismatch { expected: "String", found: "Int" }));
        assert_eq!(rt.peek().unwrap(), Value::Int(1));
    }

    #[test]
    fn test_read_all() {
        let mut rt = runtime();
        assert_eq!(rt.read_all("1 \"two\"(3) four  ").unwrap(), 4);
        let shown: Vec<String> = rt.stack_values().iter().map(|v| rt.show(*v)).collect();
        assert_eq!(shown, ["1", "\"two\"", "(3)", "four"]);
    }

    #[test]
    fn test_eval_literals_and_refusals() {
        let mut rt = runtime();
        rt.read_raw("2.5").unwrap();
        rt.eval().unwrap();
        assert_eq!(rt.pop().unwrap(), Value::Double(2.5));

        let t = rt.new_table().unwrap();
        let top = rt.top_env();
        assert_eq!(rt.eval_value(Value::Table(t), top), Err(Error::NotEvaluable { type_name: "Table" }));
        assert_eq!(rt.eval(), Err(Error::StackUnderflow));
    }

    #[test]
    fn test_run_native() {
        fn add_top_two(rt: &mut Runtime) -> Result<()> {
            let (Value::Int(a), Value::Int(b)) = (rt.pop()?, rt.pop()?) else {
                return Err(Error::TypeMismatch { expected: "Int", found: "other" });
            };
            rt.push(Value::Int(a + b))
        }

        let mut rt = runtime();
        rt.read_all("40 2").unwrap();
        rt.run_native(NativeFn(add_top_two)).unwrap();
        assert_eq!(rt.pop().unwrap(), Value::Int(42));
    }

    #[test]
    fn test_scopes() {
        let mut rt = runtime();
        let top = rt.top_env();
        let inner = rt.new_scope(top).unwrap();
        let x = sym(&mut rt, "x");

        rt.env_insert(top, x, Value::Int(1)).unwrap();
        rt.env_insert(inner, x, Value::Int(2)).unwrap();
        assert_eq!(rt.env_get(inner, x).unwrap(), Some(Value::Int(2)));

        rt.drop_scope(inner).unwrap();
        assert_eq!(rt.drop_scope(top), Err(Error::InvalidHandle));
        assert_eq!(rt.env_get(top, x).unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn test_env_keys_must_be_symbols() {
        let mut rt = runtime();
        let top = rt.top_env();
        assert_eq!(
            rt.env_insert(top, Value::Int(1), Value::Nil),
            Err(Error::TypeMismatch { expected: "Symbol", found: "Int" })
        );
    }

    #[test]
    fn test_define_and_lookup() {
        let mut rt = tracked(RuntimeConfig::default());
        rt.define("half", Value::Double(1.5)).unwrap();
        let strings = rt.heap().stats().strings;

        assert_eq!(rt.lookup("half").unwrap(), Some(Value::Double(1.5)));
        assert_eq!(rt.lookup("tau").unwrap(), None);
        assert_eq!(rt.heap().stats().strings, strings);
        assert_eq!(rt.define("a.b", Value::Nil), Err(Error::MultipartKey));
        assert_eq!(rt.heap().stats().strings, strings);
    }

    #[test]
    fn test_lookup_allocates_nothing() {
        let mut rt = tracked(RuntimeConfig::default());
        rt.define("half", Value::Double(1.5)).unwrap();
        let live = rt.alloc_stats().unwrap().live_bytes();

        let found = rt.lookup("half").unwrap();
        assert_eq!(rt.show(found.unwrap()), "1.5");
        assert_eq!(rt.lookup("math.pi"), Err(Error::MultipartKey));
        assert!(matches!(rt.lookup("a..b"), Err(Error::InvalidSymbol { .. })));
        assert!(matches!(rt.lookup(""), Err(Error::InvalidSymbol { .. })));
        assert_eq!(rt.alloc_stats().unwrap().live_bytes(), live);
    }

    #[test]
    fn test_fit_after_mutation() {
        let mut rt = runtime();
        let t = rt.new_table().unwrap();
        for i in 0..100 {
            rt.table_insert(t, Value::Int(i), Value::Nil).unwrap();
        }
        assert_eq!(rt.heap().table_capacity(t).unwrap(), 256);
        for i in 0..100 {
            rt.table_remove(t, Value::Int(i)).unwrap();
        }
        // An empty table cannot be fitted, so it keeps the last size.
        assert_eq!(rt.heap().table_len(t).unwrap(), 0);
        assert_eq!(rt.heap().table_capacity(t).unwrap(), 4);
    }

    #[test]
    fn test_no_fit_when_disabled() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_fit_after_mutation(false)).unwrap();
        let t = rt.new_table().unwrap();
        for i in 0..100 {
            rt.table_insert(t, Value::Int(i), Value::Nil).unwrap();
        }
        assert_eq!(rt.heap().table_capacity(t).unwrap(), 8);
    }

    #[test]
    fn test_collect_garbage_keeps_stack() {
        let mut rt = tracked(RuntimeConfig::default());
        rt.read_all("(kept \"text\") (dropped 1 2)").unwrap();
        rt.pop().unwrap();
        let report = rt.collect_garbage();
        assert!(report.freed > 0);
        assert_eq!(rt.show(rt.peek().unwrap()), "(kept \"text\")");
    }

    #[test]
    fn test_stack_accounting() {
        let rt = tracked(RuntimeConfig::default().with_stack_size(16));
        let stats = rt.alloc_stats().unwrap();
        assert_eq!(stats.kind(AllocKind::Stack).live_bytes, 16 * std::mem::size_of::<Value>());
    }
}
