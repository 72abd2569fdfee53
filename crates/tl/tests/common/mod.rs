// Common test utilities for integration tests
//
// Shared helpers for building runtimes and reading values across the
// integration test files.

#![allow(dead_code)]

use tl::{Error, ParseErrorKind, Runtime, RuntimeConfig, TrackingAllocator, Value};

/// A runtime on the system allocator with default settings.
pub fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).expect("Failed to create runtime")
}

/// A runtime whose allocator keeps books, so tests can check for leaks.
pub fn tracked_runtime() -> Runtime {
    tracked_with(TrackingAllocator::new())
}

/// A runtime on the given tracking allocator.
pub fn tracked_with(alloc: TrackingAllocator) -> Runtime {
    Runtime::with_allocator(RuntimeConfig::default(), Box::new(alloc)).expect("Failed to create runtime")
}

/// Reads one value from `src` and pops it off the stack.
pub fn read_one(rt: &mut Runtime, src: &str) -> Value {
    rt.read_raw(src).expect("Failed to read");
    rt.pop().expect("Nothing was read")
}

/// The parse error kind a read of `src` fails with.
pub fn parse_error(rt: &mut Runtime, src: &str) -> ParseErrorKind {
    match rt.read_raw(src) {
        Err(Error::Parse(err)) => err.kind,
        other => panic!("Expected a parse error for {src:?}, got {other:?}"),
    }
}

/// Bytes currently accounted to the runtime's allocator.
pub fn live_bytes(rt: &Runtime) -> usize {
    rt.alloc_stats().expect("Allocator keeps no stats").live_bytes()
}

/// A single-segment symbol value.
pub fn sym(rt: &mut Runtime, name: &str) -> Value {
    Value::Symbol(rt.heap_mut().symbol(&[name]).expect("Failed to create symbol"))
}
