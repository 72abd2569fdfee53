// Out-of-memory tests
//
// Every refused allocation surfaces as `Error::OutOfMemory` and leaves no
// partially built object behind.

mod common;

use common::*;
use tl::{AllocKind, Error, Heap, Runtime, RuntimeConfig, TrackingAllocator, Value};

const NESTED: &str = "(define (f x . rest) (\"body\" a.b.c (1 2.5 #true) . tail))";

fn budgeted(grants: usize) -> Option<Runtime> {
    let alloc = TrackingAllocator::new().failing_after(grants);
    match Runtime::with_allocator(RuntimeConfig::default(), Box::new(alloc)) {
        Ok(rt) => Some(rt),
        Err(Error::OutOfMemory(_)) => None,
        Err(err) => panic!("unexpected error: {err}"),
    }
}

#[test]
fn test_runtime_creation_refused() {
    let alloc = TrackingAllocator::new().with_kind_limit(AllocKind::Stack, 0);
    let err = Runtime::with_allocator(RuntimeConfig::default(), Box::new(alloc)).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory(e) if e.kind == AllocKind::Stack));
    assert!(budgeted(0).is_none());
}

#[test]
fn test_read_unwinds_at_every_budget() {
    let mut failures = 0;
    for grants in 0..200 {
        let Some(mut rt) = budgeted(grants) else {
            continue;
        };
        let before = live_bytes(&rt);
        match rt.read_raw(NESTED) {
            Ok(_) => {
                assert_eq!(rt.stack_len(), 1);
                break;
            }
            Err(Error::OutOfMemory(_)) => {
                failures += 1;
                assert_eq!(rt.stack_len(), 0, "grants {grants}");
                assert_eq!(live_bytes(&rt), before, "grants {grants}");
            }
            Err(err) => panic!("unexpected error at {grants}: {err}"),
        }
    }
    assert!(failures > 10);
}

#[test]
fn test_table_insert_refused_leaves_table_intact() {
    let alloc = TrackingAllocator::new().with_kind_limit(AllocKind::HtBucket, 0);
    let mut rt = tracked_with(alloc);
    let t = rt.new_table().unwrap();

    let err = rt.table_insert(t, Value::Int(1), Value::Nil).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory(e) if e.kind == AllocKind::HtBucket));
    assert_eq!(rt.heap().table_len(t).unwrap(), 0);
    assert_eq!(rt.table_get(t, Value::Int(1)).unwrap(), None);
}

#[test]
fn test_refused_fit_keeps_entries() {
    // Room for the top environment's and one table's initial arrays only.
    let bucket_array = 8 * std::mem::size_of::<Option<u32>>();
    let alloc = TrackingAllocator::new().with_kind_limit(AllocKind::BucketArray, 2 * bucket_array);
    let mut rt = tracked_with(alloc);
    let t = rt.new_table().unwrap();

    for k in 0..20 {
        rt.table_insert(t, Value::Int(k), Value::Int(-k)).unwrap();
    }
    assert_eq!(rt.heap().table_capacity(t).unwrap(), 8);
    for k in 0..20 {
        assert_eq!(rt.table_get(t, Value::Int(k)).unwrap(), Some(Value::Int(-k)));
    }
}

#[test]
fn test_symbol_refused_mid_chain() {
    // Each of the three segments takes its bytes, a string header and the
    // segment itself.
    let mut failures = 0;
    for grants in 0..12 {
        let alloc = TrackingAllocator::new().failing_after(grants);
        let mut heap = Heap::new(Box::new(alloc));
        match heap.symbol_from_dotted("one.two.three") {
            Ok(_) => break,
            Err(Error::OutOfMemory(_)) => {
                failures += 1;
                assert_eq!(heap.stats().total(), 0);
                assert_eq!(heap.alloc_stats().unwrap().live_bytes(), 0);
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(failures, 9);
}

#[test]
fn test_string_bytes_refused() {
    let alloc = TrackingAllocator::new().with_kind_limit(AllocKind::StrBytes, 4);
    let mut rt = tracked_with(alloc);
    let before = live_bytes(&rt);
    assert!(matches!(rt.read_raw("(\"long string\")"), Err(Error::OutOfMemory(_))));
    assert_eq!(live_bytes(&rt), before);
    let tiny = read_one(&mut rt, "\"tiny\"");
    assert_eq!(rt.show(tiny), "\"tiny\"");
}
