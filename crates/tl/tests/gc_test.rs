// Garbage collection tests
//
// The stack and every live environment are roots; anything else goes.

mod common;

use common::*;
use tl::Value;

#[test]
fn test_popped_values_are_collected() {
    let mut rt = tracked_runtime();
    let baseline = live_bytes(&rt);

    rt.read_all("(a b c) \"text\" (nested (list . tail))").unwrap();
    while rt.stack_len() > 0 {
        rt.pop().unwrap();
    }
    let report = rt.collect_garbage();

    assert!(report.freed > 0);
    assert_eq!(live_bytes(&rt), baseline);
}

#[test]
fn test_stack_values_survive() {
    let mut rt = tracked_runtime();
    rt.read_all("(keep me) (drop me)").unwrap();
    let dropped = rt.pop().unwrap();
    let kept = rt.peek().unwrap();

    rt.collect_garbage();
    assert_eq!(rt.show(kept), "(keep me)");
    assert_eq!(rt.show(dropped), "#<invalid>");
}

#[test]
fn test_bound_values_survive() {
    let mut rt = tracked_runtime();
    let value = read_one(&mut rt, "(bound \"value\" 1)");
    rt.define("x", value).unwrap();
    read_one(&mut rt, "(garbage)");

    let report = rt.collect_garbage();
    assert_eq!(report.freed, 3);
    let bound = rt.lookup("x").unwrap().unwrap();
    assert_eq!(rt.show(bound), "(bound \"value\" 1)");
}

#[test]
fn test_collected_handle_stays_dead_after_reuse() {
    let mut rt = tracked_runtime();
    let dropped = read_one(&mut rt, "(old list)");
    rt.collect_garbage();

    rt.read_raw("(new list)").unwrap();
    let fresh = rt.peek().unwrap();
    assert_eq!(rt.heap().list_items(dropped), Err(tl::Error::InvalidHandle));
    assert_eq!(rt.show(dropped), "#<invalid>");
    assert!(!rt.equal(dropped, fresh));
    assert_eq!(rt.show(fresh), "(new list)");
}

#[test]
fn test_dropped_scope_releases_bindings() {
    let mut rt = tracked_runtime();
    let top = rt.top_env();
    let scope = rt.new_scope(top).unwrap();
    let key = sym(&mut rt, "local");
    let value = read_one(&mut rt, "(scoped data)");
    rt.env_insert(scope, key, value).unwrap();

    let before = rt.heap().stats();
    rt.collect_garbage();
    assert_eq!(rt.heap().stats(), before);

    rt.drop_scope(scope).unwrap();
    rt.collect_garbage();
    assert_eq!(rt.heap().stats().nodes, 0);
    assert_eq!(rt.heap().stats().strings, 0);
}

#[test]
fn test_collection_is_idempotent() {
    let mut rt = tracked_runtime();
    rt.read_all("(a (b (c)))").unwrap();
    rt.collect_garbage();
    let second = rt.collect_garbage();
    assert_eq!(second.freed, 0);
    assert!(second.retained > 0);
}

#[test]
fn test_table_on_stack_keeps_entries() {
    let mut rt = tracked_runtime();
    let t = rt.new_table().unwrap();
    let key = read_one(&mut rt, "\"key\"");
    let value = read_one(&mut rt, "(entry value)");
    rt.table_insert(t, key, value).unwrap();
    rt.push(Value::Table(t)).unwrap();

    let report = rt.collect_garbage();
    assert_eq!(report.freed, 0);
    assert_eq!(rt.show(rt.table_get(t, key).unwrap().unwrap()), "(entry value)");
}
