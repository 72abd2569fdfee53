// Environment integration tests
//
// Shadowing, lookup through parents, and where `set` writes.

mod common;

use common::*;
use tl::{Error, Value};

#[test]
fn test_child_binding_shadows_parent() {
    let mut rt = runtime();
    let top = rt.top_env();
    let child = rt.new_scope(top).unwrap();
    let x = sym(&mut rt, "x");

    rt.env_insert(top, x, Value::Int(1)).unwrap();
    rt.env_insert(child, x, Value::Int(2)).unwrap();

    assert_eq!(rt.env_get(child, x).unwrap(), Some(Value::Int(2)));
    assert_eq!(rt.env_get(top, x).unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_child_sees_parent_only_binding() {
    let mut rt = runtime();
    let top = rt.top_env();
    let child = rt.new_scope(top).unwrap();
    let y = sym(&mut rt, "y");

    rt.env_insert(top, y, Value::Int(5)).unwrap();
    assert_eq!(rt.env_get(child, y).unwrap(), Some(Value::Int(5)));
}

#[test]
fn test_set_writes_to_the_binding_scope() {
    let mut rt = runtime();
    let top = rt.top_env();
    let child = rt.new_scope(top).unwrap();
    let z = sym(&mut rt, "z");

    rt.env_insert(top, z, Value::Int(1)).unwrap();
    rt.env_set(child, z, Value::Int(99)).unwrap();

    assert_eq!(rt.env_get(top, z).unwrap(), Some(Value::Int(99)));
    assert!(rt.heap().env(child).unwrap().is_empty());
}

#[test]
fn test_lookup_uses_names_not_handles() {
    let mut rt = runtime();
    let top = rt.top_env();
    let first = sym(&mut rt, "name");
    let second = sym(&mut rt, "name");
    assert_ne!(first, second);

    rt.env_insert(top, first, Value::Char('a')).unwrap();
    assert_eq!(rt.env_get(top, second).unwrap(), Some(Value::Char('a')));
}

#[test]
fn test_three_levels() {
    let mut rt = runtime();
    let top = rt.top_env();
    let mid = rt.new_scope(top).unwrap();
    let low = rt.new_scope(mid).unwrap();
    let a = sym(&mut rt, "a");
    let b = sym(&mut rt, "b");

    rt.env_insert(top, a, Value::Int(1)).unwrap();
    rt.env_insert(mid, b, Value::Int(2)).unwrap();
    rt.env_set(low, a, Value::Int(10)).unwrap();

    assert_eq!(rt.env_get(low, a).unwrap(), Some(Value::Int(10)));
    assert_eq!(rt.env_get(low, b).unwrap(), Some(Value::Int(2)));
    assert_eq!(rt.env_get(top, b).unwrap(), None);
}

#[test]
fn test_set_unbound_and_remove_absent() {
    let mut rt = runtime();
    let top = rt.top_env();
    let child = rt.new_scope(top).unwrap();
    let w = sym(&mut rt, "w");

    assert_eq!(rt.env_set(child, w, Value::Nil), Err(Error::Unbound { name: "w".to_string() }));
    assert_eq!(rt.env_remove(child, w).unwrap(), None);
}

#[test]
fn test_many_bindings_grow_and_keep_order() {
    let mut rt = runtime();
    let top = rt.top_env();
    let names: Vec<String> = (0..200).map(|i| format!("v{i}")).collect();
    for (i, name) in names.iter().enumerate() {
        let key = sym(&mut rt, name);
        rt.env_insert(top, key, Value::Int(i as i64)).unwrap();
    }
    for (i, name) in names.iter().enumerate() {
        assert_eq!(rt.lookup(name).unwrap(), Some(Value::Int(i as i64)));
    }

    let bindings = rt.heap().env_bindings(top).unwrap();
    let order: Vec<String> = bindings.iter().map(|(k, _)| rt.heap().symbol_text(*k).unwrap()).collect();
    assert_eq!(order, names);
}

#[test]
fn test_replaced_key_stays_usable_elsewhere() {
    let mut rt = runtime();
    let top = rt.top_env();
    let form = read_one(&mut rt, "(counter counter)");
    let (items, _) = rt.heap().list_items(form).unwrap();

    rt.env_insert(top, items[0], Value::Int(1)).unwrap();
    let again = sym(&mut rt, "counter");
    assert_eq!(rt.env_insert(top, again, Value::Int(2)).unwrap(), Some(Value::Int(1)));

    assert_eq!(rt.show(form), "(counter counter)");
    assert_eq!(rt.env_get(top, items[0]).unwrap(), Some(Value::Int(2)));
}
