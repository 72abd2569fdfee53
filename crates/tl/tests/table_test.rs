// Table integration tests
//
// Keys of every keyable type, content equality for strings and symbols,
// and the errors for keys that cannot be hashed.

mod common;

use common::*;
use tl::{Error, Value};

#[test]
fn test_read_values_as_keys() {
    let mut rt = runtime();
    let t = rt.new_table().unwrap();

    let keys = ["\"str\"", "sym", "42", "#true"];
    for (i, src) in keys.iter().enumerate() {
        let key = read_one(&mut rt, src);
        rt.table_insert(t, key, Value::Int(i as i64)).unwrap();
    }
    for (i, src) in keys.iter().enumerate() {
        let key = read_one(&mut rt, src);
        assert_eq!(rt.table_get(t, key).unwrap(), Some(Value::Int(i as i64)), "{src}");
    }
}

#[test]
fn test_string_and_symbol_with_same_text_are_distinct() {
    let mut rt = runtime();
    let t = rt.new_table().unwrap();
    let s = read_one(&mut rt, "\"k\"");
    let y = read_one(&mut rt, "k");

    rt.table_insert(t, s, Value::Int(1)).unwrap();
    rt.table_insert(t, y, Value::Int(2)).unwrap();
    assert_eq!(rt.heap().table_len(t).unwrap(), 2);
    assert_eq!(rt.table_get(t, s).unwrap(), Some(Value::Int(1)));
    assert_eq!(rt.table_get(t, y).unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_unhashable_keys() {
    let mut rt = runtime();
    let t = rt.new_table().unwrap();
    let list = read_one(&mut rt, "(1)");
    let dotted = read_one(&mut rt, "a.b");

    assert_eq!(rt.table_insert(t, list, Value::Nil), Err(Error::Unkeyable { type_name: "Node" }));
    assert_eq!(rt.table_insert(t, Value::Double(1.5), Value::Nil), Err(Error::Unkeyable { type_name: "Double" }));
    assert_eq!(rt.table_get(t, dotted), Err(Error::MultipartKey));
}

#[test]
fn test_set_requires_existing_key() {
    let mut rt = runtime();
    let t = rt.new_table().unwrap();
    assert_eq!(rt.table_set(t, Value::Char('c'), Value::Nil), Err(Error::KeyNotFound));

    rt.table_insert(t, Value::Char('c'), Value::Int(1)).unwrap();
    rt.table_set(t, Value::Char('c'), Value::Int(2)).unwrap();
    assert_eq!(rt.table_get(t, Value::Char('c')).unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_replace_keeps_position() {
    let mut rt = runtime();
    let t = rt.new_table().unwrap();
    for k in 0..5 {
        rt.table_insert(t, Value::Int(k), Value::Int(k)).unwrap();
    }
    assert_eq!(rt.table_insert(t, Value::Int(2), Value::Int(20)).unwrap(), Some(Value::Int(2)));

    let entries = rt.heap().table_entries(t).unwrap();
    let values: Vec<Value> = entries.iter().map(|(_, v)| *v).collect();
    assert_eq!(values, [0, 1, 20, 3, 4].map(Value::Int));
}

#[test]
fn test_tables_nest() {
    let mut rt = runtime();
    let outer = rt.new_table().unwrap();
    let inner = rt.new_table().unwrap();
    rt.table_insert(inner, Value::Int(1), Value::TRUE).unwrap();
    rt.table_insert(outer, Value::Int(0), Value::Table(inner)).unwrap();

    let Some(Value::Table(found)) = rt.table_get(outer, Value::Int(0)).unwrap() else {
        panic!("expected a table");
    };
    assert_eq!(rt.table_get(found, Value::Int(1)).unwrap(), Some(Value::TRUE));
}
