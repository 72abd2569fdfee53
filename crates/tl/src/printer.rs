//! Text form of values.
//!
//! Everything the reader produces prints back to text that reads as an
//! equal value. Other values print as `#<...>` descriptions.
//!
//! [`Show`] goes through [`fmt::Display`], which needs UTF-8, so string and
//! symbol bytes that are not valid UTF-8 come out replaced.
//! [`Heap::show_bytes`] writes them unchanged.

use crate::heap::Heap;
use crate::value::Value;
use std::fmt::{self, Write};
use tl_mem::ArenaIndex;

/// [`Display`](fmt::Display) adapter returned by [`Heap::show`].
#[derive(Clone, Copy)]
pub struct Show<'h> {
    heap: &'h Heap,
    value: Value,
}

impl Heap {
    /// Printable form of `value`.
    #[must_use]
    pub fn show(&self, value: Value) -> Show<'_> {
        Show { heap: self, value }
    }

    /// Printed form of `value` as bytes, with string and symbol contents
    /// copied as stored.
    #[must_use]
    pub fn show_bytes(&self, value: Value) -> Vec<u8> {
        let mut out = ByteSink(Vec::new());
        // Writing into a Vec cannot fail.
        let _ = print(self, value, &mut out);
        out.0
    }
}

/// Destination of printed output.
trait Sink: Write {
    /// Contents of a string or symbol segment.
    fn raw(&mut self, bytes: &[u8]) -> fmt::Result;
}

impl Sink for fmt::Formatter<'_> {
    fn raw(&mut self, bytes: &[u8]) -> fmt::Result {
        self.write_str(&String::from_utf8_lossy(bytes))
    }
}

struct ByteSink(Vec<u8>);

impl Write for ByteSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl Sink for ByteSink {
    fn raw(&mut self, bytes: &[u8]) -> fmt::Result {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
}

enum Item {
    Value(Value),
    /// What follows a list element: more elements, a dotted tail or nothing.
    Rest(Value),
    Text(&'static str),
}

impl fmt::Display for Show<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print(self.heap, self.value, f)
    }
}

fn print<S: Sink>(heap: &Heap, value: Value, out: &mut S) -> fmt::Result {
    let mut work = vec![Item::Value(value)];
    while let Some(item) = work.pop() {
        match item {
            Item::Text(text) => out.write_str(text)?,
            Item::Rest(Value::Nil) => {}
            Item::Rest(Value::Node(id)) => match heap.node(id) {
                Some(node) => {
                    out.write_str(" ")?;
                    work.push(Item::Rest(node.tail));
                    work.push(Item::Value(node.head));
                }
                None => out.write_str(" . #<invalid>")?,
            },
            Item::Rest(tail) => {
                out.write_str(" . ")?;
                work.push(Item::Value(tail));
            }
            Item::Value(Value::Node(id)) => match heap.node(id) {
                Some(node) => {
                    out.write_str("(")?;
                    work.push(Item::Text(")"));
                    work.push(Item::Rest(node.tail));
                    work.push(Item::Value(node.head));
                }
                None => out.write_str("#<invalid>")?,
            },
            Item::Value(atom) => print_atom(heap, atom, out)?,
        }
    }
    Ok(())
}

fn print_atom<S: Sink>(heap: &Heap, value: Value, out: &mut S) -> fmt::Result {
    match value {
        Value::Nil => out.write_str("#nil"),
        Value::Bool(true) => out.write_str("#true"),
        Value::Bool(false) => out.write_str("#false"),
        Value::Int(i) => write!(out, "{i}"),
        Value::UInt(u) => write!(out, "{u}"),
        Value::Double(d) => {
            let text = d.to_string();
            if text.contains('.') || !d.is_finite() {
                out.write_str(&text)
            } else {
                write!(out, "{text}.0")
            }
        }
        Value::Char(c) => write!(out, "#\\{c}"),
        Value::Str(id) => match heap.str_bytes(id) {
            Some(bytes) => {
                out.write_str("\"")?;
                out.raw(bytes)?;
                out.write_str("\"")
            }
            None => out.write_str("#<invalid>"),
        },
        Value::Symbol(id) => match heap.symbol_parts(id) {
            Ok(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.write_str(".")?;
                    }
                    out.raw(part)?;
                }
                Ok(())
            }
            Err(_) => out.write_str("#<invalid>"),
        },
        Value::Function(id) => write!(out, "#<function {}>", id.slot()),
        Value::Macro(id) => write!(out, "#<macro {}>", id.slot()),
        Value::UserFunction(_) => out.write_str("#<native-function>"),
        Value::UserMacro(_) => out.write_str("#<native-macro>"),
        Value::Opaque(word) => write!(out, "#<opaque {word:#x}>"),
        Value::Table(id) => write!(out, "#<table {}>", id.slot()),
        Value::Node(_) => unreachable!("lists are handled by the caller"),
    }
}

impl fmt::Debug for Show<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
