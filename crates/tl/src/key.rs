//! Hashing and comparison of key values.
//!
//! Strings and symbol segments hash their bytes with one-at-a-time;
//! characters and booleans hash to their code; integers go through the
//! integer mixer. Keys of different types are never equal, even when their
//! hashes collide.

use crate::error::{Error, Result};
use crate::value::{Segment, Str, StrId, SymId, Value};
use tl_mem::{Arena, mix_int, one_at_a_time};

/// Read-only view of the arenas key operations need.
///
/// Borrowing only these two fields lets the heap compare keys while it
/// holds an environment or table mutably.
#[derive(Clone, Copy)]
pub(crate) struct Keys<'a> {
    pub(crate) strings: &'a Arena<StrId, Str>,
    pub(crate) segments: &'a Arena<SymId, Segment>,
}

impl<'a> Keys<'a> {
    pub(crate) fn bytes(&self, id: StrId) -> Option<&'a [u8]> {
        self.strings.get(id).map(Str::as_bytes)
    }

    /// The text of a single-segment symbol.
    pub(crate) fn ident(&self, id: SymId) -> Result<&'a [u8]> {
        let segment = self.segments.get(id).ok_or(Error::InvalidHandle)?;
        if segment.next.is_some() {
            tl_log::debug!("multipart symbol used as a key");
            return Err(Error::MultipartKey);
        }
        self.bytes(segment.part).ok_or(Error::InvalidHandle)
    }

    /// Hash of an identifier key.
    pub(crate) fn hash_ident(&self, id: SymId) -> Result<u64> {
        Ok(one_at_a_time(self.ident(id)?))
    }

    /// Hash of any keyable value.
    pub(crate) fn hash(&self, key: Value) -> Result<u64> {
        match key {
            Value::Str(id) => self.bytes(id).map(one_at_a_time).ok_or(Error::InvalidHandle),
            Value::Symbol(id) => self.hash_ident(id),
            Value::Char(c) => Ok(u64::from(c)),
            Value::Bool(b) => Ok(u64::from(b)),
            Value::Int(i) => Ok(mix_int(i as u64)),
            Value::UInt(u) => Ok(mix_int(u)),
            other => {
                tl_log::debug!("{} values cannot be keys", other.type_name());
                Err(Error::Unkeyable { type_name: other.type_name() })
            }
        }
    }

    pub(crate) fn ident_eq(&self, a: SymId, b: SymId) -> bool {
        a == b
            || matches!(
                (self.ident(a), self.ident(b)),
                (Ok(x), Ok(y)) if x == y
            )
    }

    /// Key equality: same type and same content. Only meaningful for values
    /// [`Keys::hash`] accepts.
    pub(crate) fn eq(&self, a: &Value, b: &Value) -> bool {
        match (*a, *b) {
            (Value::Str(x), Value::Str(y)) => {
                x == y || matches!((self.bytes(x), self.bytes(y)), (Some(p), Some(q)) if p == q)
            }
            (Value::Symbol(x), Value::Symbol(y)) => self.ident_eq(x, y),
            (Value::Char(x), Value::Char(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::UInt(x), Value::UInt(y)) => x == y,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Heap;
    use crate::error::Error;
    use crate::value::Value;
    use tl_mem::{mix_int, one_at_a_time};

    #[test]
    fn test_hash_by_type() {
        let mut heap = Heap::default();
        let s = heap.string("abc").unwrap();
        let keys = heap.keys();

        assert_eq!(keys.hash(Value::Str(s)).unwrap(), one_at_a_time(b"abc"));
        assert_eq!(keys.hash(Value::Char('a')).unwrap(), 97);
        assert_eq!(keys.hash(Value::Bool(true)).unwrap(), 1);
        assert_eq!(keys.hash(Value::Int(5)).unwrap(), mix_int(5));
        assert_eq!(keys.hash(Value::UInt(5)).unwrap(), mix_int(5));
    }

    #[test]
    fn test_symbol_and_string_keys_share_hash_not_identity() {
        let mut heap = Heap::default();
        let s = Value::Str(heap.string("x").unwrap());
        let y = Value::Symbol(heap.symbol(&["x"]).unwrap());
        let keys = heap.keys();

        assert_eq!(keys.hash(s).unwrap(), keys.hash(y).unwrap());
        assert!(!keys.eq(&s, &y));
        assert!(!keys.eq(&Value::Int(1), &Value::UInt(1)));
    }

    #[test]
    fn test_equal_content_different_objects() {
        let mut heap = Heap::default();
        let a = Value::Str(heap.string("same").unwrap());
        let b = Value::Str(heap.string("same").unwrap());
        let c = Value::Str(heap.string("sam").unwrap());
        let keys = heap.keys();

        assert!(keys.eq(&a, &b));
        assert!(!keys.eq(&a, &c));
    }

    #[test]
    fn test_multipart_symbol_rejected() {
        let mut heap = Heap::default();
        let sym = heap.symbol(&["math", "sin"]).unwrap();
        assert_eq!(heap.keys().hash(Value::Symbol(sym)), Err(Error::MultipartKey));
    }

    #[test]
    fn test_unkeyable() {
        let heap = Heap::default();
        let err = heap.keys().hash(Value::Double(1.5)).unwrap_err();
        assert_eq!(err, Error::Unkeyable { type_name: "Double" });
        assert!(heap.keys().hash(Value::Nil).is_err());
    }
}
