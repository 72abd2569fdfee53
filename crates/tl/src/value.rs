//! The tagged value type and the heap object layouts behind it.
//!
//! [`Value`] is small and `Copy`. Immediates (characters, booleans,
//! numbers, opaque words) live in the value itself; everything else is a
//! typed index into one of the [`Heap`](crate::Heap) arenas, so copying a
//! value shares the object instead of duplicating it.

use crate::error::Result;
use crate::runtime::Runtime;
use std::fmt;
use tl_mem::{ArenaIndex, HashTable};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            slot: u32,
            generation: u32,
        }

        impl ArenaIndex for $name {
            fn from_parts(slot: u32, generation: u32) -> Self {
                Self { slot, generation }
            }

            fn slot(self) -> u32 {
                self.slot
            }

            fn generation(self) -> Option<u32> {
                Some(self.generation)
            }
        }
    };
}

define_id!(
    /// Handle of a cons cell.
    NodeId
);
define_id!(
    /// Handle of a string.
    StrId
);
define_id!(
    /// Handle of a symbol, i.e. of its first segment.
    SymId
);
define_id!(
    /// Handle of a function or macro closure.
    FuncId
);
define_id!(
    /// Handle of an environment scope.
    EnvId
);
define_id!(
    /// Handle of a table.
    TableId
);

/// A host function callable from the runtime.
#[derive(Clone, Copy)]
pub struct NativeFn(pub fn(&mut Runtime) -> Result<()>);

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::fn_addr_eq(self.0, other.0)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({:p})", self.0 as *const ())
    }
}

/// Every runtime datum.
///
/// The derived `PartialEq` is identity: two `Str` values are equal only if
/// they name the same string. Structural equality is
/// [`Heap::equal`](crate::Heap::equal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The empty list and the absent value.
    Nil,
    /// A cons cell.
    Node(NodeId),
    /// A byte string.
    Str(StrId),
    /// A character.
    Char(char),
    /// A possibly dotted identifier.
    Symbol(SymId),
    /// `#true` or `#false`.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A double.
    Double(f64),
    /// A closure.
    Function(FuncId),
    /// A closure whose arguments are passed unevaluated.
    Macro(FuncId),
    /// A host function.
    UserFunction(NativeFn),
    /// A host macro.
    UserMacro(NativeFn),
    /// An opaque host word.
    Opaque(usize),
    /// A table.
    Table(TableId),
}

impl Value {
    /// `#true`.
    pub const TRUE: Value = Value::Bool(true);
    /// `#false`.
    pub const FALSE: Value = Value::Bool(false);

    /// Short type name used in logs and errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Node(_) => "Node",
            Value::Str(_) => "String",
            Value::Char(_) => "Char",
            Value::Symbol(_) => "Symbol",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::UInt(_) => "UInt",
            Value::Double(_) => "Double",
            Value::Function(_) => "Func",
            Value::Macro(_) => "Macro",
            Value::UserFunction(_) => "UFunc",
            Value::UserMacro(_) => "UMacro",
            Value::Opaque(_) => "UPtr",
            Value::Table(_) => "Table",
        }
    }

    /// Whether this is [`Value::Nil`].
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Whether the value owns nothing on the heap.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        !matches!(
            self,
            Value::Node(_)
                | Value::Str(_)
                | Value::Symbol(_)
                | Value::Function(_)
                | Value::Macro(_)
                | Value::Table(_)
        )
    }

    /// Whether values of this type may be table keys. Symbols additionally
    /// need a single segment, which only the heap can tell.
    #[must_use]
    pub const fn can_key(&self) -> bool {
        matches!(
            self,
            Value::Str(_)
                | Value::Symbol(_)
                | Value::Char(_)
                | Value::Bool(_)
                | Value::Int(_)
                | Value::UInt(_)
        )
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

/// A cons cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// First element.
    pub head: Value,
    /// Rest of the list, or a dotted tail.
    pub tail: Value,
}

/// A byte string. An empty string has no buffer at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Str {
    pub(crate) bytes: Option<Box<[u8]>>,
}

impl Str {
    /// The bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or(&[])
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, |b| b.len())
    }

    /// Whether the string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_none()
    }
}

/// One segment of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// The segment's text.
    pub part: StrId,
    /// The following segment, for dotted symbols.
    pub next: Option<SymId>,
}

/// A function or macro closure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closure {
    /// Defining scope.
    pub env: EnvId,
    /// Parameter list.
    pub params: Value,
    /// Body expression list.
    pub body: Value,
}

/// An environment scope.
pub struct Env {
    pub(crate) bindings: HashTable<SymId, Value>,
    pub(crate) parent: Option<EnvId>,
}

impl Env {
    /// The enclosing scope.
    #[must_use]
    pub fn parent(&self) -> Option<EnvId> {
        self.parent
    }

    /// Bindings made directly in this scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether this scope binds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A table object.
pub struct Table {
    pub(crate) map: HashTable<Value, Value>,
}
