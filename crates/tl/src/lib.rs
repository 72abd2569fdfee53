//! `TL`: a small Lisp runtime core
//!
//! `TL` provides the pieces an evaluator for a small Lisp sits on:
//!
//! - **Values** as `Copy` tagged handles into per-kind arenas
//! - **Reader** that turns text into lists, strings, numbers, dotted symbols
//!   and literals with a single-pass state machine
//! - **Environments and tables** backed by a chained hash table that keeps
//!   insertion order
//! - **Evaluation stack** of fixed capacity shared with native functions
//! - **Accounting allocator** seam so every allocation can be tracked,
//!   limited or refused, and a tracing collector run on demand
//!
//! # Architecture
//!
//! - **Memory layer** (`tl-mem`): allocation kinds, arenas, hash table engine
//! - **Object layer**: [`Heap`] owns every object; [`Value`]s point into it
//! - **Runtime layer**: [`Runtime`] ties heap, stack, top environment and
//!   [`Evaluator`] together
//!
//! # Example
//!
//! ```rust
//! use tl::{Runtime, RuntimeConfig, Value};
//!
//! let mut rt = Runtime::new(RuntimeConfig::default()).unwrap();
//! rt.read_raw("(1 . (2 3))").unwrap();
//! let list = rt.pop().unwrap();
//! assert_eq!(rt.show(list), "(1 2 3)");
//!
//! rt.define("answer", Value::Int(42)).unwrap();
//! rt.read_raw("answer").unwrap();
//! rt.eval().unwrap();
//! assert_eq!(rt.pop().unwrap(), Value::Int(42));
//! ```

pub mod config;
mod env;
pub mod error;
pub mod eval;
pub mod gc;
pub mod heap;
mod key;
pub mod printer;
pub mod reader;
pub mod runtime;
pub mod stack;
mod table;
pub mod value;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use eval::{Evaluator, Passthrough};
pub use gc::GcReport;
pub use heap::{Heap, HeapStats};
pub use printer::Show;
pub use reader::{Parsed, parse};
pub use runtime::Runtime;
pub use stack::Stack;
pub use value::{Closure, Env, EnvId, FuncId, NativeFn, Node, NodeId, Segment, Str, StrId, SymId, Table, TableId, Value};

pub use tl_mem::{AllocError, AllocKind, AllocStats, Allocator, FitOutcome, FitPolicy, SystemAllocator, TrackingAllocator};
