//! The evaluation hand-off.
//!
//! The runtime evaluates self-evaluating values itself and hands lists and
//! symbols to an [`Evaluator`]. A full evaluator (special forms, function
//! application, macros) plugs in here; [`Passthrough`] is the minimal one
//! installed by default.

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::value::{EnvId, NodeId, SymId, Value};

/// Evaluates the values the runtime does not handle itself.
pub trait Evaluator {
    /// Evaluates the list starting at `list` in `env`.
    ///
    /// # Errors
    ///
    /// Whatever the evaluator reports.
    fn eval_list(&self, rt: &mut Runtime, list: NodeId, env: EnvId) -> Result<Value>;

    /// Resolves `symbol` in `env`.
    ///
    /// # Errors
    ///
    /// Whatever the evaluator reports.
    fn eval_symbol(&self, rt: &mut Runtime, symbol: SymId, env: EnvId) -> Result<Value>;
}

/// Resolves plain symbols through the environment chain and refuses list
/// application.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Evaluator for Passthrough {
    fn eval_list(&self, _rt: &mut Runtime, _list: NodeId, _env: EnvId) -> Result<Value> {
        tl_log::debug!("list application needs an evaluator");
        Err(Error::Unsupported)
    }

    fn eval_symbol(&self, rt: &mut Runtime, symbol: SymId, env: EnvId) -> Result<Value> {
        match rt.heap().env_get(env, symbol)? {
            Some(value) => Ok(value),
            None => {
                let name = rt.heap().symbol_text(symbol)?;
                tl_log::debug!("unbound identifier '{name}'");
                Err(Error::Unbound { name })
            }
        }
    }
}
