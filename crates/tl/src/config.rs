//! Runtime configuration.

use crate::error::{Error, Result};
use crate::value::Value;
use tl_mem::FitPolicy;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Evaluation stack slots.
    pub stack_size: usize,
    /// Initial bucket-array capacity of new environment scopes.
    pub env_capacity: usize,
    /// Initial bucket-array capacity of new tables.
    pub table_capacity: usize,
    /// Fit policy applied after a binding or entry is added.
    pub grow: FitPolicy,
    /// Fit policy applied after a binding or entry is removed.
    pub shrink: FitPolicy,
    /// Whether the runtime fits environments and tables after mutating
    /// them.
    pub fit_after_mutation: bool,
    /// Values placed at the bottom of the stack on startup. Immediates only.
    pub preinit: Vec<Value>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: 256,
            env_capacity: 8,
            table_capacity: 8,
            grow: FitPolicy::GROW,
            shrink: FitPolicy::SHRINK,
            fit_after_mutation: true,
            preinit: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Sets the stack size.
    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Sets the initial capacity of environment scopes.
    #[must_use]
    pub fn with_env_capacity(mut self, capacity: usize) -> Self {
        self.env_capacity = capacity;
        self
    }

    /// Sets the initial capacity of tables.
    #[must_use]
    pub fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self
    }

    /// Sets both fit policies.
    #[must_use]
    pub fn with_fit_policies(mut self, grow: FitPolicy, shrink: FitPolicy) -> Self {
        self.grow = grow;
        self.shrink = shrink;
        self
    }

    /// Turns fitting after mutation on or off.
    #[must_use]
    pub fn with_fit_after_mutation(mut self, enabled: bool) -> Self {
        self.fit_after_mutation = enabled;
        self
    }

    /// Starts the stack with `values`, bottom first.
    #[must_use]
    pub fn preinit_stack(mut self, values: impl Into<Vec<Value>>) -> Self {
        self.preinit = values.into();
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.stack_size == 0 {
            return Err(Error::InvalidConfig("stack_size must be positive".to_string()));
        }
        if self.env_capacity == 0 || self.table_capacity == 0 {
            return Err(Error::InvalidConfig("initial capacities must be positive".to_string()));
        }
        if let Err(err) = self.grow.validate() {
            return Err(Error::InvalidConfig(format!("grow policy: {err}")));
        }
        if let Err(err) = self.shrink.validate() {
            return Err(Error::InvalidConfig(format!("shrink policy: {err}")));
        }
        if self.preinit.len() > self.stack_size {
            return Err(Error::InvalidConfig(format!(
                "{} preinit values exceed stack_size {}",
                self.preinit.len(),
                self.stack_size
            )));
        }
        if let Some(value) = self.preinit.iter().find(|v| !v.is_immediate()) {
            return Err(Error::InvalidConfig(format!(
                "preinit value of type {} is not an immediate",
                value.type_name()
            )));
        }
        Ok(())
    }
}
