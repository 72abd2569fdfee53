//! The evaluation stack.
//!
//! Fixed capacity, reserved up front through the allocator. Overflow and
//! underflow are errors; the stack never grows.

use crate::error::{Error, Result};
use crate::value::Value;
use tl_mem::{AllocKind, Allocator};

/// Fixed-capacity value stack.
#[derive(Debug)]
pub struct Stack {
    values: Vec<Value>,
    capacity: usize,
    reserved: bool,
}

impl Stack {
    fn bytes(capacity: usize) -> usize {
        capacity * std::mem::size_of::<Value>()
    }

    /// A stack of `capacity` slots.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the slots are refused.
    pub fn with_capacity<A>(capacity: usize, alloc: &mut A) -> Result<Self>
    where
        A: Allocator + ?Sized,
    {
        alloc.allocate(AllocKind::Stack, Self::bytes(capacity))?;
        Ok(Self { values: Vec::with_capacity(capacity), capacity, reserved: true })
    }

    /// Pushes `value`.
    ///
    /// # Errors
    ///
    /// [`Error::StackOverflow`] when every slot is in use.
    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.values.len() == self.capacity {
            tl_log::debug!("stack overflow pushing {}", value.type_name());
            return Err(Error::StackOverflow { capacity: self.capacity });
        }
        tl_log::trace!("push {} at {}", value.type_name(), self.values.len());
        self.values.push(value);
        Ok(())
    }

    /// Pops the top value.
    ///
    /// # Errors
    ///
    /// [`Error::StackUnderflow`] when empty.
    pub fn pop(&mut self) -> Result<Value> {
        match self.values.pop() {
            Some(value) => {
                tl_log::trace!("pop {} from {}", value.type_name(), self.values.len());
                Ok(value)
            }
            None => {
                tl_log::debug!("stack underflow");
                Err(Error::StackUnderflow)
            }
        }
    }

    /// The top value, left in place.
    ///
    /// # Errors
    ///
    /// [`Error::StackUnderflow`] when empty.
    pub fn peek(&self) -> Result<Value> {
        self.values.last().copied().ok_or(Error::StackUnderflow)
    }

    /// Values in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no slot is in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Total slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values bottom to top.
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Returns the slots to `alloc`, leaving a stack with no capacity.
    pub fn release<A>(&mut self, alloc: &mut A)
    where
        A: Allocator + ?Sized,
    {
        if std::mem::take(&mut self.reserved) {
            alloc.deallocate(AllocKind::Stack, Self::bytes(self.capacity));
        }
        self.values = Vec::new();
        self.capacity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_mem::{SystemAllocator, TrackingAllocator};

    #[test]
    fn test_push_pop_peek() {
        let mut stack = Stack::with_capacity(4, &mut SystemAllocator).unwrap();
        stack.push(Value::Int(1)).unwrap();
        stack.push(Value::Int(2)).unwrap();

        assert_eq!(stack.peek().unwrap(), Value::Int(2));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap(), Value::Int(2));
        assert_eq!(stack.pop().unwrap(), Value::Int(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_overflow_and_underflow() {
        let mut stack = Stack::with_capacity(1, &mut SystemAllocator).unwrap();
        assert_eq!(stack.pop(), Err(Error::StackUnderflow));
        assert_eq!(stack.peek(), Err(Error::StackUnderflow));

        stack.push(Value::Nil).unwrap();
        assert_eq!(stack.push(Value::Nil), Err(Error::StackOverflow { capacity: 1 }));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_accounting() {
        let mut alloc = TrackingAllocator::new();
        let mut stack = Stack::with_capacity(8, &mut alloc).unwrap();
        assert_eq!(alloc.live_bytes(AllocKind::Stack), 8 * std::mem::size_of::<Value>());

        stack.release(&mut alloc);
        assert_eq!(alloc.live_bytes(AllocKind::Stack), 0);
        stack.release(&mut alloc);
        assert_eq!(alloc.live_bytes(AllocKind::Stack), 0);
        assert_eq!(stack.push(Value::Nil), Err(Error::StackOverflow { capacity: 0 }));
    }

    #[test]
    fn test_refused() {
        let mut alloc = TrackingAllocator::new().with_kind_limit(AllocKind::Stack, 16);
        assert!(matches!(Stack::with_capacity(64, &mut alloc), Err(Error::OutOfMemory(_))));
    }
}
