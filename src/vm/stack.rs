//! Value stack for the VM
//!
//! Each call frame's local slots live at the bottom of its stack segment;
//! the interpreter passes the frame base explicitly when reading or
//! writing locals, so the stack itself stays frame-agnostic.

use crate::value::Value;

/// Value stack for bytecode execution
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    /// Create a new stack with the given capacity
    pub fn new(capacity: usize) -> Self {
        Stack {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Push a value onto the stack
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pop a value from the stack
    #[inline]
    pub fn pop(&mut self) -> Option<Value> {
        self.values.pop()
    }

    /// Peek at the top value without removing it
    #[inline]
    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    /// Peek at a value at offset from top (0 = top)
    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<&Value> {
        let len = self.values.len();
        if offset < len {
            Some(&self.values[len - 1 - offset])
        } else {
            None
        }
    }

    /// Get the current stack depth
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shrink the stack to `len` values, dropping everything above.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Pop the top `n` values, preserving their push order.
    pub fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let at = self.values.len().saturating_sub(n);
        self.values.split_off(at)
    }

    /// Duplicate the top value
    pub fn dup(&mut self) -> Option<()> {
        let value = self.peek()?.clone();
        self.push(value);
        Some(())
    }

    /// Swap the top two values
    pub fn swap(&mut self) -> Option<()> {
        let len = self.values.len();
        if len < 2 {
            return None;
        }
        self.values.swap(len - 1, len - 2);
        Some(())
    }

    /// Get local slot `index` of the frame starting at `base`
    #[inline]
    pub fn get_local(&self, base: usize, index: usize) -> Option<&Value> {
        self.values.get(base + index)
    }

    /// Set local slot `index` of the frame starting at `base`
    #[inline]
    pub fn set_local(&mut self, base: usize, index: usize, value: Value) -> Option<()> {
        let slot = self.values.get_mut(base + index)?;
        *slot = value;
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new(16);

        stack.push(Value::number(1.0));
        stack.push(Value::number(2.0));
        stack.push(Value::number(3.0));

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop().unwrap().as_number(), Some(3.0));
        assert_eq!(stack.pop().unwrap().as_number(), Some(2.0));
        assert_eq!(stack.pop().unwrap().as_number(), Some(1.0));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_peek() {
        let mut stack = Stack::new(16);

        stack.push(Value::number(1.0));
        stack.push(Value::number(2.0));

        assert_eq!(stack.peek().unwrap().as_number(), Some(2.0));
        assert_eq!(stack.peek_at(0).unwrap().as_number(), Some(2.0));
        assert_eq!(stack.peek_at(1).unwrap().as_number(), Some(1.0));
        assert!(stack.peek_at(2).is_none());
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut stack = Stack::new(16);

        stack.push(Value::number(1.0));
        stack.push(Value::number(2.0));
        stack.push(Value::number(3.0));

        let args = stack.pop_n(2);
        assert_eq!(args[0].as_number(), Some(2.0));
        assert_eq!(args[1].as_number(), Some(3.0));
        assert_eq!(stack.len(), 1);

        // Asking for more than is available drains the stack.
        let rest = stack.pop_n(5);
        assert_eq!(rest.len(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_dup_and_swap() {
        let mut stack = Stack::new(16);

        stack.push(Value::number(42.0));
        stack.dup();
        assert_eq!(stack.len(), 2);

        stack.push(Value::number(7.0));
        stack.swap();
        assert_eq!(stack.pop().unwrap().as_number(), Some(42.0));
        assert_eq!(stack.pop().unwrap().as_number(), Some(7.0));
    }

    #[test]
    fn test_locals_relative_to_base() {
        let mut stack = Stack::new(16);

        // Caller values below the frame base.
        stack.push(Value::string("caller"));
        let base = stack.len();
        stack.push(Value::undefined());
        stack.push(Value::undefined());

        stack.set_local(base, 0, Value::number(10.0));
        stack.set_local(base, 1, Value::number(20.0));

        assert_eq!(stack.get_local(base, 0).unwrap().as_number(), Some(10.0));
        assert_eq!(stack.get_local(base, 1).unwrap().as_number(), Some(20.0));
        assert!(stack.get_local(base, 2).is_none());
        assert!(stack.set_local(base, 2, Value::Null).is_none());
    }
}
