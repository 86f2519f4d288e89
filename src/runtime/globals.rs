//! Global namespace backing a state.

use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Name-to-value table for global bindings.
///
/// Binding the same name again replaces the previous value; the last
/// write wins.
#[derive(Debug, Default)]
pub struct Globals {
    table: HashMap<Rc<str>, Value>,
}

impl Globals {
    pub fn new() -> Self {
        Globals::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.table.get(name)
    }

    pub fn set(&mut self, name: impl Into<Rc<str>>, value: Value) {
        self.table.insert(name.into(), value);
    }

    /// Create the binding with `undefined` unless it already exists.
    pub fn declare(&mut self, name: impl Into<Rc<str>>) {
        self.table.entry(name.into()).or_insert(Value::Undefined);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
