//! # RQL Abstract Syntax Tree
//!
//! A parsed query is a tree of [`Node`]s, each representing one operator or
//! function call: a name (`eq`, `and`, `sort`, `limit`, ...) and an ordered
//! argument list. Arguments are either converted [`Value`]s or nested nodes.
//!
//! ```text
//! (name=jack|name=jill)&age>30
//! ```
//!
//! parses to
//!
//! ```text
//! and(or(eq(name,jack),eq(name,jill)),gt(age,30))
//! ```
//!
//! An empty name marks the synthetic query root, which exists only when a
//! query has several top-level terms; a single predicate is returned
//! unwrapped. Finished trees carry no construction state and compare
//! structurally, so two queries with the same meaning produce equal nodes
//! regardless of how they were written.
//!
//! Consumers that want a custom rendering (SQL text, a remote filter
//! protocol, ...) walk the tree through [`NodeVisitor`]; the built-in query
//! compiler and the [`render`](crate::render) module are both clients of
//! this model.

use std::fmt;

use crate::value::Value;

/// One argument of a [`Node`]: a converted value or a nested call.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    Node(Node),
}

impl Argument {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            Argument::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Argument::Node(n) => Some(n),
            Argument::Value(_) => None,
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<Node> for Argument {
    fn from(node: Node) -> Self {
        Argument::Node(node)
    }
}

impl From<&str> for Argument {
    fn from(text: &str) -> Self {
        Argument::Value(Value::String(text.to_string()))
    }
}

impl From<i64> for Argument {
    fn from(n: i64) -> Self {
        Argument::Value(Value::Number(crate::value::Number::Integer(n)))
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(v) => write!(f, "{}", v),
            Argument::Node(n) => write!(f, "{}", n),
        }
    }
}

/// One call in the functional AST: an operator name and its arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    name: String,
    arguments: Vec<Argument>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Node {
            name: name.into(),
            arguments,
        }
    }

    /// Chainable argument append, mainly for building expected trees in tests.
    pub fn arg(mut self, argument: impl Into<Argument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A node without a name is the synthetic root or a bare group.
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }

    pub fn into_arguments(self) -> Vec<Argument> {
        self.arguments
    }

    /// Child nodes, skipping plain value arguments.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.arguments.iter().filter_map(Argument::as_node)
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn push_argument(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", argument)?;
        }
        f.write_str(")")
    }
}

/// Walks a finished [`Node`] tree and produces a result per node.
///
/// Implementations decide how to recurse into child nodes.
pub trait NodeVisitor<R> {
    fn visit(&self, node: &Node) -> R;
}
