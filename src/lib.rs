//! Parser and evaluator for RQL, a compact URL-safe query language that
//! encodes filter, sort and pagination intent in a single string:
//!
//! ```text
//! name=jack&age>30&sort(+age)&limit(10)
//! ```
//!
//! Queries parse to a [`Node`] tree, which compiles against a caller-supplied
//! [`PropertyAccessor`] into a reusable [`QueryPlan`] over any in-memory
//! collection.

pub mod access;
pub mod compile;
pub mod converter;
pub mod decoder;
pub mod node;
pub mod parser;
pub mod plan;
pub mod render;
pub mod value;

pub use access::{JsonAccessor, PropertyAccessor};
pub use compile::{CompileError, QueryCompiler};
pub use converter::{ConvertError, Converter};
pub use decoder::DecodeError;
pub use node::{Argument, Node, NodeVisitor};
pub use parser::{ParseError, Parser};
pub use plan::QueryPlan;
pub use value::{Number, RegexValue, Value};
