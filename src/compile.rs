//! Compilation of [`Node`] trees into executable [`QueryPlan`]s.
//!
//! Three walkers share the tree: one builds the predicate, one the composite
//! sort comparator, one extracts limit/offset. Each ignores nodes that are
//! not its target function — `sort(...)` contributes nothing to the
//! predicate and a query without `limit(...)` simply has no pagination —
//! but a malformed node of a walker's own feature is a hard error.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::RegexBuilder;
use thiserror::Error;
use tracing::debug;

use crate::access::PropertyAccessor;
use crate::node::{Argument, Node};
use crate::plan::{Comparator, Predicate, QueryPlan};
use crate::value::Value;

/// A fatal compile error. The AST was well-formed RQL but cannot be turned
/// into an executable plan.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("'not' takes exactly one predicate argument, got {0}")]
    NotArity(usize),

    #[error("operator '{0}' requires a property name as its first argument")]
    InvalidProperty(String),

    #[error("operator '{0}' is missing its value argument")]
    MissingArgument(String),

    #[error("sort arguments must be property names, got '{0}'")]
    InvalidSortArgument(String),

    #[error("limit takes a count and an optional offset, both non-negative integers")]
    InvalidLimitArgument,

    #[error("invalid match pattern '{pattern}': {source}")]
    InvalidMatchPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// The closed operator set. Anything else is a custom function: kept in the
/// AST for external visitors, ignored by the built-in walkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    Contains,
    In,
    Sort,
    Limit,
    Custom,
}

impl Operator {
    fn from_name(name: &str) -> Operator {
        match name {
            "and" => Operator::And,
            "or" => Operator::Or,
            "not" => Operator::Not,
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "lt" => Operator::Lt,
            "le" => Operator::Le,
            "gt" => Operator::Gt,
            "ge" => Operator::Ge,
            "match" | "like" => Operator::Match,
            "contains" => Operator::Contains,
            "in" => Operator::In,
            "sort" => Operator::Sort,
            "limit" => Operator::Limit,
            _ => Operator::Custom,
        }
    }

    fn test(self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            _ => false,
        }
    }
}

/// Compiles parsed queries against one property accessor.
///
/// The compiler captures the accessor in the plans it produces, so a single
/// compiler can serve many queries over the same item type.
///
/// # Examples
///
/// ```
/// use rql::{JsonAccessor, Parser, QueryCompiler};
/// use serde_json::json;
///
/// let node = Parser::new().parse("age>30&sort(-age)&limit(10)").unwrap();
/// let plan = QueryCompiler::new(JsonAccessor).compile(&node).unwrap();
///
/// let people = vec![json!({"age": 25}), json!({"age": 40}), json!({"age": 35})];
/// let result = plan.apply(people);
/// assert_eq!(result, vec![json!({"age": 40}), json!({"age": 35})]);
/// ```
pub struct QueryCompiler<T> {
    accessor: Arc<dyn PropertyAccessor<T>>,
}

impl<T: 'static> QueryCompiler<T> {
    pub fn new(accessor: impl PropertyAccessor<T> + 'static) -> Self {
        QueryCompiler {
            accessor: Arc::new(accessor),
        }
    }

    pub fn from_arc(accessor: Arc<dyn PropertyAccessor<T>>) -> Self {
        QueryCompiler { accessor }
    }

    /// Compiles `node` into a reusable plan.
    ///
    /// The pagination convention is `limit(count, offset)` — count first,
    /// offset optional.
    pub fn compile(&self, node: &Node) -> Result<QueryPlan<T>, CompileError> {
        let predicate = self.predicate(node)?;
        let sort = self.sort_comparator(node)?;
        let limit_offset = limit_offset(node)?;
        let (limit, offset) = match limit_offset {
            Some((limit, offset)) => (Some(limit), offset),
            None => (None, None),
        };
        debug!(
            ast = %node,
            filtered = predicate.is_some(),
            sorted = sort.is_some(),
            limit,
            offset,
            "compiled query plan"
        );
        Ok(QueryPlan {
            predicate,
            sort,
            limit,
            offset,
        })
    }

    fn predicate(&self, node: &Node) -> Result<Option<Predicate<T>>, CompileError> {
        let operator = Operator::from_name(node.name());
        match operator {
            Operator::And => {
                let children = self.child_predicates(node)?;
                if children.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Box::new(move |item| {
                    children.iter().all(|p| p(item))
                })))
            }
            Operator::Or => {
                let children = self.child_predicates(node)?;
                if children.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Box::new(move |item| {
                    children.iter().any(|p| p(item))
                })))
            }
            Operator::Not => {
                let mut children = self.child_predicates(node)?;
                if children.len() != 1 {
                    return Err(CompileError::NotArity(children.len()));
                }
                let inner = children.pop().expect("one predicate");
                Ok(Some(Box::new(move |item| !inner(item))))
            }
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge => self.comparison(node, operator).map(Some),
            Operator::Match => self.match_predicate(node).map(Some),
            Operator::Contains => self.contains_predicate(node).map(Some),
            Operator::In => self.in_predicate(node).map(Some),
            Operator::Sort | Operator::Limit | Operator::Custom => Ok(None),
        }
    }

    fn child_predicates(&self, node: &Node) -> Result<Vec<Predicate<T>>, CompileError> {
        let mut predicates = Vec::new();
        for child in node.children() {
            if let Some(predicate) = self.predicate(child)? {
                predicates.push(predicate);
            }
        }
        Ok(predicates)
    }

    fn comparison(&self, node: &Node, operator: Operator) -> Result<Predicate<T>, CompileError> {
        let property = property_of(node)?;
        let target = comparand(node, 1)?;
        let accessor = Arc::clone(&self.accessor);
        Ok(Box::new(move |item| {
            let actual = accessor.get(item, &property);
            operator.test(accessor.compare(&property, &actual, &target))
        }))
    }

    fn match_predicate(&self, node: &Node) -> Result<Predicate<T>, CompileError> {
        let property = property_of(node)?;
        let target = comparand(node, 1)?;

        // a regex value is used as-is with its own case flag; plain text is
        // a wildcard pattern, always case-insensitive. Both match the whole
        // stringified property value, not a substring.
        let (pattern, case_insensitive) = match &target {
            Value::Regex(re) => (re.pattern().to_string(), re.case_insensitive()),
            other => (
                other.to_string().replace('*', ".*").replace('?', "."),
                true,
            ),
        };
        let anchored = format!("^(?:{})$", pattern);
        let regex = RegexBuilder::new(&anchored)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| CompileError::InvalidMatchPattern { pattern, source })?;

        let accessor = Arc::clone(&self.accessor);
        Ok(Box::new(move |item| {
            regex.is_match(&accessor.get(item, &property).to_string())
        }))
    }

    fn contains_predicate(&self, node: &Node) -> Result<Predicate<T>, CompileError> {
        let property = property_of(node)?;
        let target = comparand(node, 1)?;
        let accessor = Arc::clone(&self.accessor);
        Ok(Box::new(move |item| {
            match accessor.get(item, &property) {
                Value::Array(items) => items.iter().any(|v| *v == target),
                _ => false,
            }
        }))
    }

    fn in_predicate(&self, node: &Node) -> Result<Predicate<T>, CompileError> {
        let property = property_of(node)?;
        if node.arguments().len() < 2 {
            return Err(CompileError::MissingArgument(node.name().to_string()));
        }

        // either a single array argument or a flat trailing list
        let values: Vec<Value> = match node.argument(1) {
            Some(Argument::Value(Value::Array(items))) if node.arguments().len() == 2 => {
                items.clone()
            }
            _ => node.arguments()[1..]
                .iter()
                .filter_map(|a| a.as_value().cloned())
                .collect(),
        };

        let accessor = Arc::clone(&self.accessor);
        Ok(Box::new(move |item| {
            let actual = accessor.get(item, &property);
            values.iter().any(|v| *v == actual)
        }))
    }

    fn sort_comparator(&self, node: &Node) -> Result<Option<Comparator<T>>, CompileError> {
        match Operator::from_name(node.name()) {
            Operator::Sort => {
                if node.arguments().is_empty() {
                    return Ok(None);
                }
                self.compile_sort(node).map(Some)
            }
            Operator::And | Operator::Or => {
                for child in node.children() {
                    if let Some(comparator) = self.sort_comparator(child)? {
                        return Ok(Some(comparator));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn compile_sort(&self, node: &Node) -> Result<Comparator<T>, CompileError> {
        let mut keys: Vec<(String, bool)> = Vec::new();
        for argument in node.arguments() {
            let Some(Value::String(key)) = argument.as_value() else {
                return Err(CompileError::InvalidSortArgument(argument.to_string()));
            };
            let (property, descending) = match key.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (key.strip_prefix('+').unwrap_or(key), false),
            };
            keys.push((property.to_string(), descending));
        }

        let accessor = Arc::clone(&self.accessor);
        Ok(Box::new(move |a, b| {
            for (property, descending) in &keys {
                let left = accessor.get(a, property);
                let right = accessor.get(b, property);
                let mut ordering = accessor.compare(property, &left, &right);
                if *descending {
                    ordering = ordering.reverse();
                }
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        }))
    }
}

fn property_of(node: &Node) -> Result<String, CompileError> {
    match node.argument(0) {
        Some(Argument::Value(Value::String(name))) => Ok(name.clone()),
        _ => Err(CompileError::InvalidProperty(node.name().to_string())),
    }
}

fn comparand(node: &Node, index: usize) -> Result<Value, CompileError> {
    match node.argument(index) {
        Some(Argument::Value(value)) => Ok(value.clone()),
        _ => Err(CompileError::MissingArgument(node.name().to_string())),
    }
}

fn limit_offset(node: &Node) -> Result<Option<(u64, Option<u64>)>, CompileError> {
    match Operator::from_name(node.name()) {
        Operator::Limit => {
            let count = numeric_argument(node, 0)?;
            let offset = match node.arguments().len() {
                1 => None,
                2 => Some(numeric_argument(node, 1)?),
                _ => return Err(CompileError::InvalidLimitArgument),
            };
            Ok(Some((count, offset)))
        }
        Operator::And | Operator::Or => {
            for child in node.children() {
                if let Some(found) = limit_offset(child)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn numeric_argument(node: &Node, index: usize) -> Result<u64, CompileError> {
    node.argument(index)
        .and_then(Argument::as_value)
        .and_then(Value::as_u64)
        .ok_or(CompileError::InvalidLimitArgument)
}
