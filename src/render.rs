//! Rendering of [`Node`] trees to human-readable filter text.
//!
//! This is the reference client of the [`NodeVisitor`] surface: the same
//! tree the query compiler executes can be rendered to an SQL-like string
//! for display or for handing to an external query system.

use crate::node::{Argument, Node, NodeVisitor};
use crate::value::Value;

/// Renders a node tree as SQL-like filter text.
///
/// ```
/// use rql::{Parser, render::to_filter_text};
///
/// let node = Parser::new().parse("(name=jack|name=jill)&age>30").unwrap();
/// assert_eq!(
///     to_filter_text(&node),
///     "((name=jack) OR (name=jill)) AND (age>30)"
/// );
/// ```
pub fn to_filter_text(node: &Node) -> String {
    FilterTextRenderer.visit(node)
}

/// SQL-like textual rendering of query trees.
pub struct FilterTextRenderer;

impl NodeVisitor<String> for FilterTextRenderer {
    fn visit(&self, node: &Node) -> String {
        match node.name() {
            "and" | "or" => self.conjunction(node),
            "eq" => binary(node, "="),
            "gt" => binary(node, ">"),
            "ge" => binary(node, ">="),
            "lt" => binary(node, "<"),
            "le" => binary(node, "<="),
            "ne" => binary(node, "!="),
            "match" | "like" => binary_call(node, "like"),
            "in" => self.in_list(node),
            "sort" => sort_text(node),
            "limit" => limit_text(node),
            _ => node.to_string(),
        }
    }
}

impl FilterTextRenderer {
    fn conjunction(&self, node: &Node) -> String {
        let components: Vec<String> = node
            .arguments()
            .iter()
            .map(|argument| match argument {
                Argument::Node(child) => self.visit(child),
                Argument::Value(value) => value.to_string(),
            })
            .collect();
        let joiner = format!(") {} (", node.name().to_uppercase());
        format!("({})", components.join(&joiner))
    }

    fn in_list(&self, node: &Node) -> String {
        let property = display_argument(node, 0);
        let values: Vec<String> = match node.argument(1) {
            Some(Argument::Value(Value::Array(items))) if node.arguments().len() == 2 => {
                items.iter().map(Value::to_string).collect()
            }
            _ => node
                .arguments()
                .get(1..)
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect(),
        };
        format!("{} in ({})", property, values.join(","))
    }
}

fn display_argument(node: &Node, index: usize) -> String {
    node.argument(index)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn binary(node: &Node, operator: &str) -> String {
    if node.arguments().len() != 2 {
        return node.to_string();
    }
    format!(
        "{}{}{}",
        display_argument(node, 0),
        operator,
        display_argument(node, 1)
    )
}

fn binary_call(node: &Node, operator: &str) -> String {
    if node.arguments().len() != 2 {
        return node.to_string();
    }
    format!(
        "{} {} ({})",
        display_argument(node, 0),
        operator,
        display_argument(node, 1)
    )
}

fn sort_text(node: &Node) -> String {
    let keys: Vec<String> = node
        .arguments()
        .iter()
        .map(|argument| {
            let key = argument.to_string();
            match key.strip_prefix('-') {
                Some(property) => format!("{} desc", property),
                None => format!("{} asc", key.strip_prefix('+').unwrap_or(&key)),
            }
        })
        .collect();
    format!("sort by {}", keys.join(", "))
}

fn limit_text(node: &Node) -> String {
    match node.arguments().len() {
        2 => format!(
            "limit {} offset {}",
            display_argument(node, 0),
            display_argument(node, 1)
        ),
        _ => format!("limit {}", display_argument(node, 0)),
    }
}
