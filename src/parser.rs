//! Parsing of raw RQL query strings into [`Node`] trees.
//!
//! Parsing runs in three passes over the text:
//!
//! 1. slash-delimited arrays become bracketed lists (`a/b/c` -> `(a,b,c)`),
//! 2. shorthand comparisons normalize to call syntax (`name=jack` ->
//!    `eq(name,jack)`),
//! 3. a single scan over brackets, delimiters and tokens builds the tree,
//!    inferring `and`/`or` from `&`/`|` and converting each value token as
//!    it is added.
//!
//! The builder keeps a stack of open nodes while scanning; the finished tree
//! carries no construction state.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use crate::converter::{ConvertError, Converter};
use crate::node::{Argument, Node};
use crate::value::Value;

/// A fatal syntax error. No partial tree is ever produced.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("query must not start with '?'")]
    LeadingQuestionMark,

    #[error("no property specified for operator '{operator}'")]
    MissingProperty { operator: String },

    #[error("illegal operator '{0}'")]
    IllegalOperator(String),

    #[error("cannot mix '&' and '|' in one group, parenthesise each set of conjunctions")]
    MixedConjunctions,

    #[error("closing parenthesis without an opening parenthesis")]
    UnmatchedClose,

    #[error("opening parenthesis without a closing parenthesis")]
    UnmatchedOpen,

    #[error("bare group mixes nested expressions and plain values")]
    MixedGroup,

    #[error("illegal characters left over in query string: '{0}'")]
    LeftoverCharacters(String),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

// reserved characters: & | ( ) = < > and, outside brackets, the comma;
// literal occurrences must be percent-encoded
const PROPERTY_OR_VALUE: &str = r"\([^&|()=<>]+\)|[^&|()=<>,]*";
const COMPARISON_OPERATOR: &str = r"[<>!]?=(?:\w*=)?|>|<";

// slash-delimited array sugar: quick/brown/fox -> (quick,brown,fox)
static SLASHED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+*$\-:\w%._]*/[+*$\-:\w%._/]*").expect("slashed pattern")
});

static NORMALIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "({PROPERTY_OR_VALUE})({COMPARISON_OPERATOR})({PROPERTY_OR_VALUE})"
    ))
    .expect("normalize pattern")
});

static NODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\))|([&|,])?([^&|()=<>,]*)(\(?)").expect("node pattern")
});

fn short_operator(operator: &str) -> Option<&'static str> {
    match operator {
        "=" | "==" => Some("eq"),
        ">" => Some("gt"),
        ">=" => Some("ge"),
        "<" => Some("lt"),
        "<=" => Some("le"),
        "!=" => Some("ne"),
        _ => None,
    }
}

/// Iterative find-and-replace with a fallible replacement.
fn replace_all(
    pattern: &Regex,
    text: &str,
    mut replacement: impl FnMut(&Captures) -> Result<String, ParseError>,
) -> Result<String, ParseError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let matched = caps.get(0).expect("whole match");
        out.push_str(&text[last..matched.start()]);
        out.push_str(&replacement(&caps)?);
        last = matched.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// RQL query string parser.
///
/// Stateless apart from its converter registry, so one parser can be shared
/// across threads and reused for any number of queries.
///
/// # Examples
///
/// ```
/// use rql::{Node, Parser};
///
/// let parser = Parser::new();
/// let node = parser.parse("name=jack").unwrap();
/// assert_eq!(node, Node::new("eq").arg("name").arg("jack"));
/// ```
pub struct Parser {
    converter: Converter,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            converter: Converter::new(),
        }
    }

    pub fn with_converter(converter: Converter) -> Self {
        Parser { converter }
    }

    /// Parses a query string into its AST.
    ///
    /// An empty query yields the bare synthetic root; a query containing a
    /// single predicate or function yields that node without a wrapper.
    pub fn parse(&self, query: &str) -> Result<Node, ParseError> {
        if query.starts_with('?') {
            return Err(ParseError::LeadingQuestionMark);
        }

        let query = if query.contains('/') {
            expand_slashed(query)
        } else {
            query.to_string()
        };
        let query = normalize(&query)?;
        let root = self.build_tree(&query)?;
        let root = unwrap_root(root);
        debug!(query = %query, ast = %root, "parsed query");
        Ok(root)
    }

    fn build_tree(&self, query: &str) -> Result<Node, ParseError> {
        let mut stack: Vec<Node> = vec![Node::new("")];
        let mut leftover = String::new();
        let mut last = 0;

        for caps in NODE_PATTERN.captures_iter(query) {
            let matched = caps.get(0).expect("whole match");
            leftover.push_str(&query[last..matched.start()]);
            last = matched.end();

            let close = caps.get(1).is_some();
            let delimiter = caps.get(2).map(|m| m.as_str());
            let token = caps.get(3).map_or("", |m| m.as_str());
            let open = caps.get(4).is_some_and(|m| !m.as_str().is_empty());

            if close {
                if stack.len() == 1 {
                    return Err(ParseError::UnmatchedClose);
                }
                let finished = stack.pop().expect("non-empty stack");
                let parent = stack.last_mut().expect("parent frame");
                if finished.has_name() {
                    parent.push_argument(Argument::Node(finished));
                } else {
                    close_group(parent, finished)?;
                }
                continue;
            }

            match delimiter {
                Some("&") => set_conjunction(stack.last_mut().expect("open frame"), "and")?,
                Some("|") => set_conjunction(stack.last_mut().expect("open frame"), "or")?,
                _ => {}
            }

            if open {
                stack.push(Node::new(token));
            } else if !token.is_empty() || delimiter == Some(",") {
                let value = self.converter.convert(token)?;
                stack
                    .last_mut()
                    .expect("open frame")
                    .push_argument(Argument::Value(value));
            }
        }
        leftover.push_str(&query[last..]);

        if stack.len() > 1 {
            return Err(ParseError::UnmatchedOpen);
        }
        if !leftover.is_empty() {
            return Err(ParseError::LeftoverCharacters(leftover));
        }
        Ok(stack.pop().expect("root frame"))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

fn expand_slashed(query: &str) -> String {
    SLASHED_PATTERN
        .replace_all(query, |caps: &Captures| {
            format!("({})", caps[0].replace('/', ","))
        })
        .into_owned()
}

/// Rewrites shorthand comparisons to call syntax: `name=jack` becomes
/// `eq(name,jack)`, `a=like=b` becomes `like(a,b)`.
fn normalize(query: &str) -> Result<String, ParseError> {
    replace_all(&NORMALIZE_PATTERN, query, |caps| {
        let property = caps.get(1).map_or("", |m| m.as_str());
        let operator = caps.get(2).map_or("", |m| m.as_str());
        let value = caps.get(3).map_or("", |m| m.as_str());

        if property.is_empty() {
            return Err(ParseError::MissingProperty {
                operator: operator.to_string(),
            });
        }

        let name = if operator.len() < 3 {
            short_operator(operator)
                .ok_or_else(|| ParseError::IllegalOperator(operator.to_string()))?
        } else {
            // a=like=b form: the operator name sits between the '=' signs
            &operator[1..operator.len() - 1]
        };
        Ok(format!("{name}({property},{value})"))
    })
}

/// `&` names the open group `and`, `|` names it `or`; a group already named
/// with the opposing conjunction (or a function name) cannot be renamed.
fn set_conjunction(node: &mut Node, name: &str) -> Result<(), ParseError> {
    if !node.has_name() {
        node.set_name(name);
    } else if node.name() != name {
        return Err(ParseError::MixedConjunctions);
    }
    Ok(())
}

/// A closed group that never acquired a name is either a value array or a
/// parenthesised single expression.
fn close_group(parent: &mut Node, group: Node) -> Result<(), ParseError> {
    let arguments = group.into_arguments();

    if arguments.len() == 1 && matches!(arguments[0], Argument::Node(_)) {
        parent.push_argument(arguments.into_iter().next().expect("single argument"));
        return Ok(());
    }

    let mut values = Vec::with_capacity(arguments.len());
    for argument in arguments {
        match argument {
            Argument::Value(value) => values.push(value),
            Argument::Node(_) => return Err(ParseError::MixedGroup),
        }
    }
    parent.push_argument(Argument::Value(Value::Array(values)));
    Ok(())
}

/// A nameless root holding exactly one nested call unwraps to that call, so
/// a query with a single predicate has no synthetic wrapper.
fn unwrap_root(root: Node) -> Node {
    if root.has_name() || root.arguments().len() != 1 {
        return root;
    }
    let mut arguments = root.into_arguments();
    match arguments.pop() {
        Some(Argument::Node(child)) => child,
        Some(argument) => Node::with_arguments("", vec![argument]),
        None => Node::new(""),
    }
}
