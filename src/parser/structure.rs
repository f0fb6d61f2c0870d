//! Recursive-descent structural parser.
//!
//! Turns the flat token stream into a generic, order-preserving key→value
//! tree ([`ParseNode`]). No schema is applied at this stage; whether a key
//! holds a scalar, a nested node or an ordered list of records is decided by
//! a static key classification, not inferred from content.

use super::tokenizer::Token;
use anyhow::{Result, anyhow, bail};
use indexmap::IndexMap;

/// Keys whose `{...}` children are repeatable records, accumulated in order
/// under `key + "s"` instead of overwriting. Case-sensitive, exact match.
const RECORD_KEYS: [&str; 8] = [
    "System",
    "Block",
    "Line",
    "Branch",
    "Port",
    "Annotation",
    "Array",
    "Object",
];

/// Wrapper keys whose children logically contain the actual system/block
/// lists at one extra nesting level; their list fields are merged upward.
const CONTAINER_MERGE_KEYS: [&str; 2] = ["Children", "Contents"];

/// Sigil reserved for tool-internal bookkeeping keys (e.g. `$ObjectID`).
const META_SIGIL: char = '$';

// ────────────────────────────────────────────────────────────────────────────
// Parse tree
// ────────────────────────────────────────────────────────────────────────────

/// A coerced scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Str(String),
    Number(f64),
    /// Coerced bracket array; elements are numbers where possible.
    Array(Vec<ScalarValue>),
    /// A key that appeared with no value before the closing brace.
    Empty,
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => Some(*n),
            ScalarValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Flatten to a numeric vector if every element coerces. String values
    /// are accepted in delimited form (`"[1, 2]"`, `"1 2"`) since the
    /// serializer quotes array parameters on export.
    pub fn as_num_array(&self) -> Option<Vec<f64>> {
        match self {
            ScalarValue::Array(items) => items.iter().map(|i| i.as_number()).collect(),
            ScalarValue::Number(n) => Some(vec![*n]),
            ScalarValue::Str(s) => {
                let body = s.trim().trim_start_matches('[').trim_end_matches(']');
                let items: Option<Vec<f64>> = body
                    .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|e| !e.trim().is_empty())
                    .map(|e| e.trim().parse().ok())
                    .collect();
                items.filter(|v| !v.is_empty())
            }
            ScalarValue::Empty => None,
        }
    }
}

/// A value slot in a [`ParseNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Scalar(ScalarValue),
    Node(ParseNode),
    List(Vec<ParseNode>),
}

/// Ordered key→value tree produced by the structural parser. Transient:
/// consumed by the semantic extractor and discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseNode {
    pub entries: IndexMap<String, NodeValue>,
}

impl ParseNode {
    pub fn get(&self, key: &str) -> Option<&NodeValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            NodeValue::Scalar(s) => s.as_str(),
            _ => None,
        }
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        match self.entries.get(key)? {
            NodeValue::Scalar(s) => s.as_number(),
            _ => None,
        }
    }

    pub fn get_scalar(&self, key: &str) -> Option<&ScalarValue> {
        match self.entries.get(key)? {
            NodeValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Ordered list of child records under a pluralized record key
    /// (e.g. `list("Blocks")`). Missing keys yield an empty slice.
    pub fn list(&self, key: &str) -> &[ParseNode] {
        match self.entries.get(key) {
            Some(NodeValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn child(&self, key: &str) -> Option<&ParseNode> {
        match self.entries.get(key)? {
            NodeValue::Node(n) => Some(n),
            _ => None,
        }
    }
}

/// Whether the parsed document declared itself a reusable library or a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Model,
    Library,
}

// ────────────────────────────────────────────────────────────────────────────
// Parser
// ────────────────────────────────────────────────────────────────────────────

/// Parse a token stream into the root [`ParseNode`].
///
/// Scans forward for the first `Model` or `Library` atom; its `{...}` body
/// becomes the root node. A missing document keyword or an unbalanced brace
/// structure is a hard failure.
pub fn parse_document(tokens: &[Token]) -> Result<(DocumentKind, ParseNode)> {
    let mut pos = 0usize;
    let kind = loop {
        match tokens.get(pos) {
            Some(Token::Atom(a)) if a == "Model" => break DocumentKind::Model,
            Some(Token::Atom(a)) if a == "Library" => break DocumentKind::Library,
            Some(_) => pos += 1,
            None => bail!("document keyword 'Model' or 'Library' not found"),
        }
    };
    pos += 1;
    match tokens.get(pos) {
        Some(Token::BraceOpen) => pos += 1,
        _ => bail!("expected '{{' after document keyword"),
    }
    let mut cursor = Cursor { tokens, pos };
    let root = parse_node(&mut cursor)?;
    Ok((kind, root))
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

/// Parse the body of a `{...}` node; the opening brace is already consumed.
fn parse_node(cursor: &mut Cursor) -> Result<ParseNode> {
    let mut node = ParseNode::default();

    loop {
        let key = match cursor.next() {
            Some(Token::BraceClose) => return Ok(node),
            Some(Token::Atom(a)) => a.clone(),
            Some(Token::Quoted(q)) => q.clone(),
            Some(tok) => bail!("expected key, found {:?}", tok),
            None => bail!("unexpected end of input: unbalanced braces"),
        };

        match cursor.peek() {
            Some(Token::BraceOpen) => {
                cursor.next();
                let child = parse_node(cursor)?;
                insert_child(&mut node, &key, child);
            }
            Some(Token::BraceClose) => {
                // Key with no value: present but empty. The brace stays for
                // the loop head to consume.
                if !is_meta_key(&key) {
                    node.entries
                        .insert(key, NodeValue::Scalar(ScalarValue::Empty));
                }
            }
            Some(_) => {
                let tok = cursor.next().ok_or_else(|| anyhow!("token underflow"))?;
                if !is_meta_key(&key) {
                    node.entries
                        .insert(key, NodeValue::Scalar(coerce_value(tok)));
                }
            }
            None => bail!("unexpected end of input after key '{}'", key),
        }
    }
}

/// Tool-internal bookkeeping keys and opaque vendor configuration objects
/// carry no diagram-relevant data. Parsed only to keep the cursor in sync,
/// then dropped.
fn is_meta_key(key: &str) -> bool {
    key.starts_with(META_SIGIL) || key.contains('.')
}

/// Place a parsed child under its key according to the key classification.
fn insert_child(node: &mut ParseNode, key: &str, child: ParseNode) {
    if is_meta_key(key) {
        return;
    }
    if RECORD_KEYS.contains(&key) {
        let plural = format!("{}s", key);
        match node.entries.entry(plural).or_insert_with(|| NodeValue::List(Vec::new())) {
            NodeValue::List(items) => items.push(child),
            other => *other = NodeValue::List(vec![child]),
        }
        return;
    }
    if CONTAINER_MERGE_KEYS.contains(&key) {
        merge_lists(node, child);
        return;
    }
    node.entries.insert(key.to_string(), NodeValue::Node(child));
}

/// Hoist a wrapper node's record lists into the current node.
fn merge_lists(node: &mut ParseNode, wrapper: ParseNode) {
    for (k, v) in wrapper.entries {
        if let NodeValue::List(items) = v {
            match node.entries.entry(k).or_insert_with(|| NodeValue::List(Vec::new())) {
                NodeValue::List(existing) => existing.extend(items),
                other => *other = NodeValue::List(items),
            }
        }
    }
}

/// Coerce a scalar token: quoted text stays a string, atoms become numbers
/// where they parse, bracket tokens become ordered element sequences.
fn coerce_value(token: &Token) -> ScalarValue {
    match token {
        Token::Quoted(s) => ScalarValue::Str(s.clone()),
        Token::Atom(a) => match a.parse::<f64>() {
            Ok(n) => ScalarValue::Number(n),
            Err(_) => ScalarValue::Str(a.clone()),
        },
        Token::Bracket(raw) => ScalarValue::Array(parse_bracket_array(raw)),
        Token::BraceOpen | Token::BraceClose => ScalarValue::Empty,
    }
}

/// Split a raw bracket token on comma/semicolon/whitespace and coerce each
/// element, numeric where possible.
pub fn parse_bracket_array(raw: &str) -> Vec<ScalarValue> {
    let inner = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    inner
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            // Elements of nested arrays carry their own stripped brackets
            let bare = s.trim_start_matches('[').trim_end_matches(']');
            match bare.parse::<f64>() {
                Ok(n) => ScalarValue::Number(n),
                Err(_) => ScalarValue::Str(bare.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::tokenize;

    fn parse(text: &str) -> (DocumentKind, ParseNode) {
        parse_document(&tokenize(text)).expect("parse")
    }

    #[test]
    fn parses_nested_records_into_lists() {
        let (kind, root) = parse(
            r#"Model {
                 Name "top"
                 System {
                   Name "top"
                   Block { BlockType Constant Name "C1" }
                   Block { BlockType Scope Name "S1" }
                 }
               }"#,
        );
        assert_eq!(kind, DocumentKind::Model);
        assert_eq!(root.get_str("Name"), Some("top"));
        let systems = root.list("Systems");
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].list("Blocks").len(), 2);
    }

    #[test]
    fn discards_meta_and_opaque_config_objects() {
        let (_, root) = parse(
            r#"Model {
                 Name "m"
                 $BookkeepingInfo { Stuff 1 Deep { More 2 } }
                 Simulink.ConfigSet { $ObjectID 1 SolverMode "Auto" }
                 System { Name "m" }
               }"#,
        );
        assert!(root.get("$BookkeepingInfo").is_none());
        assert!(root.get("Simulink.ConfigSet").is_none());
        // Cursor stayed in sync across the discarded subtrees
        assert_eq!(root.list("Systems").len(), 1);
    }

    #[test]
    fn merges_container_wrappers_upward() {
        let (_, root) = parse(
            r#"Library {
                 Name "lib"
                 Children {
                   System { Name "lib" }
                   System { Name "extra" }
                 }
               }"#,
        );
        assert_eq!(root.list("Systems").len(), 2);
    }

    #[test]
    fn coerces_scalars_numbers_and_arrays() {
        let (_, root) = parse(
            r#"Model {
                 Name "m"
                 StopTime 10.5
                 Gains [1, 2; 3]
                 Flag on
               }"#,
        );
        assert_eq!(root.get_number("StopTime"), Some(10.5));
        assert_eq!(
            root.get_scalar("Gains").and_then(|s| s.as_num_array()),
            Some(vec![1.0, 2.0, 3.0])
        );
        assert_eq!(root.get_str("Flag"), Some("on"));
    }

    #[test]
    fn num_array_parses_delimited_strings() {
        assert_eq!(
            ScalarValue::Str("[1, 2; 3]".to_string()).as_num_array(),
            Some(vec![1.0, 2.0, 3.0])
        );
        assert_eq!(
            ScalarValue::Str("4 5".to_string()).as_num_array(),
            Some(vec![4.0, 5.0])
        );
        assert_eq!(ScalarValue::Str("[a, b]".to_string()).as_num_array(), None);
        assert_eq!(ScalarValue::Str("".to_string()).as_num_array(), None);
    }

    #[test]
    fn key_without_value_is_recorded_empty() {
        let (_, root) = parse("Model { Name \"m\" Dangling }");
        assert_eq!(
            root.get_scalar("Dangling"),
            Some(&ScalarValue::Empty)
        );
    }

    #[test]
    fn duplicate_singular_keys_last_write_wins() {
        let (_, root) = parse("Model { Meta { A 1 } Meta { A 2 } }");
        assert_eq!(root.child("Meta").unwrap().get_number("A"), Some(2.0));
    }

    #[test]
    fn missing_keyword_is_fatal() {
        assert!(parse_document(&tokenize("Diagram { Name \"x\" }")).is_err());
    }

    #[test]
    fn unbalanced_braces_are_fatal() {
        assert!(parse_document(&tokenize("Model { System { Name \"x\" }")).is_err());
    }
}
