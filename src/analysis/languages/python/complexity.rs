//! Cyclomatic and cognitive complexity.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use crate::analysis::{for_each_node, has_ancestor, ParsedFile};
use crate::error::AnalysisError;

const FUNCTION_QUERY: &str = r#"
(function_definition) @function
"#;

/// Nodes that each add one independent path.
const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
    "for_in_clause",
    "if_clause",
    "assert_statement",
    "case_clause",
];

/// Nodes whose body is one nesting level deeper for cognitive scoring.
const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "else_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "match_statement",
    "function_definition",
    "lambda",
];

/// Functions and methods not nested inside another function.
///
/// Nested functions are folded into their enclosing function's score.
pub fn scored_functions<'t>(
    language: &Language,
    parsed: &'t ParsedFile,
) -> Result<Vec<Node<'t>>, AnalysisError> {
    let query = Query::new(language, FUNCTION_QUERY)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

    let mut functions = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if !has_ancestor(capture.node, "function_definition") {
                functions.push(capture.node);
            }
        }
    }
    Ok(functions)
}

fn decisions(node: Node) -> u32 {
    let mut count = 0;
    for_each_node(node, |n| {
        if DECISION_KINDS.contains(&n.kind()) {
            count += 1;
        }
    });
    count
}

/// Cyclomatic complexity of one function: 1 + decision points.
pub fn cyclomatic(function: Node) -> u32 {
    1 + decisions(function)
}

/// Whole-file complexity: every decision point plus one per scored function.
pub fn total_complexity(root: Node, functions: usize) -> u32 {
    decisions(root) + functions as u32
}

/// Cognitive complexity of every module-level function, decorated or not.
pub fn module_cognitive(root: Node) -> Vec<u32> {
    let mut scores = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let function = match child.kind() {
            "function_definition" => Some(child),
            "decorated_definition" => child
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        };
        if let Some(body) = function.and_then(|f| f.child_by_field_name("body")) {
            scores.push(cognitive(body, 0));
        }
    }
    scores
}

/// Cognitive complexity of a subtree at the given nesting level.
///
/// Structural breaks (branches, loops, handlers, ternaries) cost one plus
/// the current nesting; `elif`/`else` cost one flat; each run of a
/// boolean operator costs one.
pub fn cognitive(node: Node, nesting: u32) -> u32 {
    let kind = node.kind();
    let mut score = match kind {
        "if_statement" | "for_statement" | "while_statement" | "except_clause"
        | "conditional_expression" | "match_statement" => 1 + nesting,
        "elif_clause" => 1,
        "else_clause" if node.parent().is_some_and(|p| p.kind() == "if_statement") => 1,
        "boolean_operator" if !continues_sequence(node) => 1,
        _ => 0,
    };

    let nests = NESTING_KINDS.contains(&kind);
    let body = node.child_by_field_name("body");
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let deeper = nests && (child.kind() == "block" || Some(child) == body);
        score += cognitive(child, if deeper { nesting + 1 } else { nesting });
    }
    score
}

/// `a and b and c` is one sequence; a switch to `or` starts a new one.
fn continues_sequence(node: Node) -> bool {
    let operator = |n: Node| n.child_by_field_name("operator").map(|o| o.kind());
    match node.parent() {
        Some(parent) if parent.kind() == "boolean_operator" => operator(parent) == operator(node),
        _ => false,
    }
}
