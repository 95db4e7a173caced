//! Halstead operator/operand counts.

use std::collections::HashSet;

use serde::Serialize;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use crate::analysis::ParsedFile;
use crate::error::AnalysisError;

const OPERATOR_QUERY: &str = r#"
(binary_operator) @binary
(unary_operator) @unary
(not_operator) @not
(boolean_operator) @boolean
(comparison_operator) @comparison
(augmented_assignment) @augmented
"#;

/// Vocabulary and length of one file's operator expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Halstead {
    pub distinct_operators: usize,
    pub distinct_operands: usize,
    pub total_operators: usize,
    pub total_operands: usize,
}

impl Halstead {
    pub fn vocabulary(&self) -> usize {
        self.distinct_operators + self.distinct_operands
    }

    pub fn length(&self) -> usize {
        self.total_operators + self.total_operands
    }

    pub fn volume(&self) -> f64 {
        let vocabulary = self.vocabulary();
        if vocabulary == 0 {
            return 0.0;
        }
        self.length() as f64 * (vocabulary as f64).log2()
    }

    pub fn difficulty(&self) -> f64 {
        if self.distinct_operands == 0 {
            return 0.0;
        }
        (self.distinct_operators as f64 / 2.0)
            * (self.total_operands as f64 / self.distinct_operands as f64)
    }

    pub fn effort(&self) -> f64 {
        self.difficulty() * self.volume()
    }

    /// Estimated programming time in seconds.
    pub fn time(&self) -> f64 {
        self.effort() / 18.0
    }
}

#[derive(Default)]
struct Tally<'s> {
    operators: HashSet<&'s str>,
    operands: HashSet<&'s str>,
    total_operators: usize,
    total_operands: usize,
}

impl<'s> Tally<'s> {
    fn operator(&mut self, op: &'s str) {
        self.operators.insert(op);
        self.total_operators += 1;
    }

    fn operand(&mut self, text: &'s str) {
        self.operands.insert(text);
        self.total_operands += 1;
    }
}

/// Count operators and operands of every operator expression in a file.
pub fn halstead(language: &Language, parsed: &ParsedFile) -> Result<Halstead, AnalysisError> {
    let query = Query::new(language, OPERATOR_QUERY)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

    let mut tally = Tally::default();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let node = capture.node;
            match query.capture_names()[capture.index as usize] {
                "comparison" => {
                    let mut walker = node.walk();
                    for child in node.children(&mut walker) {
                        if child.is_named() {
                            tally.operand(parsed.node_text(child));
                        } else {
                            tally.operator(child.kind());
                        }
                    }
                }
                "not" => {
                    tally.operator("not");
                    field_operand(&mut tally, parsed, node, "argument");
                }
                "unary" => {
                    field_operator(&mut tally, node);
                    field_operand(&mut tally, parsed, node, "argument");
                }
                _ => {
                    field_operator(&mut tally, node);
                    field_operand(&mut tally, parsed, node, "left");
                    field_operand(&mut tally, parsed, node, "right");
                }
            }
        }
    }

    Ok(Halstead {
        distinct_operators: tally.operators.len(),
        distinct_operands: tally.operands.len(),
        total_operators: tally.total_operators,
        total_operands: tally.total_operands,
    })
}

fn field_operator(tally: &mut Tally<'_>, node: Node) {
    if let Some(op) = node.child_by_field_name("operator") {
        tally.operator(op.kind());
    }
}

fn field_operand<'s>(tally: &mut Tally<'s>, parsed: &'s ParsedFile, node: Node, field: &str) {
    if let Some(operand) = node.child_by_field_name(field) {
        tally.operand(parsed.node_text(operand));
    }
}
