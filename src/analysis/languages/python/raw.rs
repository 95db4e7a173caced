//! Raw line and statement counts.

use std::ops::AddAssign;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tree_sitter::Node;

use crate::analysis::{for_each_node, ParsedFile};

lazy_static! {
    static ref DEF_WORD: Regex = Regex::new(r"\bdef\b").unwrap();
    static ref CLASS_WORD: Regex = Regex::new(r"\bclass\b").unwrap();
}

/// Clauses that count as logical lines alongside statements.
const CLAUSE_KINDS: &[&str] = &[
    "elif_clause",
    "else_clause",
    "except_clause",
    "finally_clause",
    "case_clause",
];

/// Line counts for one file, or summed over several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RawCounts {
    /// Physical lines.
    pub loc: usize,
    /// Logical lines: statements and clause headers.
    pub lloc: usize,
    /// Lines that are neither blank, comment-only, nor string blocks.
    pub sloc: usize,
    /// Comment tokens, inline or on their own line.
    pub comments: usize,
    /// Lines inside standalone multi-line strings.
    pub multi: usize,
    pub blank: usize,
    /// Lines holding only a comment.
    pub single_comments: usize,
    /// Occurrences of the word `def`.
    pub functions: usize,
    /// Occurrences of the word `class`.
    pub classes: usize,
}

impl AddAssign for RawCounts {
    fn add_assign(&mut self, other: Self) {
        self.loc += other.loc;
        self.lloc += other.lloc;
        self.sloc += other.sloc;
        self.comments += other.comments;
        self.multi += other.multi;
        self.blank += other.blank;
        self.single_comments += other.single_comments;
        self.functions += other.functions;
        self.classes += other.classes;
    }
}

/// Count lines and statements of a parsed Python file.
pub fn raw_counts(parsed: &ParsedFile) -> RawCounts {
    let text = parsed.source_str();
    let lines: Vec<&str> = text.lines().collect();
    let mut in_string_block = vec![false; lines.len()];

    let mut comments = 0;
    let mut lloc = 0;
    for_each_node(parsed.tree.root_node(), |node| {
        let kind = node.kind();
        if kind == "comment" {
            comments += 1;
        } else if is_logical_line(node) {
            lloc += 1;
        }

        if let Some((start, end)) = string_block(node) {
            for flag in in_string_block.iter_mut().take(end + 1).skip(start) {
                *flag = true;
            }
        }
    });

    let mut counts = RawCounts {
        loc: lines.len(),
        lloc,
        comments,
        functions: DEF_WORD.find_iter(text).count(),
        classes: CLASS_WORD.find_iter(text).count(),
        ..Default::default()
    };

    for (line, in_block) in lines.iter().zip(&in_string_block) {
        let trimmed = line.trim();
        if *in_block {
            counts.multi += 1;
        } else if trimmed.is_empty() {
            counts.blank += 1;
        } else if trimmed.starts_with('#') {
            counts.single_comments += 1;
        }
    }
    counts.sloc = counts.loc - counts.blank - counts.single_comments - counts.multi;
    counts
}

fn is_logical_line(node: Node) -> bool {
    let kind = node.kind();
    node.is_named()
        && (kind.ends_with("_statement")
            || kind == "function_definition"
            || kind == "class_definition"
            || CLAUSE_KINDS.contains(&kind))
}

/// Row span of a string that stands alone as a statement and covers more
/// than one line (docstrings and commented-out blocks).
fn string_block(node: Node) -> Option<(usize, usize)> {
    if node.kind() != "expression_statement" || node.named_child_count() != 1 {
        return None;
    }
    let child = node.named_child(0)?;
    if child.kind() != "string" && child.kind() != "concatenated_string" {
        return None;
    }
    let (start, end) = (child.start_position().row, child.end_position().row);
    (end > start).then_some((start, end))
}
