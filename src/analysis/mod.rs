//! AST-backed language analysis.
//!
//! Each supported language has a tree-sitter analyzer registered in
//! [`languages`]. Parsing validates submissions; the Python analyzer also
//! computes every in-process metric.

pub mod languages;
pub mod stats;
mod traits;

pub use languages::{analyzer_for, JavaAnalyzer, PythonAnalyzer};
pub use stats::{maintainability_index, round2, Triple};
pub use traits::{LanguageAnalyzer, ParsedFile};

use tree_sitter::Node;

/// Visit `root` and all its descendants in pre-order.
pub fn for_each_node<'t>(root: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Whether `node` has an ancestor of the given kind.
pub fn has_ancestor(node: Node, kind: &str) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == kind {
            return true;
        }
        current = parent.parent();
    }
    false
}
