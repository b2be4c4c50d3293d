//! Math in live editing.
//!
//! [`MathPlugin`] promotes `$...$` and `$$`-fenced paragraphs into math nodes
//! as the user types; [`demote`] turns a math node back into its delimited
//! source text.

mod demotion;
mod promotion;

pub use demotion::demote;
pub use promotion::{MathPlugin, promote_text_node};

use crate::commands::{is_blank, top_level_block};
use crate::error::EditorError;
use crate::node::NodeKey;
use crate::tree::DocumentTree;
use once_cell::sync::Lazy;
use regex::Regex;

/// Delimited math anywhere in a text run. Block spans are tried first so
/// `$$x$$` never reads as two inline spans; inline spans stay on one line.
pub(crate) static MATH_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\$([\s\S]+?)\$\$|\$([^$\n]+?)\$").expect("valid math span pattern")
});

/// Moves a block formula out of its inline container to the root level,
/// splitting the container around it. Empty leftovers are dropped.
pub(crate) fn hoist_block_math(tree: &mut DocumentTree, key: NodeKey) -> Result<(), EditorError> {
    let parent = tree
        .parent(key)
        .ok_or_else(|| EditorError::structure(format!("math node {} is detached", key)))?;
    if parent == tree.root() {
        return Ok(());
    }
    let top = top_level_block(tree, key)
        .ok_or_else(|| EditorError::structure(format!("math node {} is detached", key)))?;
    if top != parent {
        return tree.insert_after(top, key);
    }

    let index = tree.child_index(key).unwrap_or(0);
    let tail: Vec<NodeKey> = tree.children(parent).iter().skip(index + 1).copied().collect();
    tree.insert_after(parent, key)?;
    if !tail.is_empty() {
        let host = tree
            .get(parent)
            .cloned()
            .ok_or(EditorError::StaleReference(parent))?;
        let rest = tree.create(host)?;
        tree.insert_after(key, rest)?;
        for child in tail {
            tree.append_child(rest, child)?;
        }
    }
    if is_blank(tree, parent) {
        tree.remove(parent)?;
    }
    Ok(())
}
