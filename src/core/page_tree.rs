//! Page tree flattening.

use super::library::Library;
use super::node::{self, Node};
use super::parser::{Dict, ObjRef, PDFObject};
use log::warn;
use rustc_hash::FxHashSet;

/// A leaf of the page tree with the nodes above it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    pub index: usize,
    pub obj_ref: Option<ObjRef>,
    pub dict: Dict,
    /// Enclosing `/Pages` nodes, nearest first; searched for inherited
    /// attributes
    pub ancestors: Vec<Dict>,
}

/// Collects the pages under `root` in document order.
///
/// Nodes reached twice (a cyclic or shared subtree) are skipped the second
/// time.
pub fn flatten(library: &Library, root: &PDFObject) -> Vec<PageNode> {
    let mut pages = Vec::new();
    let mut visited = FxHashSet::default();
    let mut ancestors = Vec::new();
    walk(library, root, &mut ancestors, &mut visited, &mut pages);
    pages
}

fn walk(
    library: &Library,
    object: &PDFObject,
    ancestors: &mut Vec<Dict>,
    visited: &mut FxHashSet<ObjRef>,
    pages: &mut Vec<PageNode>,
) {
    if let Some(obj_ref) = object.as_obj_ref() {
        if !visited.insert(obj_ref) {
            warn!("page tree node {} visited twice, skipping", obj_ref);
            return;
        }
    }

    match node::classify(library, object) {
        Node::Page(dict) => pages.push(PageNode {
            index: pages.len(),
            obj_ref: object.as_obj_ref(),
            dict: dict.clone(),
            ancestors: ancestors.iter().rev().cloned().collect(),
        }),
        Node::PageTree(dict) => {
            let Some(kids) = library.get_array(dict, "Kids") else {
                return;
            };
            ancestors.push(dict.clone());
            for kid in kids {
                walk(library, kid, ancestors, visited, pages);
            }
            ancestors.pop();
        }
        other => warn!("unexpected {} in page tree", other),
    }
}
