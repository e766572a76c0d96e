//! Superset view of several files' fields.
//!
//! Nodes are deduplicated by path. The merged list keeps the first file's document order and
//! slots every field a later file introduces next to the field that precedes it in that
//! file, so the result still reads like one plausible document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::comparator::{PathWithFiles, common_field_names, structural_variants};
use crate::analysis::tree::{TreeNode, TreeRecord, build_tree, document_order};
use crate::field::{FieldRecord, FileFieldSet, PATH_SEPARATOR};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct MergedFieldNode {
    pub name:                        String,
    pub path:                        String,
    pub parent_path:                 String,
    pub depth:                       usize,
    /// Rank among siblings in the merged order.
    pub order_index:                 usize,
    pub has_children:                bool,
    pub present_in_files:            Vec<String,>,
    #[serde(default)]
    pub structural_difference:       bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_paths_with_files: Vec<PathWithFiles,>,
}

impl MergedFieldNode {
    fn from_record(record: &FieldRecord, filename: &str,) -> Self {
        Self {
            name:                         record.name.clone(),
            path:                         record.path.clone(),
            parent_path:                  record.parent_path.clone(),
            depth:                        record.depth,
            order_index:                  record.order_index,
            has_children:                 record.has_children,
            present_in_files:             vec![filename.to_string()],
            structural_difference:        false,
            alternative_paths_with_files: Vec::new(),
        }
    }

    pub fn is_present_in(&self, filename: &str,) -> bool {
        self.present_in_files.iter().any(|f| f == filename,)
    }
}

impl TreeRecord for MergedFieldNode {
    fn path(&self,) -> &str {
        &self.path
    }

    fn order_index(&self,) -> usize {
        self.order_index
    }

    fn depth(&self,) -> usize {
        self.depth
    }
}

/// Position right after the subtree of `path` that starts at `from`.
fn end_of_subtree(nodes: &[MergedFieldNode], from: usize, path: &str,) -> usize {
    let prefix = format!("{path}{PATH_SEPARATOR}");
    let mut pos = from + 1;
    while pos < nodes.len() && nodes[pos].path.starts_with(&prefix,) {
        pos += 1;
    }
    pos
}

/// Where a field new to the merged list goes, given the merged position of the field that
/// precedes it in its own file.
fn insertion_point(
    nodes: &[MergedFieldNode],
    previous: Option<usize,>,
    record: &FieldRecord,
) -> usize {
    let Some(prev,) = previous else {
        return nodes.len();
    };
    let prev_node = &nodes[prev];
    if prev_node.depth < record.depth {
        // The preceding field is an ancestor: become its first new child.
        return prev + 1;
    }
    // The preceding field ends an earlier sibling's subtree; skip past that sibling.
    let sibling: Vec<&str,> = prev_node
        .path
        .split(PATH_SEPARATOR,)
        .take(record.depth + 1,)
        .collect();
    let sibling_path = sibling.join(PATH_SEPARATOR,);
    match nodes[..=prev].iter().rposition(|n| n.path == sibling_path,) {
        Some(start,) => end_of_subtree(nodes, start, &sibling_path,),
        None => prev + 1,
    }
}

/// Renumbers `order_index` as the rank among siblings in list order.
fn renumber_siblings(nodes: &mut [MergedFieldNode],) {
    let mut ranks: HashMap<String, usize,> = HashMap::new();
    for node in nodes.iter_mut() {
        let rank = ranks.entry(node.parent_path.clone(),).or_insert(0,);
        node.order_index = *rank;
        *rank += 1;
    }
}

/// Merges the fields of `files` into one deduplicated, order-preserving list annotated with
/// per-file presence.
///
/// A name that every file contains but that the files place at different paths gets
/// `structural_difference` set on each of its nodes, together with every path it occupies.
pub fn merge_fields(files: &[FileFieldSet],) -> Vec<MergedFieldNode,> {
    let mut merged: Vec<MergedFieldNode,> = Vec::new();

    for file in files {
        let mut previous: Option<usize,> = None;
        for record in document_order(&file.fields,) {
            let position = match merged.iter().position(|n| n.path == record.path,) {
                Some(existing,) => {
                    let node = &mut merged[existing];
                    if !node.is_present_in(&file.filename,) {
                        node.present_in_files.push(file.filename.clone(),);
                    }
                    node.has_children |= record.has_children;
                    existing
                },
                None => {
                    let at = insertion_point(&merged, previous, &record,);
                    merged.insert(at, MergedFieldNode::from_record(&record, &file.filename,),);
                    at
                },
            };
            previous = Some(position,);
        }
    }

    for name in common_field_names(files,) {
        if let Some(variants,) = structural_variants(files, &name,) {
            for node in merged.iter_mut().filter(|n| n.name == name,) {
                node.structural_difference = true;
                node.alternative_paths_with_files = variants.clone();
            }
        }
    }

    renumber_siblings(&mut merged,);
    debug!("merged {} files into {} fields", files.len(), merged.len());
    merged
}

pub fn merged_tree(nodes: Vec<MergedFieldNode,>,) -> Vec<TreeNode<MergedFieldNode,>,> {
    build_tree(nodes,)
}
