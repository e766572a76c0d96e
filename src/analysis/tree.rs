//! Rebuilds parent/child structure over flat records.
//!
//! Records live in an arena addressed by their input position, so two records with the same
//! path stay distinct nodes. A record's parent is the nearest record whose path equals its
//! parent path, looking backwards through the input first and forwards only when nothing
//! precedes it. Records whose parent is missing stay roots.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::field::{FieldRecord, parent_path_of};

/// A record that can be placed in a field tree.
pub trait TreeRecord {
    fn path(&self,) -> &str;
    fn order_index(&self,) -> usize;

    fn depth(&self,) -> usize {
        crate::field::depth_of(self.path(),)
    }

    fn parent_path(&self,) -> &str {
        parent_path_of(self.path(),)
    }
}

impl TreeRecord for FieldRecord {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
pub struct TreeNode<T,> {
    #[serde(flatten)]
    pub record:   T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode<T,>,>,
}

/// Default sibling ordering: siblings by `order_index`, anything else by depth and then by
/// path. Ties keep input order.
pub fn sibling_order<T: TreeRecord,>(a: &T, b: &T,) -> Ordering {
    a.depth().cmp(&b.depth(),).then_with(|| {
        if a.parent_path() == b.parent_path() {
            a.order_index()
                .cmp(&b.order_index(),)
                .then_with(|| a.path().cmp(b.path(),),)
        } else {
            a.path().cmp(b.path(),)
        }
    },)
}

pub fn build_tree<T: TreeRecord,>(records: Vec<T,>,) -> Vec<TreeNode<T,>,> {
    build_tree_by(records, sibling_order,)
}

/// Builds the forest with a caller-supplied sibling ordering, applied to every child list
/// and to the roots.
pub fn build_tree_by<T, F,>(records: Vec<T,>, order: F,) -> Vec<TreeNode<T,>,>
where
    T: TreeRecord,
    F: Fn(&T, &T,) -> Ordering,
{
    let mut instances: HashMap<&str, Vec<usize,>,> = HashMap::new();
    for (id, record,) in records.iter().enumerate() {
        instances.entry(record.path(),).or_default().push(id,);
    }

    let mut children: Vec<Vec<usize,>,> = vec![Vec::new(); records.len()];
    let mut roots: Vec<usize,> = Vec::new();
    for (id, record,) in records.iter().enumerate() {
        let parent = instances
            .get(record.parent_path(),)
            .and_then(|candidates| nearest_instance(candidates, id,),);
        match parent {
            Some(parent_id,) => children[parent_id].push(id,),
            None => roots.push(id,),
        }
    }
    drop(instances,);

    for list in children.iter_mut() {
        list.sort_by(|&a, &b| order(&records[a], &records[b],),);
    }
    roots.sort_by(|&a, &b| order(&records[a], &records[b],),);

    assemble(records, &roots, &children,)
}

/// Closest candidate before `id`, else the first one after it. `candidates` is ascending.
fn nearest_instance(candidates: &[usize], id: usize,) -> Option<usize,> {
    let split = candidates.partition_point(|&c| c < id,);
    if split > 0 {
        return Some(candidates[split - 1],);
    }
    candidates[split..].iter().copied().find(|&c| c != id,)
}

/// Moves the records into nodes bottom-up. Post-order with an explicit stack, so nesting
/// depth is bounded by memory rather than by the call stack.
fn assemble<T,>(records: Vec<T,>, roots: &[usize], children: &[Vec<usize,>],) -> Vec<TreeNode<T,>,> {
    let mut slots: Vec<Option<T,>,> = records.into_iter().map(Some,).collect();
    let mut built: Vec<Option<TreeNode<T,>,>,> = slots.iter().map(|_| None,).collect();

    let mut stack: Vec<(usize, bool,),> = roots.iter().rev().map(|&id| (id, false,),).collect();
    while let Some((id, expanded,),) = stack.pop() {
        if !expanded {
            stack.push((id, true,),);
            stack.extend(children[id].iter().rev().map(|&child| (child, false,),),);
            continue;
        }
        let Some(record,) = slots[id].take() else {
            continue;
        };
        let kids = children[id]
            .iter()
            .filter_map(|&child| built[child].take(),)
            .collect();
        built[id] = Some(TreeNode {
            record,
            children: kids,
        },);
    }

    roots.iter().filter_map(|&id| built[id].take(),).collect()
}

/// Pre-order listing of a forest.
pub fn flatten_tree<T,>(nodes: &[TreeNode<T,>],) -> Vec<&T,> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode<T,>,> = nodes.iter().rev().collect();
    while let Some(node,) = stack.pop() {
        out.push(&node.record,);
        stack.extend(node.children.iter().rev(),);
    }
    out
}

/// Consuming variant of [`flatten_tree`].
pub fn into_flat<T,>(nodes: Vec<TreeNode<T,>,>,) -> Vec<T,> {
    let mut out = Vec::new();
    let mut stack: Vec<TreeNode<T,>,> = nodes.into_iter().rev().collect();
    while let Some(node,) = stack.pop() {
        stack.extend(node.children.into_iter().rev(),);
        out.push(node.record,);
    }
    out
}

/// A file's records in hierarchical document order.
pub fn document_order(records: &[FieldRecord],) -> Vec<FieldRecord,> {
    into_flat(build_tree(records.to_vec(),),)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extractor::extract_fields;
    use crate::reader::xml_reader::parse_xml_str;

    #[derive(Debug, Clone, PartialEq,)]
    struct Rec {
        path:  &'static str,
        order: usize,
    }

    impl TreeRecord for Rec {
        fn path(&self,) -> &str {
            self.path
        }

        fn order_index(&self,) -> usize {
            self.order
        }
    }

    fn rec(path: &'static str, order: usize,) -> Rec {
        Rec { path, order, }
    }

    fn shape<T: TreeRecord,>(nodes: &[TreeNode<T,>],) -> Vec<(String, usize,),> {
        fn walk<T: TreeRecord,>(nodes: &[TreeNode<T,>], out: &mut Vec<(String, usize,),>,) {
            for node in nodes {
                out.push((node.record.path().to_string(), node.children.len(),),);
                walk(&node.children, out,);
            }
        }
        let mut out = Vec::new();
        walk(nodes, &mut out,);
        out
    }

    #[test]
    fn test_children_sorted_by_order_index() {
        let tree = build_tree(vec![
            rec("A", 0,),
            rec("A > C", 1,),
            rec("A > B", 0,),
            rec("A > B > D", 0,),
        ],);
        assert_eq!(tree.len(), 1);
        let paths: Vec<&str,> = flatten_tree(&tree,).iter().map(|r| r.path,).collect();
        assert_eq!(paths, vec!["A", "A > B", "A > B > D", "A > C"]);
    }

    #[test]
    fn test_missing_parent_keeps_record_as_root() {
        let tree = build_tree(vec![rec("A > B > C", 0,), rec("A", 0,)],);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].record.path, "A");
        assert_eq!(tree[1].record.path, "A > B > C");
    }

    #[test]
    fn test_duplicate_paths_attach_to_nearest_preceding_parent() {
        let tree = build_tree(vec![
            rec("Lines", 0,),
            rec("Lines > Line", 0,),
            rec("Lines > Line > Qty", 0,),
            rec("Lines > Line", 1,),
            rec("Lines > Line > Price", 0,),
        ],);
        assert_eq!(
            shape(&tree),
            vec![
                ("Lines".to_string(), 2),
                ("Lines > Line".to_string(), 1),
                ("Lines > Line > Qty".to_string(), 0),
                ("Lines > Line".to_string(), 1),
                ("Lines > Line > Price".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_parent_listed_after_child_is_found_forward() {
        let tree = build_tree(vec![rec("A > B", 0,), rec("A", 0,)],);
        assert_eq!(shape(&tree), vec![("A".to_string(), 1), ("A > B".to_string(), 0)]);
    }

    #[test]
    fn test_custom_order_reverses_siblings() {
        let tree = build_tree_by(
            vec![rec("A", 0,), rec("A > B", 0,), rec("A > C", 1,)],
            |a: &Rec, b: &Rec| b.order.cmp(&a.order,),
        );
        let paths: Vec<&str,> = flatten_tree(&tree,).iter().map(|r| r.path,).collect();
        assert_eq!(paths, vec!["A", "A > C", "A > B"]);
    }

    #[test]
    fn test_extract_then_build_reproduces_nesting() {
        let root = parse_xml_str(
            "<Order><Id>1</Id><Customer><Name>x</Name><Email/></Customer><Total/></Order>",
            "a.xml",
        )
        .unwrap();
        let tree = build_tree(extract_fields(&root,),);
        let sequence: Vec<(&str, usize,),> = flatten_tree(&tree,)
            .iter()
            .map(|r| (r.name.as_str(), r.depth,),)
            .collect();
        assert_eq!(
            sequence,
            vec![
                ("Order", 0),
                ("Id", 1),
                ("Customer", 1),
                ("Name", 2),
                ("Email", 2),
                ("Total", 1)
            ]
        );
    }

    #[test]
    fn test_very_deep_nesting_builds_without_recursion() {
        const LEVELS: usize = 10_000;
        let deepest: &'static str =
            Box::leak(vec!["n"; LEVELS].join(crate::field::PATH_SEPARATOR,).into_boxed_str(),);
        // Level i is the prefix holding i + 1 segments; deepest first to force forward lookups.
        let records: Vec<Rec,> = (0..LEVELS)
            .rev()
            .map(|i| rec(&deepest[..1 + i * (crate::field::PATH_SEPARATOR.len() + 1)], 0,),)
            .collect();

        let tree = build_tree(records,);
        assert_eq!(tree.len(), 1);
        let mut node = &tree[0];
        let mut levels = 1;
        while let Some(child,) = node.children.first() {
            assert_eq!(node.children.len(), 1);
            node = child;
            levels += 1;
        }
        assert_eq!(levels, LEVELS);

        let flat = into_flat(tree,);
        assert_eq!(flat.len(), LEVELS);
        assert_eq!(flat[0].path, "n");
        assert_eq!(flat[LEVELS - 1].path, deepest);
    }

    #[test]
    fn test_empty_input_builds_empty_forest() {
        let tree: Vec<TreeNode<Rec,>,> = build_tree(Vec::new(),);
        assert!(tree.is_empty());
        assert!(document_order(&[]).is_empty());
    }
}
