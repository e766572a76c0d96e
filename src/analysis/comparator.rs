use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::aggregator::{AggregationResult, aggregate};
use crate::analysis::tree::{TreeNode, build_tree, document_order, into_flat};
use crate::field::{FieldRecord, FileFieldSet};

/// One of the distinct paths a field name occupies, with the files that place it there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct PathWithFiles {
    pub path:  String,
    pub files: Vec<String,>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct FieldDifference {
    pub present_in:       Vec<String,>,
    pub absent_in:        Vec<String,>,
    /// Depth -> files that contain the field at that depth.
    pub depth_variations: BTreeMap<usize, Vec<String,>,>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Fields whose name occurs in every file, in hierarchical pre-order.
    pub common_fields:          Vec<FieldRecord,>,
    pub unique_fields:          BTreeMap<String, Vec<FieldRecord,>,>,
    pub field_differences:      BTreeMap<String, FieldDifference,>,
    pub structural_differences: BTreeMap<String, Vec<PathWithFiles,>,>,
    pub aggregation:            AggregationResult,
}

impl ComparisonResult {
    pub fn common_tree(&self,) -> Vec<TreeNode<FieldRecord,>,> {
        build_tree(self.common_fields.clone(),)
    }
}

/// Names present in every file. Empty for an empty set.
pub fn common_field_names(files: &[FileFieldSet],) -> BTreeSet<String,> {
    let Some((first, rest,),) = files.split_first() else {
        return BTreeSet::new();
    };
    first
        .field_names()
        .into_iter()
        .filter(|name| rest.iter().all(|f| f.has_field_name(name,),),)
        .map(str::to_string,)
        .collect()
}

fn push_unique(list: &mut Vec<String,>, value: &str,) {
    if !list.iter().any(|v| v == value,) {
        list.push(value.to_string(),);
    }
}

/// Distinct paths of `name` across `files`, when the files disagree on where it lives.
///
/// Returns `None` when the name sits at the same set of paths in every file, which is always
/// the case for a single file.
pub(crate) fn structural_variants(
    files: &[FileFieldSet],
    name: &str,
) -> Option<Vec<PathWithFiles,>,> {
    let mut variants: Vec<PathWithFiles,> = Vec::new();
    for file in files {
        for record in file.fields.iter().filter(|r| r.name == name,) {
            match variants.iter_mut().find(|v| v.path == record.path,) {
                Some(variant,) => push_unique(&mut variant.files, &file.filename,),
                None => variants.push(PathWithFiles {
                    path:  record.path.clone(),
                    files: vec![file.filename.clone()],
                },),
            }
        }
    }

    let file_count = files
        .iter()
        .map(|f| f.filename.as_str(),)
        .collect::<HashSet<_,>>()
        .len();
    let diverges = variants.len() > 1 && variants.iter().any(|v| v.files.len() < file_count,);
    diverges.then_some(variants,)
}

fn common_fields(files: &[FileFieldSet], common: &BTreeSet<String,>,) -> Vec<FieldRecord,> {
    let mut seen: HashSet<String,> = HashSet::new();
    let mut representatives = Vec::new();
    for file in files {
        for record in document_order(&file.fields,) {
            if common.contains(&record.name,) && seen.insert(record.path.clone(),) {
                representatives.push(record,);
            }
        }
    }
    into_flat(build_tree(representatives,),)
}

fn unique_fields(files: &[FileFieldSet],) -> BTreeMap<String, Vec<FieldRecord,>,> {
    let mut unique: BTreeMap<String, Vec<FieldRecord,>,> = files
        .iter()
        .map(|f| (f.filename.clone(), Vec::new(),),)
        .collect();
    if files.len() < 2 {
        return unique;
    }

    for (idx, file,) in files.iter().enumerate() {
        let others: Vec<&FileFieldSet,> = files
            .iter()
            .enumerate()
            .filter(|(other, _,)| *other != idx,)
            .map(|(_, f,)| f,)
            .collect();
        let fields: Vec<FieldRecord,> = document_order(&file.fields,)
            .into_iter()
            .filter(|r| !others.iter().any(|o| o.has_field_name(&r.name,),),)
            .collect();
        unique.entry(file.filename.clone(),).or_default().extend(fields,);
    }
    unique
}

fn field_differences(files: &[FileFieldSet],) -> BTreeMap<String, FieldDifference,> {
    let all_names: BTreeSet<&str,> = files.iter().flat_map(|f| f.field_names(),).collect();
    let mut differences = BTreeMap::new();

    for name in all_names {
        let mut difference = FieldDifference::default();
        for file in files {
            if !file.has_field_name(name,) {
                push_unique(&mut difference.absent_in, &file.filename,);
                continue;
            }
            push_unique(&mut difference.present_in, &file.filename,);
            for record in file.fields.iter().filter(|r| r.name == name,) {
                push_unique(
                    difference.depth_variations.entry(record.depth,).or_default(),
                    &file.filename,
                );
            }
        }
        if !difference.absent_in.is_empty() || difference.depth_variations.len() > 1 {
            differences.insert(name.to_string(), difference,);
        }
    }
    differences
}

/// Compares `files` field by field.
///
/// Membership is decided by field name; structural differences by path, and only for names
/// that every file contains.
pub fn compare_fields(files: &[FileFieldSet],) -> ComparisonResult {
    let common = common_field_names(files,);
    let structural_differences: BTreeMap<String, Vec<PathWithFiles,>,> = common
        .iter()
        .filter_map(|name| structural_variants(files, name,).map(|v| (name.clone(), v,),),)
        .collect();

    let result = ComparisonResult {
        common_fields: common_fields(files, &common,),
        unique_fields: unique_fields(files,),
        field_differences: field_differences(files,),
        structural_differences,
        aggregation: aggregate(files,),
    };
    debug!(
        "compared {} files: {} common fields, {} structural differences",
        files.len(),
        result.common_fields.len(),
        result.structural_differences.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extractor::{ExtractOptions, extract_document};

    fn file(name: &str, xml: &str,) -> FileFieldSet {
        extract_document(xml, name, ExtractOptions::default(),).unwrap()
    }

    fn paths(records: &[FieldRecord],) -> Vec<&str,> {
        records.iter().map(|r| r.path.as_str(),).collect()
    }

    #[test]
    fn test_two_file_order_example() {
        let file1 = file("File1", "<Order><Id>1</Id><Name>X</Name></Order>",);
        let file2 = file("File2", "<Order><Id>2</Id></Order>",);
        let result = compare_fields(&[file1, file2,],);

        assert_eq!(paths(&result.common_fields), vec!["Order", "Order > Id"]);
        let unique_names: Vec<&str,> =
            result.unique_fields["File1"].iter().map(|r| r.name.as_str(),).collect();
        assert_eq!(unique_names, vec!["Name"]);
        assert!(result.unique_fields["File2"].is_empty());

        let name_diff = &result.field_differences["Name"];
        assert_eq!(name_diff.present_in, vec!["File1"]);
        assert_eq!(name_diff.absent_in, vec!["File2"]);
        assert!(!result.field_differences.contains_key("Id"));
        assert!(result.structural_differences.is_empty());
        assert_eq!(result.aggregation.files_count, 2);
    }

    #[test]
    fn test_single_file_is_all_common_and_nothing_unique() {
        let a = file("A", "<Doc><Head><Title>t</Title></Head><Body><Title>u</Title></Body></Doc>",);
        let result = compare_fields(&[a.clone()],);
        let common: BTreeSet<&str,> = result.common_fields.iter().map(|r| r.name.as_str(),).collect();
        assert_eq!(common, a.field_names());
        assert!(result.unique_fields["A"].is_empty());
        assert!(result.structural_differences.is_empty());
    }

    #[test]
    fn test_common_membership_is_symmetric() {
        let a = file("A", "<R><X/><Y/><Z/></R>",);
        let b = file("B", "<R><Y/><Q><X/></Q></R>",);
        let ab: BTreeSet<String,> =
            compare_fields(&[a.clone(), b.clone()],).common_fields.into_iter().map(|r| r.name,).collect();
        let ba: BTreeSet<String,> =
            compare_fields(&[b, a],).common_fields.into_iter().map(|r| r.name,).collect();
        assert_eq!(ab, ba);
        assert!(ab.contains("X"));
        assert!(!ab.contains("Z"));
    }

    #[test]
    fn test_unique_means_absent_from_every_other_file() {
        let a = file("A", "<R><Only/><Shared/></R>",);
        let b = file("B", "<R><Shared/></R>",);
        let c = file("C", "<R><Only/></R>",);
        let result = compare_fields(&[a, b, c,],);
        assert!(result.unique_fields["A"].is_empty());
        assert!(result.unique_fields["B"].is_empty());
        assert!(result.unique_fields["C"].is_empty());
        assert_eq!(result.field_differences["Only"].absent_in, vec!["B"]);
    }

    #[test]
    fn test_structural_and_depth_differences() {
        let a = file("A", "<Doc><Name>a</Name></Doc>",);
        let b = file("B", "<Doc><Party><Name>b</Name></Party></Doc>",);
        let result = compare_fields(&[a, b,],);

        let variants = &result.structural_differences["Name"];
        assert_eq!(
            variants,
            &vec![
                PathWithFiles {
                    path:  "Doc > Name".to_string(),
                    files: vec!["A".to_string()],
                },
                PathWithFiles {
                    path:  "Doc > Party > Name".to_string(),
                    files: vec!["B".to_string()],
                },
            ]
        );
        let depths = &result.field_differences["Name"].depth_variations;
        assert_eq!(depths[&1], vec!["A"]);
        assert_eq!(depths[&2], vec!["B"]);
        let common: Vec<&str,> = paths(&result.common_fields,);
        assert_eq!(common, vec!["Doc", "Doc > Name", "Doc > Party > Name"]);
    }

    #[test]
    fn test_empty_set_returns_empty_shapes() {
        let result = compare_fields(&[],);
        assert!(result.common_fields.is_empty());
        assert!(result.unique_fields.is_empty());
        assert!(result.field_differences.is_empty());
        assert_eq!(result.aggregation.files_count, 0);
    }
}
