use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::FieldScopeError;
use crate::field::{FieldRecord, FileFieldSet, join_path};
use crate::reader::xml_reader::{ElementNode, parse_xml_str};

pub const DEFAULT_TEXT_SAMPLE_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct ExtractOptions {
    /// Maximum characters kept in `FieldRecord::text_content`.
    pub text_sample_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            text_sample_len: DEFAULT_TEXT_SAMPLE_LEN,
        }
    }
}

fn truncate_sample(text: &str, max_chars: usize,) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut sample: String = text.chars().take(max_chars,).collect();
    sample.push_str("...",);
    sample
}

struct Extractor {
    options:        ExtractOptions,
    records:        Vec<FieldRecord,>,
    by_name_depth:  HashMap<(String, usize,), usize,>,
    sibling_counts: HashMap<String, usize,>,
}

impl Extractor {
    fn new(options: ExtractOptions,) -> Self {
        Self {
            options,
            records: Vec::new(),
            by_name_depth: HashMap::new(),
            sibling_counts: HashMap::new(),
        }
    }

    fn visit(&mut self, element: &ElementNode, parent_path: &str, depth: usize,) {
        let text = element.trimmed_text();
        let key = (element.name.clone(), depth,);

        if let Some(&idx,) = self.by_name_depth.get(&key,) {
            let record = &mut self.records[idx];
            record.occurrences += 1;
            record.has_children |= !element.children.is_empty();
            record.child_count = record.child_count.max(element.children.len(),);
            record
                .attributes
                .extend(element.attributes.iter().map(|(k, _,)| k.clone(),),);
            if !text.is_empty() {
                record.has_text = true;
                if record.text_content.is_none() {
                    record.text_content = Some(truncate_sample(text, self.options.text_sample_len,),);
                }
                *record
                    .value_counts
                    .get_or_insert_with(BTreeMap::new,)
                    .entry(text.to_string(),)
                    .or_insert(0,) += 1;
            }
            return;
        }

        let siblings = self.sibling_counts.entry(parent_path.to_string(),).or_insert(0,);
        let order_index = *siblings;
        *siblings += 1;

        let mut value_counts = BTreeMap::new();
        if !text.is_empty() {
            value_counts.insert(text.to_string(), 1,);
        }
        let attributes: BTreeSet<String,> =
            element.attributes.iter().map(|(k, _,)| k.clone(),).collect();

        self.by_name_depth.insert(key, self.records.len(),);
        self.records.push(FieldRecord {
            name: element.name.clone(),
            path: join_path(parent_path, &element.name,),
            parent_path: parent_path.to_string(),
            depth,
            order_index,
            has_children: !element.children.is_empty(),
            child_count: element.children.len(),
            has_text: !text.is_empty(),
            text_content: (!text.is_empty())
                .then(|| truncate_sample(text, self.options.text_sample_len,),),
            value_counts: Some(value_counts,),
            attributes,
            occurrences: 1,
        },);
    }

    /// Depth-first pre-order walk. Every element instance is visited once, in document order,
    /// even when it folds into an existing record.
    fn walk(&mut self, root: &ElementNode,) {
        let mut stack: Vec<(&ElementNode, String, usize,),> = vec![(root, String::new(), 0,)];
        while let Some((element, parent_path, depth,),) = stack.pop() {
            self.visit(element, &parent_path, depth,);
            let own_path = join_path(&parent_path, &element.name,);
            for child in element.children.iter().rev() {
                stack.push((child, own_path.clone(), depth + 1,),);
            }
        }
    }
}

/// Flattens a document into one record per `(name, depth)`, sorted by `(depth, name)`.
///
/// Two elements with the same name at the same depth fold into a single record even when
/// they sit under different branches: occurrences and value counts are summed and the path
/// is the one of the first element seen.
pub fn extract_fields(root: &ElementNode,) -> Vec<FieldRecord,> {
    extract_fields_with(root, ExtractOptions::default(),)
}

pub fn extract_fields_with(root: &ElementNode, options: ExtractOptions,) -> Vec<FieldRecord,> {
    let mut extractor = Extractor::new(options,);
    extractor.walk(root,);
    let mut records = extractor.records;
    records.sort_by(|a, b| a.depth.cmp(&b.depth,).then_with(|| a.name.cmp(&b.name,),),);
    tracing::trace!("extracted {} field records from <{}>", records.len(), root.name);
    records
}

/// Parses `text` and extracts its fields as the file set `filename`.
pub fn extract_document(
    text: &str,
    filename: &str,
    options: ExtractOptions,
) -> Result<FileFieldSet, FieldScopeError,> {
    let root = parse_xml_str(text, filename,)?;
    Ok(FileFieldSet::new(filename, extract_fields_with(&root, options,),),)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<'a,>(records: &'a [FieldRecord], path: &str,) -> &'a FieldRecord {
        records
            .iter()
            .find(|r| r.path == path,)
            .unwrap_or_else(|| panic!("no record for {path}"),)
    }

    #[test]
    fn test_extract_paths_depths_and_sort_order() {
        let root = parse_xml_str(
            "<Order><Name>X</Name><Id>1</Id><Lines><Line>a</Line></Lines></Order>",
            "a.xml",
        )
        .unwrap();
        let records = extract_fields(&root,);
        let paths: Vec<&str,> = records.iter().map(|r| r.path.as_str(),).collect();
        assert_eq!(
            paths,
            vec![
                "Order",
                "Order > Id",
                "Order > Lines",
                "Order > Name",
                "Order > Lines > Line"
            ]
        );
        let line = record(&records, "Order > Lines > Line",);
        assert_eq!(line.depth, 2);
        assert_eq!(line.parent_path, "Order > Lines");
        let order = record(&records, "Order",);
        assert!(order.has_children);
        assert_eq!(order.child_count, 3);
        assert_eq!(order.parent_path, "");
    }

    #[test]
    fn test_order_index_follows_document_order() {
        let root = parse_xml_str("<Order><Name/><Id/><Lines/></Order>", "a.xml",).unwrap();
        let records = extract_fields(&root,);
        assert_eq!(record(&records, "Order > Name").order_index, 0);
        assert_eq!(record(&records, "Order > Id").order_index, 1);
        assert_eq!(record(&records, "Order > Lines").order_index, 2);
    }

    #[test]
    fn test_repeated_siblings_fold_into_one_record() {
        let root = parse_xml_str(
            "<Lines><Line>a</Line><Line>b</Line><Line>a</Line><Line/></Lines>",
            "a.xml",
        )
        .unwrap();
        let records = extract_fields(&root,);
        assert_eq!(records.len(), 2);
        let line = record(&records, "Lines > Line",);
        assert_eq!(line.occurrences, 4);
        let counts = line.value_counts.as_ref().unwrap();
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));
        assert_eq!(line.text_content.as_deref(), Some("a"));
    }

    #[test]
    fn test_same_name_and_depth_in_different_branches_fold() {
        let root = parse_xml_str(
            "<Doc><Buyer><Name>B</Name></Buyer><Seller><Name>S</Name></Seller></Doc>",
            "a.xml",
        )
        .unwrap();
        let records = extract_fields(&root,);
        let names: Vec<&FieldRecord,> = records.iter().filter(|r| r.name == "Name",).collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].path, "Doc > Buyer > Name");
        assert_eq!(names[0].occurrences, 2);
        assert_eq!(names[0].value_counts.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_childless_root_yields_single_record() {
        let root = ElementNode::new("Empty",);
        let records = extract_fields(&root,);
        assert_eq!(records.len(), 1);
        assert!(!records[0].has_children);
        assert!(!records[0].has_text);
        assert_eq!(records[0].depth, 0);
    }

    #[test]
    fn test_attributes_and_text_sample_truncation() {
        let root = ElementNode::new("Doc",).with_child(
            ElementNode::new("Note",)
                .with_attribute("lang", "en",)
                .with_text("abcdefghij",),
        );
        let records = extract_fields_with(&root, ExtractOptions { text_sample_len: 4 },);
        let note = record(&records, "Doc > Note",);
        assert!(note.attributes.contains("lang"));
        assert_eq!(note.text_content.as_deref(), Some("abcd..."));
        assert_eq!(note.value_counts.as_ref().unwrap().get("abcdefghij"), Some(&1));
    }

    #[test]
    fn test_extract_document_propagates_parse_error() {
        let err = extract_document("<a>", "broken.xml", ExtractOptions::default(),).unwrap_err();
        assert!(matches!(err, FieldScopeError::ParseError { .. }));
    }
}
