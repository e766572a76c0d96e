//! Flat field records and the path conventions shared by every analysis.
//!
//! A path is the chain of ancestor element names joined by [`PATH_SEPARATOR`], ending in the
//! element's own name. The root element's path is its bare name and its parent path is empty.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const PATH_SEPARATOR: &str = " > ";

/// One element occurrence class within one document, folded by `(name, depth)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct FieldRecord {
    pub name:         String,
    pub path:         String,
    pub parent_path:  String,
    pub depth:        usize,
    pub order_index:  usize,
    pub has_children: bool,
    pub child_count:  usize,
    pub has_text:     bool,
    /// First non-empty text seen, truncated for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String,>,
    /// Trimmed text value -> number of occurrences carrying it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_counts: Option<BTreeMap<String, usize,>,>,
    #[serde(default)]
    pub attributes:   BTreeSet<String,>,
    pub occurrences:  usize,
}

impl FieldRecord {
    /// Every distinct value of this record, falling back to the display sample when no
    /// value distribution was recorded.
    pub fn values(&self,) -> Vec<&str,> {
        match &self.value_counts {
            Some(counts,) => counts.keys().map(String::as_str,).collect(),
            None => self.text_content.as_deref().into_iter().collect(),
        }
    }

    fn with_prefix_removed(&self, prefix: &str,) -> FieldRecord {
        FieldRecord {
            name: remove_prefix_from_name(&self.name, prefix,),
            path: remove_prefix_from_path(&self.path, prefix,),
            parent_path: remove_prefix_from_path(&self.parent_path, prefix,),
            ..self.clone()
        }
    }
}

/// The extracted fields of one loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct FileFieldSet {
    pub filename: String,
    pub fields:   Vec<FieldRecord,>,
}

impl FileFieldSet {
    pub fn new(filename: impl Into<String,>, fields: Vec<FieldRecord,>,) -> Self {
        Self {
            filename: filename.into(),
            fields,
        }
    }

    /// Distinct field names of this file.
    pub fn field_names(&self,) -> BTreeSet<&str,> {
        self.fields.iter().map(|f| f.name.as_str(),).collect()
    }

    pub fn has_field_name(&self, name: &str,) -> bool {
        self.fields.iter().any(|f| f.name == name,)
    }

    /// Copy of this set with `prefix` removed from every name and path segment.
    pub fn strip_prefix(&self, prefix: &str,) -> FileFieldSet {
        if prefix.is_empty() {
            return self.clone();
        }
        FileFieldSet {
            filename: self.filename.clone(),
            fields:   self
                .fields
                .iter()
                .map(|f| f.with_prefix_removed(prefix,),)
                .collect(),
        }
    }
}

pub fn join_path(parent_path: &str, name: &str,) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{parent_path}{PATH_SEPARATOR}{name}")
    }
}

/// `path` truncated at its last separator; empty for a root path.
pub fn parent_path_of(path: &str,) -> &str {
    match path.rfind(PATH_SEPARATOR,) {
        Some(idx,) => &path[..idx],
        None => "",
    }
}

pub fn depth_of(path: &str,) -> usize {
    path.matches(PATH_SEPARATOR,).count()
}

/// Last segment of `path`.
pub fn name_of(path: &str,) -> &str {
    match path.rfind(PATH_SEPARATOR,) {
        Some(idx,) => &path[idx + PATH_SEPARATOR.len()..],
        None => path,
    }
}

/// Strips a literal `prefix` from the start of `name`. Purely textual: `ns:Order` with prefix
/// `ns:` becomes `Order`, whatever namespace `ns` is bound to.
pub fn remove_prefix_from_name(name: &str, prefix: &str,) -> String {
    if prefix.is_empty() {
        return name.to_string();
    }
    name.strip_prefix(prefix,).unwrap_or(name,).to_string()
}

/// Applies [`remove_prefix_from_name`] to every segment of `path`.
pub fn remove_prefix_from_path(path: &str, prefix: &str,) -> String {
    if prefix.is_empty() || path.is_empty() {
        return path.to_string();
    }
    path.split(PATH_SEPARATOR,)
        .map(|segment| remove_prefix_from_name(segment, prefix,),)
        .collect::<Vec<_,>>()
        .join(PATH_SEPARATOR,)
}
