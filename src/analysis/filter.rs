use std::collections::{BTreeSet, HashSet};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::{FieldRecord, FileFieldSet, parent_path_of};

pub const WILDCARD: char = '*';

/// `field` must hold a value matching `value`. `*` in `value` matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize,)]
pub struct FilterCondition {
    pub field:          String,
    pub value:          String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl FilterCondition {
    pub fn new(field: impl Into<String,>, value: impl Into<String,>, case_sensitive: bool,) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            case_sensitive,
        }
    }

    /// Only conditions naming a field and a non-blank pattern take part in selection.
    pub fn is_active(&self,) -> bool {
        !self.field.trim().is_empty() && !self.value.trim().is_empty()
    }

    fn is_satisfied_by(&self, file: &FileFieldSet,) -> bool {
        let Some(re,) = pattern_regex(self.value.trim(), self.case_sensitive,) else {
            return false;
        };
        file.fields
            .iter()
            .filter(|record| record.name == self.field.trim(),)
            .any(|record| record.values().into_iter().any(|value| re.is_match(value,),),)
    }
}

/// Anchored regex for `pattern`: every character is literal except `*`, which matches any
/// (possibly empty) run. Case-insensitive matching uses Unicode simple case folding, with or
/// without a wildcard.
fn pattern_regex(pattern: &str, case_sensitive: bool,) -> Option<Regex,> {
    let body = pattern
        .split(WILDCARD,)
        .map(regex::escape,)
        .collect::<Vec<_,>>()
        .join(".*",);
    match RegexBuilder::new(&format!("^{body}$"),)
        .case_insensitive(!case_sensitive,)
        .dot_matches_new_line(true,)
        .build()
    {
        Ok(re,) => Some(re,),
        Err(e,) => {
            tracing::warn!("ignoring unusable filter pattern {pattern:?}: {e}");
            None
        },
    }
}

/// Matches `value` against `pattern`. Without a `*` this is a whole-value comparison.
pub fn matches(value: &str, pattern: &str, case_sensitive: bool,) -> bool {
    pattern_regex(pattern, case_sensitive,).is_some_and(|re| re.is_match(value,),)
}

/// Files satisfying every active condition. No active conditions selects everything.
pub fn select_files(files: &[FileFieldSet], conditions: &[FilterCondition],) -> Vec<FileFieldSet,> {
    let active: Vec<&FilterCondition,> = conditions.iter().filter(|c| c.is_active(),).collect();
    if files.is_empty() || active.is_empty() {
        return files.to_vec();
    }

    let selected: Vec<FileFieldSet,> = files
        .iter()
        .filter(|file| active.iter().all(|condition| condition.is_satisfied_by(file,),),)
        .cloned()
        .collect();
    debug!(
        "{} of {} files match {} filter conditions",
        selected.len(),
        files.len(),
        active.len()
    );
    selected
}

/// Sorted names that carry at least one value in some file.
pub fn filterable_fields(files: &[FileFieldSet],) -> Vec<String,> {
    files
        .iter()
        .flat_map(|f| f.fields.iter(),)
        .filter(|r| !r.values().is_empty(),)
        .map(|r| r.name.clone(),)
        .collect::<BTreeSet<_,>>()
        .into_iter()
        .collect()
}

/// Records whose name or path contains `term` (ignoring case), plus every ancestor of a hit
/// so the result still forms a connected tree. A blank term keeps everything.
pub fn search_fields(records: &[FieldRecord], term: &str,) -> Vec<FieldRecord,> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return records.to_vec();
    }

    let mut keep: HashSet<&str,> = HashSet::new();
    for record in records {
        if record.name.to_lowercase().contains(&term,) || record.path.to_lowercase().contains(&term,) {
            let mut path = record.path.as_str();
            while !path.is_empty() && keep.insert(path,) {
                path = parent_path_of(path,);
            }
        }
    }
    records
        .iter()
        .filter(|r| keep.contains(r.path.as_str(),),)
        .cloned()
        .collect()
}
