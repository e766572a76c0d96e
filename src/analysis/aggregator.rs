use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::tree::{TreeRecord, build_tree, into_flat};
use crate::field::{FieldRecord, FileFieldSet, parent_path_of};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
pub struct ValueCount {
    pub value:      String,
    pub count:      usize,
    /// Share of the field's total occurrences carrying this value.
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,)]
pub struct DepthRange {
    pub min: usize,
    pub max: usize,
}

/// Statistics for a field name, wherever it occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct NameStat {
    pub name:                         String,
    pub files_with_field:             usize,
    pub presence_percent:             f64,
    pub total_occurrences:            usize,
    pub average_occurrences_per_file: f64,
    pub value_counts:                 Vec<ValueCount,>,
    pub unique_values_count:          usize,
    /// First path seen in each file that has the field.
    pub sample_paths:                 Vec<String,>,
    pub depths:                       DepthRange,
}

/// Statistics for one exact path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct PathStat {
    pub path:                         String,
    pub name:                         String,
    pub parent_path:                  String,
    pub depth:                        usize,
    pub order_index:                  usize,
    pub has_children:                 bool,
    pub files_with_field:             usize,
    pub presence_percent:             f64,
    pub total_occurrences:            usize,
    pub average_occurrences_per_file: f64,
    pub value_counts:                 Vec<ValueCount,>,
    pub unique_values_count:          usize,
}

impl TreeRecord for PathStat {
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

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub files_count:             usize,
    /// Field records summed over all files.
    pub total_field_instances:   usize,
    pub average_fields_per_file: f64,
    pub unique_field_names:      usize,
    pub unique_field_paths:      usize,
    pub field_name_summary:      Vec<NameStat,>,
    /// Path statistics in hierarchical pre-order.
    pub field_path_summary:      Vec<PathStat,>,
}

fn ratio(numerator: usize, denominator: usize,) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Running totals shared by the name and path keyed passes.
#[derive(Default,)]
struct Tally {
    files:       Vec<String,>,
    occurrences: usize,
    values:      BTreeMap<String, usize,>,
}

impl Tally {
    fn add(&mut self, filename: &str, record: &FieldRecord,) {
        if !self.files.iter().any(|f| f == filename,) {
            self.files.push(filename.to_string(),);
        }
        self.occurrences += record.occurrences;
        if let Some(counts,) = &record.value_counts {
            for (value, count,) in counts {
                *self.values.entry(value.clone(),).or_insert(0,) += count;
            }
        }
    }

    /// Values by descending count, ties by value.
    fn value_counts(&self,) -> Vec<ValueCount,> {
        let mut counts: Vec<ValueCount,> = self
            .values
            .iter()
            .map(|(value, &count,)| ValueCount {
                value: value.clone(),
                count,
                percentage: ratio(count, self.occurrences,) * 100.0,
            },)
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count,).then_with(|| a.value.cmp(&b.value,),),);
        counts
    }
}

struct NameTally {
    tally:        Tally,
    sample_paths: Vec<String,>,
    depths:       DepthRange,
    last_file:    Option<String,>,
}

struct PathTally {
    tally:        Tally,
    name:         String,
    order_index:  usize,
    has_children: bool,
}

/// Aggregates presence, occurrence and value statistics across `files`, once per field name
/// and once per exact path.
pub fn aggregate(files: &[FileFieldSet],) -> AggregationResult {
    let files_count = files.len();
    let mut name_order: Vec<String,> = Vec::new();
    let mut by_name: HashMap<String, NameTally,> = HashMap::new();
    let mut by_path: Vec<(String, PathTally,),> = Vec::new();
    let mut path_index: HashMap<String, usize,> = HashMap::new();
    let mut total_field_instances = 0;

    for file in files {
        total_field_instances += file.fields.len();
        for record in &file.fields {
            let entry = by_name.entry(record.name.clone(),).or_insert_with(|| {
                name_order.push(record.name.clone(),);
                NameTally {
                    tally:        Tally::default(),
                    sample_paths: Vec::new(),
                    depths:       DepthRange {
                        min: record.depth,
                        max: record.depth,
                    },
                    last_file:    None,
                }
            },);
            entry.tally.add(&file.filename, record,);
            entry.depths.min = entry.depths.min.min(record.depth,);
            entry.depths.max = entry.depths.max.max(record.depth,);
            if entry.last_file.as_deref() != Some(file.filename.as_str(),) {
                entry.sample_paths.push(record.path.clone(),);
                entry.last_file = Some(file.filename.clone(),);
            }

            let idx = *path_index.entry(record.path.clone(),).or_insert_with(|| {
                by_path.push((
                    record.path.clone(),
                    PathTally {
                        tally:        Tally::default(),
                        name:         record.name.clone(),
                        order_index:  record.order_index,
                        has_children: false,
                    },
                ),);
                by_path.len() - 1
            },);
            let (_, path_tally,) = &mut by_path[idx];
            path_tally.tally.add(&file.filename, record,);
            path_tally.has_children |= record.has_children;
        }
    }

    let mut field_name_summary: Vec<NameStat,> = name_order
        .into_iter()
        .filter_map(|name| {
            let entry = by_name.remove(&name,)?;
            Some(NameStat {
                files_with_field: entry.tally.files.len(),
                presence_percent: ratio(entry.tally.files.len(), files_count,) * 100.0,
                total_occurrences: entry.tally.occurrences,
                average_occurrences_per_file: ratio(entry.tally.occurrences, files_count,),
                value_counts: entry.tally.value_counts(),
                unique_values_count: entry.tally.values.len(),
                sample_paths: entry.sample_paths,
                depths: entry.depths,
                name,
            },)
        },)
        .collect();
    field_name_summary.sort_by(|a, b| {
        b.files_with_field
            .cmp(&a.files_with_field,)
            .then_with(|| b.total_occurrences.cmp(&a.total_occurrences,),)
            .then_with(|| a.name.cmp(&b.name,),)
    },);

    let path_stats: Vec<PathStat,> = by_path
        .into_iter()
        .map(|(path, entry,)| PathStat {
            parent_path: parent_path_of(&path,).to_string(),
            depth: crate::field::depth_of(&path,),
            name: entry.name,
            order_index: entry.order_index,
            has_children: entry.has_children,
            files_with_field: entry.tally.files.len(),
            presence_percent: ratio(entry.tally.files.len(), files_count,) * 100.0,
            total_occurrences: entry.tally.occurrences,
            average_occurrences_per_file: ratio(entry.tally.occurrences, files_count,),
            value_counts: entry.tally.value_counts(),
            unique_values_count: entry.tally.values.len(),
            path,
        },)
        .collect();
    let field_path_summary = into_flat(build_tree(path_stats,),);

    debug!(
        "aggregated {} files into {} names and {} paths",
        files_count,
        field_name_summary.len(),
        field_path_summary.len()
    );
    AggregationResult {
        files_count,
        total_field_instances,
        average_fields_per_file: ratio(total_field_instances, files_count,),
        unique_field_names: field_name_summary.len(),
        unique_field_paths: field_path_summary.len(),
        field_name_summary,
        field_path_summary,
    }
}

impl AggregationResult {
    pub fn name_stat(&self, name: &str,) -> Option<&NameStat,> {
        self.field_name_summary.iter().find(|s| s.name == name,)
    }

    pub fn path_stat(&self, path: &str,) -> Option<&PathStat,> {
        self.field_path_summary.iter().find(|s| s.path == path,)
    }
}
