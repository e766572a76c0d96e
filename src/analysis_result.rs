use std::fmt::{self, Write};

use serde::Serialize;

use crate::analysis::aggregator::{AggregationResult, ValueCount};
use crate::analysis::comparator::ComparisonResult;
use crate::analysis::merger::MergedFieldNode;
use crate::analysis::tree::{TreeNode, document_order, flatten_tree};
use crate::field::{FieldRecord, FileFieldSet};
use crate::output::OutputFormat;

/// Values listed per field in text output.
const TEXT_VALUE_LIMIT: usize = 5;

#[derive(Debug, Serialize,)]
pub struct FileTree {
    pub filename: String,
    pub tree:     Vec<TreeNode<FieldRecord,>,>,
}

/// The result of one command, ready to be printed in any [`OutputFormat`].
#[derive(Debug, Serialize,)]
#[serde(untagged)]
pub enum AnalysisReport {
    Fields(Vec<FileFieldSet,>,),
    Trees(Vec<FileTree,>,),
    Comparison(Box<ComparisonResult,>,),
    Aggregation(AggregationResult,),
    Merge(Vec<MergedFieldNode,>,),
    /// Filenames chosen by the filter conditions.
    Selection(Vec<String,>,),
    /// Field names usable in filter conditions.
    FilterableFields(Vec<String,>,),
}

fn indent(depth: usize,) -> String {
    "  ".repeat(depth,)
}

fn format_values(values: &[ValueCount],) -> String {
    let mut shown: Vec<String,> = values
        .iter()
        .take(TEXT_VALUE_LIMIT,)
        .map(|v| format!("{} ({}, {:.1}%)", v.value, v.count, v.percentage),)
        .collect();
    if values.len() > TEXT_VALUE_LIMIT {
        shown.push(format!("... {} more", values.len() - TEXT_VALUE_LIMIT),);
    }
    shown.join(", ",)
}

fn write_record_line<W: Write,>(out: &mut W, record: &FieldRecord,) -> fmt::Result {
    write!(out, "{}{} (x{})", indent(record.depth + 1,), record.name, record.occurrences)?;
    if let Some(sample,) = &record.text_content {
        write!(out, " = {:?}", sample)?;
    }
    if !record.attributes.is_empty() {
        let attrs: Vec<&str,> = record.attributes.iter().map(String::as_str,).collect();
        write!(out, " @[{}]", attrs.join(", "))?;
    }
    writeln!(out)
}

fn render_records<'a, W: Write,>(
    out: &mut W,
    records: impl IntoIterator<Item = &'a FieldRecord,>,
) -> fmt::Result {
    for record in records {
        write_record_line(out, record,)?;
    }
    Ok((),)
}

fn render_aggregation<W: Write,>(out: &mut W, aggregation: &AggregationResult,) -> fmt::Result {
    writeln!(
        out,
        "Files: {}  Field records: {}  Avg fields/file: {:.2}  Names: {}  Paths: {}",
        aggregation.files_count,
        aggregation.total_field_instances,
        aggregation.average_fields_per_file,
        aggregation.unique_field_names,
        aggregation.unique_field_paths,
    )?;
    writeln!(out, "\nBy name:")?;
    for stat in &aggregation.field_name_summary {
        writeln!(
            out,
            "  {}: {}/{} files ({:.1}%), {} occurrences ({:.2}/file), {} distinct values",
            stat.name,
            stat.files_with_field,
            aggregation.files_count,
            stat.presence_percent,
            stat.total_occurrences,
            stat.average_occurrences_per_file,
            stat.unique_values_count,
        )?;
        if !stat.value_counts.is_empty() {
            writeln!(out, "    values: {}", format_values(&stat.value_counts))?;
        }
    }
    writeln!(out, "\nBy path:")?;
    for stat in &aggregation.field_path_summary {
        writeln!(
            out,
            "{}{}: {}/{} files ({:.1}%), {} occurrences",
            indent(stat.depth + 1,),
            stat.name,
            stat.files_with_field,
            aggregation.files_count,
            stat.presence_percent,
            stat.total_occurrences,
        )?;
    }
    Ok((),)
}

fn render_comparison<W: Write,>(out: &mut W, result: &ComparisonResult,) -> fmt::Result {
    writeln!(out, "Common fields:")?;
    render_records(out, &result.common_fields,)?;

    writeln!(out, "\nUnique fields:")?;
    for (filename, fields,) in &result.unique_fields {
        writeln!(out, "  {}: {}", filename, fields.len())?;
        for record in fields {
            writeln!(out, "    {}", record.path)?;
        }
    }

    if !result.field_differences.is_empty() {
        writeln!(out, "\nField differences:")?;
        for (name, difference,) in &result.field_differences {
            writeln!(
                out,
                "  {}: present in [{}], absent in [{}]",
                name,
                difference.present_in.join(", "),
                difference.absent_in.join(", "),
            )?;
            if difference.depth_variations.len() > 1 {
                for (depth, files,) in &difference.depth_variations {
                    writeln!(out, "    depth {}: {}", depth, files.join(", "))?;
                }
            }
        }
    }

    if !result.structural_differences.is_empty() {
        writeln!(out, "\nStructural differences:")?;
        for (name, variants,) in &result.structural_differences {
            writeln!(out, "  {}:", name)?;
            for variant in variants {
                writeln!(out, "    {} <- {}", variant.path, variant.files.join(", "))?;
            }
        }
    }

    writeln!(out, "\nAggregation:")?;
    render_aggregation(out, &result.aggregation,)
}

fn render_merge<W: Write,>(out: &mut W, nodes: &[MergedFieldNode],) -> fmt::Result {
    for node in nodes {
        let marker = if node.structural_difference { "*" } else { "" };
        writeln!(
            out,
            "{}{}{} [{}]",
            indent(node.depth + 1,),
            node.name,
            marker,
            node.present_in_files.join(", "),
        )?;
    }
    if nodes.iter().any(|n| n.structural_difference,) {
        writeln!(out, "\n* found at different paths across files")?;
    }
    Ok((),)
}

impl AnalysisReport {
    pub fn to_string_formatted(&self, format: OutputFormat,) -> String {
        format.serialize(self,).unwrap_or_else(|| self.to_string(),)
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        match self {
            AnalysisReport::Fields(files,) => {
                for file in files {
                    writeln!(f, "--- File: {} ---", file.filename)?;
                    render_records(f, &document_order(&file.fields,),)?;
                }
                Ok((),)
            },
            AnalysisReport::Trees(trees,) => {
                for file in trees {
                    writeln!(f, "--- File: {} ---", file.filename)?;
                    render_records(f, flatten_tree(&file.tree,),)?;
                }
                Ok((),)
            },
            AnalysisReport::Comparison(result,) => render_comparison(f, result,),
            AnalysisReport::Aggregation(aggregation,) => render_aggregation(f, aggregation,),
            AnalysisReport::Merge(nodes,) => render_merge(f, nodes,),
            AnalysisReport::Selection(names,) | AnalysisReport::FilterableFields(names,) => {
                for name in names {
                    writeln!(f, "{}", name)?;
                }
                Ok((),)
            },
        }
    }
}
