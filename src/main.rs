use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use fieldscope::analysis::aggregator::aggregate;
use fieldscope::analysis::comparator::compare_fields;
use fieldscope::analysis::filter::{FilterCondition, filterable_fields, search_fields, select_files};
use fieldscope::analysis::merger::merge_fields;
use fieldscope::analysis::tree::build_tree;
use fieldscope::analysis_result::{AnalysisReport, FileTree};
use fieldscope::config::load_config;
use fieldscope::field::FileFieldSet;
use fieldscope::file_reader::{FileReaderOptions, read_inputs};
use fieldscope::output::OutputFormat;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug,)]
#[command(
    author,
    version,
    about = "Extracts the fields of XML documents and compares, aggregates and merges them \
             across files.",
    long_about = "
    Reduces every XML document to a flat list of fields (one per element name and nesting \
                  depth) and analyses those fields across files: which fields all files \
                  share, which are unique to one file, where the same field sits at different \
                  paths, how often each field and value occurs, and what the superset \
                  structure of all files looks like.

    Examples:
        # Compare two invoices
        fieldscope compare a.xml b.xml

        # Value statistics for every XML file under a directory, as JSON
        fieldscope aggregate invoices/ --recursive --format json

        # Merged structure of the files whose Status starts with OPEN
        fieldscope merge invoices/ --filter 'Status=OPEN*'

        # Ignore the ns: prefix when comparing
        fieldscope compare a.xml b.xml --strip-prefix ns:
    "
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug,)]
enum Command {
    /// Print the extracted field records of each file
    Extract(InputArgs,),
    /// Print each file's fields as a tree
    Tree(InputArgs,),
    /// Common, unique and structurally displaced fields across files
    Compare(InputArgs,),
    /// Presence, occurrence and value statistics per field name and path
    Aggregate(InputArgs,),
    /// One merged structure with per-file presence
    Merge(InputArgs,),
    /// List the files matching the filter conditions
    Select(InputArgs,),
    /// List the field names that carry values and can be filtered on
    Fields(InputArgs,),
}

#[derive(Args, Debug, Clone,)]
struct InputArgs {
    /// XML files or directories containing XML files
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf,>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Path to write the output to instead of stdout
    #[arg(long, value_name = "PATH")]
    output_path: Option<PathBuf,>,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,

    /// Literal prefix removed from every element name, e.g. "ns:"
    #[arg(long, value_name = "PREFIX")]
    strip_prefix: Option<String,>,

    /// Configuration file (defaults to .fieldscope.toml in the current directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf,>,

    /// Only analyse files where FIELD has a value matching PATTERN ('*' is a wildcard)
    #[arg(long = "filter", value_name = "FIELD=PATTERN", value_parser = parse_filter)]
    filters: Vec<(String, String,),>,

    /// Match --filter patterns case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Keep only fields whose name or path contains TERM (extract and tree)
    #[arg(long, value_name = "TERM")]
    search: Option<String,>,
}

impl Command {
    fn inputs(&self,) -> &InputArgs {
        match self {
            Command::Extract(args,)
            | Command::Tree(args,)
            | Command::Compare(args,)
            | Command::Aggregate(args,)
            | Command::Merge(args,)
            | Command::Select(args,)
            | Command::Fields(args,) => args,
        }
    }
}

fn parse_filter(raw: &str,) -> Result<(String, String,), String,> {
    match raw.split_once('=',) {
        Some((field, pattern,),) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), pattern.to_string(),),)
        },
        _ => Err(format!("expected FIELD=PATTERN, got {raw:?}"),),
    }
}

fn write_output(
    formatted_output: &str,
    output_path: Option<&Path,>,
) -> Result<(), Box<dyn std::error::Error,>,> {
    if let Some(path,) = output_path {
        let mut file = std::fs::File::create(path,).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to create output file {}: {}", path.display(), e),
            ),) as Box<dyn std::error::Error,>
        },)?;
        writeln!(file, "{}", formatted_output).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to write to output file {}: {}", path.display(), e),
            ),) as Box<dyn std::error::Error,>
        },)?;
        info!("Wrote {}", path.display());
    } else {
        println!("{}", formatted_output);
    }
    Ok((),)
}

fn narrow(files: Vec<FileFieldSet,>, search: Option<&str,>,) -> Vec<FileFieldSet,> {
    match search {
        Some(term,) => files
            .into_iter()
            .map(|f| FileFieldSet::new(f.filename.clone(), search_fields(&f.fields, term,),),)
            .collect(),
        None => files,
    }
}

fn run_command(command: &Command, files: Vec<FileFieldSet,>,) -> AnalysisReport {
    let search = command.inputs().search.as_deref();
    match command {
        Command::Extract(_,) => AnalysisReport::Fields(narrow(files, search,),),
        Command::Tree(_,) => AnalysisReport::Trees(
            narrow(files, search,)
                .into_iter()
                .map(|f| FileTree {
                    filename: f.filename,
                    tree:     build_tree(f.fields,),
                },)
                .collect(),
        ),
        Command::Compare(_,) => AnalysisReport::Comparison(Box::new(compare_fields(&files,),),),
        Command::Aggregate(_,) => AnalysisReport::Aggregation(aggregate(&files,),),
        Command::Merge(_,) => AnalysisReport::Merge(merge_fields(&files,),),
        Command::Select(_,) => {
            AnalysisReport::Selection(files.into_iter().map(|f| f.filename,).collect(),)
        },
        Command::Fields(_,) => AnalysisReport::FilterableFields(filterable_fields(&files,),),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error,>,> {
    let file_appender = tracing_appender::rolling::never(".", "fieldscope.log",);
    let (non_blocking, _guard,) = tracing_appender::non_blocking(file_appender,);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),),)
        .with(fmt::layer().with_writer(std::io::stderr,),)
        .with(fmt::layer().with_writer(non_blocking,).with_ansi(false,),)
        .init();

    if std::env::args().len() == 1 {
        Cli::command().print_help().map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Error printing help: {}", e),
            ),) as Box<dyn std::error::Error,>
        },)?;
        return Ok((),);
    }

    let cli = Cli::parse();
    let args = cli.command.inputs().clone();

    let current_dir = std::env::current_dir()?;
    let config = load_config(args.config.as_deref(), &current_dir,)?;

    let mut options = FileReaderOptions::from_config(&config,);
    options.recursive |= args.recursive;
    if args.strip_prefix.is_some() {
        options.strip_prefix = args.strip_prefix.clone();
    }

    let mut conditions = config.filters.clone();
    conditions.extend(
        args.filters
            .iter()
            .map(|(field, pattern,)| FilterCondition::new(field, pattern, args.case_sensitive,),),
    );

    // Infer output format from output_path extension if --format is not explicitly set
    let determined_output_format = if args.output_path.is_some() && args.format == OutputFormat::Text
    {
        args.output_path
            .as_ref()
            .and_then(|path| OutputFormat::from_extension(path,),)
            .unwrap_or(OutputFormat::Text,)
    } else {
        args.format
    };

    let report = read_inputs(&args.paths, options,).await;
    if !report.failures.is_empty() {
        warn!(
            "{} of {} files could not be loaded",
            report.failures.len(),
            report.failures.len() + report.files.len()
        );
    }
    if report.files.is_empty() {
        if let Some((path, error,),) = report.failures.into_iter().next() {
            return Err(format!("no file could be loaded; {}: {}", path.display(), error).into(),);
        }
        warn!("no XML files found");
    }

    let selected = select_files(&report.files, &conditions,);
    if selected.len() != report.files.len() {
        info!("{} of {} files match the filters", selected.len(), report.files.len());
    }

    let result = run_command(&cli.command, selected,);
    let formatted_output = result.to_string_formatted(determined_output_format,);
    write_output(&formatted_output, args.output_path.as_deref(),)?;
    Ok((),)
}
