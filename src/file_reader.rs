use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::analysis::extractor::{ExtractOptions, extract_fields_with};
use crate::config::AnalysisConfig;
use crate::error::FieldScopeError;
use crate::field::FileFieldSet;
use crate::reader::charset::get_decoded_reader;
use crate::reader::xml_reader::parse_xml_reader;

#[derive(Debug, Clone, Default, PartialEq,)]
pub struct FileReaderOptions {
    pub recursive:    bool,
    pub strip_prefix: Option<String,>,
    pub extract:      ExtractOptions,
}

impl FileReaderOptions {
    pub fn from_config(config: &AnalysisConfig,) -> Self {
        Self {
            recursive:    config.recursive,
            strip_prefix: config.strip_prefix.clone(),
            extract:      config.extract_options(),
        }
    }
}

/// Files loaded from one set of inputs, with the ones that could not be read or parsed.
#[derive(Debug, Default,)]
pub struct LoadReport {
    pub files:    Vec<FileFieldSet,>,
    pub failures: Vec<(PathBuf, FieldScopeError,),>,
}

pub fn is_xml_file(path: &Path,) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str(),)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml",),)
}

/// Reads, parses and extracts one XML file. The file set is named after `file_path` as given.
pub fn read_xml_file(
    file_path: &Path,
    options: &FileReaderOptions,
) -> Result<FileFieldSet, FieldScopeError,> {
    let metadata = std::fs::metadata(file_path,).map_err(|e| FieldScopeError::FileReadError {
        path:   file_path.to_path_buf(),
        source: e,
    },)?;
    if metadata.is_dir() {
        return Err(FieldScopeError::IsADirectory {
            path: file_path.to_path_buf(),
        },);
    }

    let file = File::open(file_path,).map_err(|e| FieldScopeError::FileReadError {
        path:   file_path.to_path_buf(),
        source: e,
    },)?;
    let decoder = get_decoded_reader(file,).map_err(|e| FieldScopeError::FileReadError {
        path:   file_path.to_path_buf(),
        source: e,
    },)?;
    let root = parse_xml_reader(BufReader::new(decoder,), file_path,)?;

    let fields = extract_fields_with(&root, options.extract,);
    debug!("{}: {} fields", file_path.display(), fields.len());
    let set = FileFieldSet::new(file_path.display().to_string(), fields,);
    Ok(match options.strip_prefix.as_deref() {
        Some(prefix,) => set.strip_prefix(prefix,),
        None => set,
    },)
}

/// Expands `inputs` into the XML files to load. Files are kept as given; directories
/// contribute their non-hidden `.xml` files in name order. An input that cannot be inspected
/// or walked is returned as a failure instead of stopping the others.
pub fn collect_xml_paths(
    inputs: &[PathBuf],
    recursive: bool,
) -> (Vec<PathBuf,>, Vec<(PathBuf, FieldScopeError,),>,) {
    let mut paths = Vec::new();
    let mut failures = Vec::new();
    for input in inputs {
        let metadata = match std::fs::metadata(input,) {
            Ok(metadata,) => metadata,
            Err(e,) => {
                failures.push((
                    input.clone(),
                    FieldScopeError::FileReadError {
                        path:   input.clone(),
                        source: e,
                    },
                ),);
                continue;
            },
        };
        if !metadata.is_dir() {
            paths.push(input.clone(),);
            continue;
        }

        let walker = if recursive {
            WalkDir::new(input,)
        } else {
            WalkDir::new(input,).max_depth(1,)
        };
        for entry in walker.sort_by_file_name() {
            let entry = match entry {
                Ok(entry,) => entry,
                Err(e,) => {
                    let path = e.path().map_or_else(|| input.clone(), Path::to_path_buf,);
                    failures.push((
                        path,
                        FieldScopeError::InternalError(format!("Error walking directory: {}", e),),
                    ),);
                    continue;
                },
            };
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.',) {
                continue;
            }
            if is_xml_file(path,) {
                paths.push(path.to_path_buf(),);
            }
        }
    }
    (paths, failures,)
}

/// Loads every XML file named by `inputs`, one blocking task per file.
///
/// A file that fails to read or parse is logged and reported in
/// [`LoadReport::failures`]; the remaining files are still loaded, in input order. Missing
/// inputs are reported first.
pub async fn read_inputs(inputs: &[PathBuf], options: FileReaderOptions,) -> LoadReport {
    let (paths, failures,) = collect_xml_paths(inputs, options.recursive,);
    for (path, e,) in &failures {
        error!("Error reading input {}: {}", path.display(), e);
    }
    info!("loading {} XML files", paths.len());

    let handles: Vec<_,> = paths
        .into_iter()
        .map(|path| {
            let task_options = options.clone();
            let task_path = path.clone();
            let handle =
                tokio::task::spawn_blocking(move || read_xml_file(&task_path, &task_options,),);
            (path, handle,)
        },)
        .collect();

    let mut report = LoadReport {
        files: Vec::new(),
        failures,
    };
    for (path, handle,) in handles {
        match handle.await {
            Ok(Ok(set,),) => report.files.push(set,),
            Ok(Err(e,),) => {
                error!("Error reading file {}: {}", path.display(), e);
                report.failures.push((path, e,),);
            },
            Err(join_error,) => {
                error!("Extraction task for {} failed: {}", path.display(), join_error);
                report.failures.push((
                    path,
                    FieldScopeError::InternalError(format!("extraction task failed: {join_error}"),),
                ),);
            },
        }
    }
    report
}
