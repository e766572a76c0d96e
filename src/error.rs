use std::path::PathBuf;

#[derive(Debug, thiserror::Error,)]
pub enum FieldScopeError {
    #[error("File not found or could not be read: {path} - {source}")]
    FileReadError {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing file {path}: {source}")]
    ParseError {
        path:   PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync,>,
    },
    #[error("Invalid configuration in {path}: {message}")]
    ConfigError { path: PathBuf, message: String, },
    #[error("Internal error: {0}")]
    InternalError(String,),
    #[error("Expected an XML file but {path} is a directory")]
    IsADirectory { path: PathBuf, },
}

impl FieldScopeError {
    /// Wraps a plain message as a parse failure of `path`.
    pub fn malformed(path: impl Into<PathBuf,>, message: impl Into<String,>,) -> Self {
        FieldScopeError::ParseError {
            path:   path.into(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                message.into(),
            ),),
        }
    }
}
