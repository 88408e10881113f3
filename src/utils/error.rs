use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid URI '{uri}', try: storj://<bucket_name>/<file_name>")]
    InvalidUri { uri: String },

    #[error("Bucket not found: {name}")]
    BucketNotFound { name: String },

    #[error("Cannot create bucket [{name}]. Name already exists")]
    BucketExists { name: String },

    #[error("Bucket id [{id}] is invalid")]
    InvalidBucket { id: String },

    #[error("Invalid user credentials")]
    AuthFailed,

    #[error("File not found in bucket: {name}")]
    FileNotFound { name: String },

    #[error("Canceled overwriting of [{}]", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("Unable to properly decrypt file, please check that the correct encryption key was imported")]
    DecryptionError,

    #[error("Transfer failed: {message}")]
    TransferFailed { message: String },

    #[error("Transfer list error ({}): {source}", .path.display())]
    ListFileIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source path: {}", .path.display())]
    InvalidSource { path: PathBuf },

    #[error("Target '{}' is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Refusing to overwrite the transfer list {}", .path.display())]
    ListFileConflict { path: PathBuf },

    #[error("Directory operations not allowed without recursive flag")]
    DirectoryNotAllowed,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TransferError {
    pub fn list_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::ListFileIoError {
            path: path.into(),
            source,
        }
    }
}
