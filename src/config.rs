// 配置管理
use crate::bridge::UploadOptions;
use crate::cli::{Cli, Commands};
use crate::uri::{FileTarget, StorjUri};
use crate::utils::error::TransferError;
use anyhow::{Context, Result};
use dialoguer::Confirm;
use log::LevelFilter;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone)]
pub struct Config {
    pub bridge_root: PathBuf,
    pub log_level: u8,
    pub list_dir: PathBuf,
    pub upload_options: UploadOptions,
    pub assume_yes: bool,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    GetInfo,
    ListBuckets,
    GetBucketId {
        bucket: String,
    },
    ListFiles {
        bucket: String,
    },
    AddBucket {
        name: String,
    },
    RemoveBucket {
        bucket: String,
    },
    RemoveFile {
        bucket: String,
        file: String,
    },
    Upload {
        bucket: String,
        source: PathBuf,
        /// Name asked for in a `storj://bucket/name` destination.
        requested_name: Option<String>,
        recursive: bool,
    },
    Download {
        bucket: String,
        target: FileTarget,
        /// `None` writes a single file to stdout.
        dest: Option<PathBuf>,
    },
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let operation = Self::operation_from(&cli.command)?;
        let bridge_root = Self::bridge_root(cli.url.as_deref())?;
        let list_dir = match &cli.list_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Cannot determine current directory")?,
        };

        Ok(Config {
            bridge_root,
            log_level: if cli.debug { 4 } else { cli.log_level },
            list_dir,
            upload_options: UploadOptions {
                prepare_frame_limit: cli.prepare_frame_limit,
                push_frame_limit: cli.push_frame_limit,
                push_shard_limit: cli.push_shard_limit,
                use_erasure_coding: cli.reed_solomon != "false",
            },
            assume_yes: cli.yes,
            operation,
        })
    }

    pub fn show_progress(&self) -> bool {
        self.log_level == 0
    }

    fn operation_from(command: &Commands) -> Result<Operation> {
        let operation = match command {
            Commands::UploadFile { bucket, path } => Operation::Upload {
                bucket: bucket.clone(),
                source: path.clone(),
                requested_name: None,
                recursive: true,
            },
            Commands::UploadFiles { bucket, dir } => Operation::Upload {
                bucket: bucket.clone(),
                source: dir.clone(),
                requested_name: None,
                recursive: true,
            },
            Commands::DownloadFile { bucket, file, path } => Operation::Download {
                bucket: bucket.clone(),
                target: if file == "*" {
                    FileTarget::All
                } else {
                    FileTarget::Named(file.clone())
                },
                dest: path.clone(),
            },
            Commands::DownloadFiles { bucket, dir } => Operation::Download {
                bucket: bucket.clone(),
                target: FileTarget::All,
                dest: Some(dir.clone()),
            },
            Commands::Cp {
                recursive,
                src,
                dst,
            } => Self::copy_operation(src, dst, *recursive)?,
            Commands::ListFiles { bucket } => Operation::ListFiles {
                bucket: bucket.clone(),
            },
            Commands::ListBuckets { bucket: None } => Operation::ListBuckets,
            Commands::ListBuckets {
                bucket: Some(bucket),
            } => Operation::ListFiles {
                bucket: bucket.clone(),
            },
            Commands::GetBucketId { bucket } => Operation::GetBucketId {
                bucket: bucket.clone(),
            },
            Commands::AddBucket { name } => Operation::AddBucket { name: name.clone() },
            Commands::RemoveBucket { bucket } => Operation::RemoveBucket {
                bucket: bucket.clone(),
            },
            Commands::RemoveFile { bucket, file } => Operation::RemoveFile {
                bucket: bucket.clone(),
                file: file.clone(),
            },
            Commands::GetInfo => Operation::GetInfo,
        };
        Ok(operation)
    }

    // 根据哪一侧带 storj:// 判断上传还是下载
    fn copy_operation(src: &str, dst: &str, recursive: bool) -> Result<Operation, TransferError> {
        if StorjUri::is_storj(dst) {
            let uri = StorjUri::parse(dst)?;
            let requested_name = match uri.file {
                FileTarget::Named(name) => Some(name),
                FileTarget::All => Some("*".to_string()),
                FileTarget::Unspecified => None,
            };
            Ok(Operation::Upload {
                bucket: uri.bucket,
                source: PathBuf::from(src),
                requested_name,
                recursive,
            })
        } else if StorjUri::is_storj(src) {
            let uri = StorjUri::parse(src)?;
            let target = match uri.file {
                FileTarget::Unspecified => FileTarget::All,
                other => other,
            };
            Ok(Operation::Download {
                bucket: uri.bucket,
                target,
                dest: Some(PathBuf::from(dst)),
            })
        } else {
            Err(TransferError::InvalidUri {
                uri: dst.to_string(),
            })
        }
    }

    fn bridge_root(url: Option<&str>) -> Result<PathBuf> {
        match url {
            Some(url) => {
                let path = url.strip_prefix(FILE_SCHEME).ok_or_else(|| TransferError::Config {
                    message: format!("unsupported bridge url '{}', expected {}<dir>", url, FILE_SCHEME),
                })?;
                if path.is_empty() {
                    return Err(TransferError::Config {
                        message: format!("bridge url '{}' has no directory", url),
                    }
                    .into());
                }
                Ok(PathBuf::from(path))
            }
            None => {
                let home = home::home_dir().context("Cannot determine home directory")?;
                Ok(home.join(".storj").join("local-bridge"))
            }
        }
    }
}

pub fn level_filter(log_level: u8) -> LevelFilter {
    match log_level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Asks whether an existing local file may be replaced.
pub trait OverwritePrompt {
    fn confirm_overwrite(&self, path: &Path) -> Result<bool, TransferError>;
}

pub struct ConsolePrompt;

impl OverwritePrompt for ConsolePrompt {
    fn confirm_overwrite(&self, path: &Path) -> Result<bool, TransferError> {
        println!("Warning: File already exists at path [{}].", path.display());
        Confirm::new()
            .with_prompt(format!("Would you like to overwrite [{}]?", path.display()))
            .default(false)
            .interact()
            .map_err(|e| TransferError::Prompt(e.to_string()))
    }
}

/// Answers every prompt with the same fixed answer.
pub struct FixedAnswer(pub bool);

impl OverwritePrompt for FixedAnswer {
    fn confirm_overwrite(&self, _path: &Path) -> Result<bool, TransferError> {
        Ok(self.0)
    }
}
