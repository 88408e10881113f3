// 命令行参数解析
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "storj")]
#[command(about = "Upload and download files to Storj bridge buckets")]
#[command(version)]
pub struct Cli {
    /// Bridge URL, e.g. file:///srv/bridge
    #[arg(short = 'u', long = "url", env = "STORJ_BRIDGE")]
    pub url: Option<String>,

    /// Log level (0-4); progress bars are only shown at level 0
    #[arg(short = 'l', long = "log", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub log_level: u8,

    /// Debug logging, same as --log 4
    #[arg(short, long)]
    pub debug: bool,

    /// Directory for the transient transfer list files
    #[arg(long, env = "STORJ_LIST_DIR")]
    pub list_dir: Option<PathBuf>,

    #[arg(long, env = "STORJ_PREPARE_FRAME_LIMIT", default_value_t = 1)]
    pub prepare_frame_limit: u32,

    #[arg(long, env = "STORJ_PUSH_FRAME_LIMIT", default_value_t = 64)]
    pub push_frame_limit: u32,

    #[arg(long, env = "STORJ_PUSH_SHARD_LIMIT", default_value_t = 64)]
    pub push_shard_limit: u32,

    /// Reed-Solomon erasure coding; any value other than "false" enables it
    #[arg(long = "reed-solomon", env = "STORJ_REED_SOLOMON", default_value = "true")]
    pub reed_solomon: String,

    /// Overwrite existing local files without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file, or every file below a directory
    UploadFile {
        bucket: String,
        path: PathBuf,
    },
    /// Upload every file below a directory
    UploadFiles {
        bucket: String,
        dir: PathBuf,
    },
    /// Download one file ("*" for all files); writes to stdout without a path
    DownloadFile {
        bucket: String,
        file: String,
        path: Option<PathBuf>,
    },
    /// Download every file of a bucket into a directory
    DownloadFiles {
        bucket: String,
        dir: PathBuf,
    },
    /// Copy between a local path and storj://<bucket>[/<file>]
    Cp {
        /// Copy directories recursively
        #[arg(short = 'r', short_alias = 'R', long)]
        recursive: bool,
        src: String,
        dst: String,
    },
    /// List the files of a bucket
    ListFiles {
        bucket: String,
    },
    /// List all buckets, or the files of one bucket
    #[command(visible_alias = "ls")]
    ListBuckets {
        bucket: Option<String>,
    },
    /// Print the id of a bucket
    GetBucketId {
        bucket: String,
    },
    /// Create a bucket
    AddBucket {
        name: String,
    },
    /// Remove a bucket and every file in it
    RemoveBucket {
        bucket: String,
    },
    /// Remove a file from a bucket
    #[command(visible_alias = "rm")]
    RemoveFile {
        bucket: String,
        file: String,
    },
    /// Show information about the bridge
    GetInfo,
}
