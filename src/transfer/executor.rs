// 单个文件的上传/下载
use crate::bridge::{
    BridgeClient, BridgeError, DestWriter, FileMeta, StoreRequest, TransferControl,
    TransferHandle, UploadOptions,
};
use crate::config::OverwritePrompt;
use crate::transfer::progress::ProgressTracker;
use crate::transfer::queue::TransferContext;
use crate::utils::error::TransferError;
use crate::utils::file::{ensure_parent_dir, file_name_of};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// What a finished transfer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Uploaded(FileMeta),
    Downloaded,
}

enum Handle {
    Upload(TransferHandle<FileMeta>),
    Download(TransferHandle<()>),
}

/// A dispatched transfer whose completion has not been processed yet.
pub struct InFlight {
    handle: Handle,
    progress: ProgressTracker,
    label: String,
    to_stdout: bool,
}

impl InFlight {
    pub fn control(&self) -> &TransferControl {
        match &self.handle {
            Handle::Upload(handle) => handle.control(),
            Handle::Download(handle) => handle.control(),
        }
    }

    /// Cancel-safe wait for the bridge result.
    pub async fn wait(&mut self) -> Result<ItemResult, BridgeError> {
        match &mut self.handle {
            Handle::Upload(handle) => handle.wait().await.map(ItemResult::Uploaded),
            Handle::Download(handle) => handle.wait().await.map(|_| ItemResult::Downloaded),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Maps a failed transfer onto the error taxonomy.
pub fn transfer_error(err: BridgeError) -> TransferError {
    match err {
        BridgeError::Decryption => TransferError::DecryptionError,
        BridgeError::Status(401) => TransferError::AuthFailed,
        other => TransferError::TransferFailed {
            message: other.to_string(),
        },
    }
}

pub struct Executor<'a> {
    bridge: &'a dyn BridgeClient,
    prompt: &'a dyn OverwritePrompt,
    options: UploadOptions,
    show_progress: bool,
}

impl<'a> Executor<'a> {
    pub fn new(
        bridge: &'a dyn BridgeClient,
        prompt: &'a dyn OverwritePrompt,
        options: UploadOptions,
        show_progress: bool,
    ) -> Self {
        Self {
            bridge,
            prompt,
            options,
            show_progress,
        }
    }

    fn tracker(&self, visible: bool, description: &str) -> ProgressTracker {
        if self.show_progress && visible {
            ProgressTracker::new(description)
        } else {
            ProgressTracker::hidden()
        }
    }

    fn mark_live(ctx: &mut TransferContext, control: &TransferControl) -> Result<(), TransferError> {
        if let Some(live) = ctx.live_handle {
            control.cancel();
            return Err(TransferError::TransferFailed {
                message: format!("transfer {} is still in flight", live),
            });
        }
        ctx.live_handle = Some(control.id());
        Ok(())
    }

    pub async fn run_upload(
        &self,
        ctx: &mut TransferContext,
        bucket_id: &str,
        local_path: &Path,
        dest_name: Option<&str>,
    ) -> Result<InFlight, TransferError> {
        let file = tokio::fs::File::open(local_path).await.map_err(|e| {
            warn!("Invalid file path: {}: {}", local_path.display(), e);
            TransferError::InvalidSource {
                path: local_path.to_path_buf(),
            }
        })?;
        let size = file.metadata().await?.len();

        let path_str = local_path.to_string_lossy();
        let file_name = dest_name.unwrap_or_else(|| file_name_of(&path_str)).to_string();
        debug!(
            "Uploading file: {} -> {} ({} bytes)",
            local_path.display(),
            file_name,
            size
        );

        let progress = self.tracker(true, &format!("Uploading {}", file_name));
        let request = StoreRequest {
            bucket_id: bucket_id.to_string(),
            file_name: file_name.clone(),
            source: Box::new(file),
            size,
            options: self.options,
        };
        let handle = self
            .bridge
            .store_file(request, progress.callback())
            .await
            .map_err(transfer_error)?;
        Self::mark_live(ctx, handle.control())?;

        Ok(InFlight {
            handle: Handle::Upload(handle),
            progress,
            label: file_name,
            to_stdout: false,
        })
    }

    /// Local file a download of `remote_name` lands in, `None` for stdout.
    pub fn download_target(dest: Option<&Path>, remote_name: &str) -> Result<Option<PathBuf>, TransferError> {
        let Some(dest) = dest else {
            return Ok(None);
        };
        if dest.is_dir() {
            // 远程文件名只取最后一段，防止写到目标目录之外
            let name = file_name_of(remote_name);
            if name.is_empty() || name == "." || name == ".." {
                return Err(TransferError::TransferFailed {
                    message: format!("cannot store remote file '{}' locally", remote_name),
                });
            }
            Ok(Some(dest.join(name)))
        } else {
            Ok(Some(dest.to_path_buf()))
        }
    }

    pub async fn run_download(
        &self,
        ctx: &mut TransferContext,
        bucket_id: &str,
        remote_id: &str,
        remote_name: &str,
        dest: Option<&Path>,
    ) -> Result<InFlight, TransferError> {
        let target = Self::download_target(dest, remote_name)?;

        let (writer, label): (DestWriter, String) = match &target {
            Some(path) => {
                if path.exists() {
                    if !self.prompt.confirm_overwrite(path)? {
                        println!("Canceled overwriting of [{}].", path.display());
                        return Err(TransferError::DestinationExists { path: path.clone() });
                    }
                    tokio::fs::remove_file(path).await?;
                }
                ensure_parent_dir(path).map_err(|e| TransferError::TransferFailed {
                    message: e.to_string(),
                })?;
                let file = tokio::fs::File::create(path).await?;
                (Box::new(file), path.display().to_string())
            }
            None => (Box::new(tokio::io::stdout()), remote_name.to_string()),
        };

        debug!("Downloading file: {} -> {}", remote_name, label);
        let progress = self.tracker(target.is_some(), &format!("Downloading {}", remote_name));
        let handle = self
            .bridge
            .resolve_file(bucket_id, remote_id, writer, progress.callback())
            .await
            .map_err(transfer_error)?;
        Self::mark_live(ctx, handle.control())?;

        Ok(InFlight {
            handle: Handle::Download(handle),
            progress,
            label,
            to_stdout: target.is_none(),
        })
    }

    /// Completion step for a dispatched transfer; runs once per handle.
    pub fn finish(
        &self,
        ctx: &mut TransferContext,
        in_flight: InFlight,
        result: Result<ItemResult, BridgeError>,
    ) -> Result<ItemResult, TransferError> {
        if ctx.live_handle == Some(in_flight.control().id()) {
            ctx.live_handle = None;
        }
        ctx.pending = None;

        match result {
            Ok(ItemResult::Uploaded(meta)) => {
                in_flight.progress.finish();
                println!("Upload Success! File ID: {}", meta.id);
                Ok(ItemResult::Uploaded(meta))
            }
            Ok(ItemResult::Downloaded) => {
                in_flight.progress.finish();
                // 输出到 stdout 时提示信息走 stderr
                if in_flight.to_stdout {
                    eprintln!("Download Success!");
                } else {
                    println!("Download Success!");
                }
                Ok(ItemResult::Downloaded)
            }
            Err(BridgeError::Cancelled) => {
                in_flight.progress.finish_with_error("canceled");
                eprintln!("Transfer of {} canceled", in_flight.label);
                Err(TransferError::TransferFailed {
                    message: BridgeError::Cancelled.to_string(),
                })
            }
            Err(err) => {
                in_flight.progress.finish_with_error(&err.to_string());
                let err = transfer_error(err);
                eprintln!("Transfer of {} failed: {}", in_flight.label, err);
                if matches!(err, TransferError::DecryptionError) {
                    eprintln!("Check that the encryption key matches the one used to upload the file.");
                }
                Err(err)
            }
        }
    }
}
