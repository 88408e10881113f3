// 传输队列：按顺序逐个调度文件传输，同一时刻只有一个传输在进行

use crate::bridge::BridgeClient;
use crate::config::Operation;
use crate::transfer::cancel::CancelController;
use crate::transfer::executor::{Executor, InFlight, ItemResult};
use crate::transfer::list::{ListKind, TransferList, WorkItem};
use crate::transfer::manage::manage;
use crate::transfer::resolver::{bucket_error, resolve_bucket};
use crate::transfer::walk::DirWalk;
use crate::uri::FileTarget;
use crate::utils::error::TransferError;
use crate::utils::file::{classify_path, file_name_of, same_file, PathKind};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long a cancelled transfer gets to report back and release its file.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetInfo,
    ListBuckets,
    GetBucketId,
    ListFiles,
    UploadFile,
    UploadFiles,
    DownloadFile,
    DownloadFiles,
    AddBucket,
    RemoveBucket,
    RemoveFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ResolvingBucket,
    EnumeratingFiles,
    Managing,
    TransferringItem,
    Advancing,
    Done,
    Failed,
    Cancelled,
}

// bucket 解析完成后的下一阶段
const AFTER_RESOLVE: [(Command, Stage); 11] = [
    (Command::GetInfo, Stage::Managing),
    (Command::ListBuckets, Stage::Done),
    (Command::GetBucketId, Stage::Done),
    (Command::ListFiles, Stage::EnumeratingFiles),
    (Command::UploadFile, Stage::TransferringItem),
    (Command::UploadFiles, Stage::TransferringItem),
    (Command::DownloadFile, Stage::EnumeratingFiles),
    (Command::DownloadFiles, Stage::EnumeratingFiles),
    (Command::AddBucket, Stage::Managing),
    (Command::RemoveBucket, Stage::Managing),
    (Command::RemoveFile, Stage::EnumeratingFiles),
];

impl Command {
    pub fn after_resolve(self) -> Stage {
        AFTER_RESOLVE
            .iter()
            .find(|(command, _)| *command == self)
            .map(|(_, stage)| *stage)
            .unwrap_or(Stage::Failed)
    }
}

/// 1-based position in the work list; `total == 0` is single-item mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done(BatchReport),
    Cancelled,
}

/// State of one invocation, handed by reference to every stage.
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub command: Command,
    pub stage: Stage,
    pub bucket_name: Option<String>,
    pub bucket_id: Option<String>,
    pub target: FileTarget,
    pub local_path: Option<PathBuf>,
    /// Remote name for a single upload; the source basename when `None`.
    pub dest_name: Option<String>,
    /// Remote file picked by `remove-file`.
    pub file_id: Option<String>,
    pub cursor: Cursor,
    pub pending: Option<WorkItem>,
    pub live_handle: Option<crate::bridge::TransferId>,
    pub report: BatchReport,
}

impl TransferContext {
    fn new(command: Command, bucket_name: Option<String>) -> Self {
        Self {
            command,
            stage: Stage::Idle,
            bucket_name,
            bucket_id: None,
            target: FileTarget::Unspecified,
            local_path: None,
            dest_name: None,
            file_id: None,
            cursor: Cursor::default(),
            pending: None,
            live_handle: None,
            report: BatchReport::default(),
        }
    }

    /// Classifies local paths and picks the command for `operation`.
    pub fn plan(operation: &Operation) -> Result<Self, TransferError> {
        match operation {
            Operation::GetInfo => Ok(Self::new(Command::GetInfo, None)),
            Operation::ListBuckets => Ok(Self::new(Command::ListBuckets, None)),
            Operation::GetBucketId { bucket } => {
                Ok(Self::new(Command::GetBucketId, Some(bucket.clone())))
            }
            Operation::ListFiles { bucket } => Ok(Self::new(Command::ListFiles, Some(bucket.clone()))),
            Operation::AddBucket { name } => Ok(Self::new(Command::AddBucket, Some(name.clone()))),
            Operation::RemoveBucket { bucket } => {
                Ok(Self::new(Command::RemoveBucket, Some(bucket.clone())))
            }
            Operation::RemoveFile { bucket, file } => {
                let mut ctx = Self::new(Command::RemoveFile, Some(bucket.clone()));
                ctx.target = FileTarget::Named(file.clone());
                Ok(ctx)
            }
            Operation::Upload {
                bucket,
                source,
                requested_name,
                recursive,
            } => Self::plan_upload(bucket, source, requested_name.as_deref(), *recursive),
            Operation::Download {
                bucket,
                target,
                dest,
            } => Self::plan_download(bucket, target, dest.as_deref()),
        }
    }

    fn plan_upload(
        bucket: &str,
        source: &Path,
        requested_name: Option<&str>,
        recursive: bool,
    ) -> Result<Self, TransferError> {
        match classify_path(source) {
            PathKind::RegularFile => {
                let mut ctx = Self::new(Command::UploadFile, Some(bucket.to_string()));
                let source_name = file_name_of(&source.to_string_lossy()).to_string();
                if let Some(requested) = requested_name {
                    if requested != source_name {
                        println!(
                            "Uploading as '{}': the remote name must match the source file name",
                            source_name
                        );
                    }
                }
                ctx.dest_name = Some(source_name);
                ctx.local_path = Some(source.to_path_buf());
                ctx.pending = Some(WorkItem::Upload {
                    local_path: source.to_path_buf(),
                });
                Ok(ctx)
            }
            PathKind::Directory => {
                if !recursive {
                    return Err(TransferError::DirectoryNotAllowed);
                }
                if let Some(name) = requested_name {
                    return Err(TransferError::InvalidUri {
                        uri: format!("storj://{}/{}", bucket, name),
                    });
                }
                let mut ctx = Self::new(Command::UploadFiles, Some(bucket.to_string()));
                ctx.local_path = Some(source.to_path_buf());
                Ok(ctx)
            }
            PathKind::NotFound | PathKind::Other => Err(TransferError::InvalidSource {
                path: source.to_path_buf(),
            }),
        }
    }

    fn plan_download(
        bucket: &str,
        target: &FileTarget,
        dest: Option<&Path>,
    ) -> Result<Self, TransferError> {
        match target {
            FileTarget::Named(name) => {
                let mut ctx = Self::new(Command::DownloadFile, Some(bucket.to_string()));
                ctx.target = FileTarget::Named(name.clone());
                ctx.local_path = dest.map(Path::to_path_buf);
                Ok(ctx)
            }
            FileTarget::All | FileTarget::Unspecified => {
                let dir = dest.unwrap_or(Path::new("."));
                if classify_path(dir) != PathKind::Directory {
                    return Err(TransferError::NotADirectory {
                        path: dir.to_path_buf(),
                    });
                }
                let mut ctx = Self::new(Command::DownloadFiles, Some(bucket.to_string()));
                ctx.target = FileTarget::All;
                ctx.local_path = Some(dir.to_path_buf());
                Ok(ctx)
            }
        }
    }

    pub fn is_batch(&self) -> bool {
        self.cursor.total > 0
    }
}

pub struct QueueManager<'a> {
    bridge: &'a dyn BridgeClient,
    executor: Executor<'a>,
    list_dir: PathBuf,
    cancel: CancellationToken,
    list: Option<TransferList>,
}

impl<'a> QueueManager<'a> {
    pub fn new(
        bridge: &'a dyn BridgeClient,
        executor: Executor<'a>,
        list_dir: impl Into<PathBuf>,
        cancel: &CancelController,
    ) -> Self {
        Self {
            bridge,
            executor,
            list_dir: list_dir.into(),
            cancel: cancel.token(),
            list: None,
        }
    }

    /// Drives `ctx` until it is done, cancelled or failed. The transfer list,
    /// if one was created, is removed on every way out.
    pub async fn run(&mut self, ctx: &mut TransferContext) -> Result<Outcome, TransferError> {
        loop {
            let next = match self.step(ctx).await {
                Ok(next) => next,
                Err(err) => {
                    debug!("{:?} -> Failed: {}", ctx.stage, err);
                    ctx.stage = Stage::Failed;
                    self.discard_list();
                    return Err(err);
                }
            };
            debug!("{:?} -> {:?}", ctx.stage, next);
            ctx.stage = next;

            match next {
                Stage::Done => {
                    self.discard_list();
                    return Ok(Outcome::Done(ctx.report));
                }
                Stage::Cancelled => {
                    self.discard_list();
                    return Ok(Outcome::Cancelled);
                }
                Stage::Failed => {
                    self.discard_list();
                    return Err(TransferError::TransferFailed {
                        message: format!("no stage follows {:?}", ctx.command),
                    });
                }
                _ => {}
            }
        }
    }

    async fn step(&mut self, ctx: &mut TransferContext) -> Result<Stage, TransferError> {
        match ctx.stage {
            Stage::Idle => self.start(ctx),
            Stage::ResolvingBucket => resolve_bucket(self.bridge, ctx).await,
            Stage::EnumeratingFiles => self.enumerate(ctx).await,
            Stage::Managing => manage(self.bridge, ctx).await,
            Stage::TransferringItem => self.transfer(ctx).await,
            Stage::Advancing => Ok(self.advance(ctx)),
            Stage::Done | Stage::Failed | Stage::Cancelled => Ok(ctx.stage),
        }
    }

    fn start(&mut self, ctx: &mut TransferContext) -> Result<Stage, TransferError> {
        if ctx.command == Command::UploadFiles {
            let root = ctx.local_path.clone().ok_or(TransferError::InvalidSource {
                path: PathBuf::new(),
            })?;
            let total = self.build_upload_list(&root)?;
            if total == 0 {
                println!("No files to upload in {}", root.display());
                return Ok(Stage::Done);
            }
            ctx.cursor = Cursor { current: 0, total };
        }

        // 这两个命令不需要先解析 bucket
        let unresolved = matches!(ctx.command, Command::GetInfo | Command::AddBucket);
        if unresolved || ctx.bucket_id.is_some() {
            Ok(ctx.command.after_resolve())
        } else {
            Ok(Stage::ResolvingBucket)
        }
    }

    fn build_upload_list(&mut self, root: &Path) -> Result<usize, TransferError> {
        let mut list = TransferList::new(&self.list_dir, ListKind::Upload);
        let mut walk = DirWalk::new(root).map_err(|e| TransferError::list_io(list.path(), e))?;
        // 列表文件可能就在上传目录里，不能把它当作待上传文件
        if let Ok(dir) = std::fs::canonicalize(&self.list_dir) {
            walk = walk.skipping(dir.join(ListKind::Upload.file_name()));
        }
        let total = list.write_results(walk.map(|path| path.map(|local_path| WorkItem::Upload { local_path })))?;
        info!("{} files queued for upload in {}", total, list.path().display());
        self.list = Some(list);
        Ok(total)
    }

    async fn enumerate(&mut self, ctx: &mut TransferContext) -> Result<Stage, TransferError> {
        let bucket_id = ctx.bucket_id.clone().unwrap_or_default();
        let files = self
            .bridge
            .list_files(&bucket_id)
            .await
            .map_err(|e| bucket_error(e, &bucket_id))?;

        match ctx.command {
            Command::ListFiles => {
                if files.is_empty() {
                    println!("No files for bucket.");
                }
                for file in &files {
                    println!(
                        "ID: {} \tSize: {} bytes \tDecrypted: {} \tType: {} \tCreated: {} \tName: {}",
                        file.id, file.size, file.decrypted, file.mimetype, file.created, file.filename
                    );
                }
                // 清理之前运行遗留的下载列表
                TransferList::new(&self.list_dir, ListKind::Download).delete()?;
                Ok(Stage::Done)
            }
            Command::RemoveFile => {
                let FileTarget::Named(name) = &ctx.target else {
                    return Err(TransferError::InvalidUri {
                        uri: format!("storj://{}", bucket_id),
                    });
                };
                let file = files
                    .into_iter()
                    .find(|file| &file.filename == name)
                    .ok_or_else(|| TransferError::FileNotFound { name: name.clone() })?;
                ctx.file_id = Some(file.id);
                Ok(Stage::Managing)
            }
            Command::DownloadFile => {
                let FileTarget::Named(name) = &ctx.target else {
                    return Err(TransferError::InvalidUri {
                        uri: format!("storj://{}", bucket_id),
                    });
                };
                let file = files
                    .into_iter()
                    .find(|file| &file.filename == name)
                    .ok_or_else(|| TransferError::FileNotFound { name: name.clone() })?;
                ctx.pending = Some(WorkItem::Download {
                    remote_id: file.id,
                    remote_name: file.filename,
                });
                Ok(Stage::TransferringItem)
            }
            Command::DownloadFiles => {
                let mut list = TransferList::new(&self.list_dir, ListKind::Download);
                let total = list.write(files.into_iter().map(|file| WorkItem::Download {
                    remote_id: file.id,
                    remote_name: file.filename,
                }))?;
                self.list = Some(list);
                if total == 0 {
                    println!("No files for bucket.");
                    return Ok(Stage::Done);
                }
                ctx.cursor = Cursor { current: 0, total };
                Ok(Stage::TransferringItem)
            }
            _ => Ok(ctx.command.after_resolve()),
        }
    }

    // 批量模式下从列表读取下一项
    fn dequeue(&mut self, ctx: &mut TransferContext) -> Result<WorkItem, TransferError> {
        if !ctx.is_batch() {
            return ctx.pending.clone().ok_or_else(|| TransferError::TransferFailed {
                message: "nothing queued".to_string(),
            });
        }

        let list = self.list.as_mut().ok_or_else(|| TransferError::TransferFailed {
            message: "transfer list missing".to_string(),
        })?;
        let item = list.read_next(ctx.cursor.current)?.ok_or_else(|| {
            TransferError::list_io(
                list.path(),
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {} entries", ctx.cursor.total),
                ),
            )
        })?;
        ctx.cursor.current += 1;
        ctx.pending = Some(item.clone());
        Ok(item)
    }

    async fn transfer(&mut self, ctx: &mut TransferContext) -> Result<Stage, TransferError> {
        if self.cancel.is_cancelled() {
            return Ok(Stage::Cancelled);
        }

        let item = self.dequeue(ctx)?;
        let bucket_id = ctx.bucket_id.clone().unwrap_or_default();
        if ctx.is_batch() {
            let shown = match &item {
                WorkItem::Upload { local_path } => local_path.display().to_string(),
                WorkItem::Download { remote_name, .. } => remote_name.clone(),
            };
            println!("[{}/{}] transferring {}", ctx.cursor.current, ctx.cursor.total, shown);
        }

        if let Err(err) = self.check_list_conflict(ctx, &item) {
            return self.item_failed(ctx, err);
        }

        let dispatched = match &item {
            WorkItem::Upload { local_path } => {
                let dest_name = if ctx.is_batch() { None } else { ctx.dest_name.clone() };
                self.executor
                    .run_upload(ctx, &bucket_id, local_path, dest_name.as_deref())
                    .await
            }
            WorkItem::Download {
                remote_id,
                remote_name,
            } => {
                let dest = ctx.local_path.clone();
                self.executor
                    .run_download(ctx, &bucket_id, remote_id, remote_name, dest.as_deref())
                    .await
            }
        };

        let in_flight = match dispatched {
            Ok(in_flight) => in_flight,
            Err(err) => return self.item_failed(ctx, err),
        };
        self.complete(ctx, in_flight).await
    }

    // 下载目标不能是当前正在读取的列表文件
    fn check_list_conflict(&self, ctx: &TransferContext, item: &WorkItem) -> Result<(), TransferError> {
        let (Some(list), WorkItem::Download { remote_name, .. }) = (&self.list, item) else {
            return Ok(());
        };
        let target = Executor::download_target(ctx.local_path.as_deref(), remote_name)?;
        match target {
            Some(target) if same_file(&target, list.path()) => Err(TransferError::ListFileConflict { path: target }),
            _ => Ok(()),
        }
    }

    async fn complete(&mut self, ctx: &mut TransferContext, mut in_flight: InFlight) -> Result<Stage, TransferError> {
        let result = tokio::select! {
            result = in_flight.wait() => Some(result),
            _ = self.cancel.cancelled() => None,
        };

        let Some(result) = result else {
            info!("canceling transfer of {}", in_flight.label());
            self.bridge.cancel(in_flight.control());
            let result = match tokio::time::timeout(CANCEL_GRACE, in_flight.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("transfer {} did not stop in time", in_flight.control().id());
                    Err(crate::bridge::BridgeError::Cancelled)
                }
            };
            let _ = self.executor.finish(ctx, in_flight, result);
            return Ok(Stage::Cancelled);
        };

        match self.executor.finish(ctx, in_flight, result) {
            Ok(ItemResult::Uploaded(_)) | Ok(ItemResult::Downloaded) => {
                ctx.report.succeeded += 1;
                Ok(Stage::Advancing)
            }
            Err(err) => self.item_failed(ctx, err),
        }
    }

    // 批量时单个失败不影响后续文件
    fn item_failed(&mut self, ctx: &mut TransferContext, err: TransferError) -> Result<Stage, TransferError> {
        ctx.pending = None;
        if !ctx.is_batch() {
            return Err(err);
        }
        eprintln!(
            "[{}/{}] {}",
            ctx.cursor.current, ctx.cursor.total, err
        );
        ctx.report.failed += 1;
        Ok(Stage::Advancing)
    }

    fn advance(&mut self, ctx: &mut TransferContext) -> Stage {
        if ctx.is_batch() && ctx.cursor.current < ctx.cursor.total {
            return Stage::TransferringItem;
        }
        if ctx.is_batch() {
            println!(
                "Done: {} transferred, {} failed",
                ctx.report.succeeded, ctx.report.failed
            );
        }
        Stage::Done
    }

    fn discard_list(&mut self) {
        if let Some(mut list) = self.list.take() {
            if let Err(e) = list.delete() {
                warn!("could not remove {}: {}", list.path().display(), e);
            }
        }
    }
}
