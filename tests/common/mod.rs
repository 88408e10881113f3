#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storj_transfer::bridge::{
    BridgeClient, BridgeError, BridgeInfo, BucketMeta, DestWriter, FileMeta, ProgressFn, StoreRequest,
    TransferHandle, UploadOptions,
};
use storj_transfer::config::{FixedAnswer, Operation};
use storj_transfer::transfer::{CancelController, Executor, Outcome, QueueManager, TransferContext};
use storj_transfer::utils::error::TransferError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub const BUCKET_ID: &str = "0123456789abcdef0123456789abcdef";

#[derive(Default)]
struct Recorder {
    dispatched: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

/// Scripted bridge: one bucket, a fixed file listing, transfers that finish
/// after a short delay unless cancelled.
pub struct MockBridge {
    buckets: Vec<BucketMeta>,
    files: Vec<FileMeta>,
    status: Option<u16>,
    fail: Vec<String>,
    cancel_at: Option<(usize, CancellationToken)>,
    delay: Duration,
    recorder: Arc<Recorder>,
}

pub fn file_meta(name: &str) -> FileMeta {
    FileMeta {
        id: format!("id-{}", name),
        filename: name.to_string(),
        size: name.len() as u64,
        mimetype: "text/plain".to_string(),
        created: "2026-01-01T00:00:00+00:00".to_string(),
        decrypted: true,
    }
}

impl MockBridge {
    pub fn new(bucket: &str) -> Self {
        Self {
            buckets: vec![BucketMeta {
                id: BUCKET_ID.to_string(),
                name: bucket.to_string(),
                created: "2026-01-01T00:00:00+00:00".to_string(),
                decrypted: true,
            }],
            files: Vec::new(),
            status: None,
            fail: Vec::new(),
            cancel_at: None,
            delay: Duration::from_millis(5),
            recorder: Arc::default(),
        }
    }

    pub fn with_files(mut self, names: &[&str]) -> Self {
        self.files = names.iter().map(|name| file_meta(name)).collect();
        self
    }

    /// Every bucket-level call fails with `status`.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.fail.push(name.to_string());
        self
    }

    /// Cancels `token` while the `k`-th transfer (1-based) is in flight.
    pub fn cancel_at(mut self, k: usize, token: CancellationToken) -> Self {
        self.cancel_at = Some((k, token));
        self
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.recorder.dispatched.lock().unwrap().clone()
    }

    /// Ids passed to `delete_bucket` and `delete_file`, in call order.
    pub fn removed(&self) -> Vec<String> {
        self.recorder.removed.lock().unwrap().clone()
    }

    pub fn max_live(&self) -> usize {
        self.recorder.max_live.load(Ordering::SeqCst)
    }

    fn check_status(&self) -> Result<(), BridgeError> {
        match self.status {
            Some(status) => Err(BridgeError::Status(status)),
            None => Ok(()),
        }
    }

    fn dispatch<T: Send + 'static>(&self, name: &str, value: T) -> TransferHandle<T> {
        let n = {
            let mut dispatched = self.recorder.dispatched.lock().unwrap();
            dispatched.push(name.to_string());
            dispatched.len()
        };
        let live = self.recorder.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_live.fetch_max(live, Ordering::SeqCst);

        let (handle, completion) = TransferHandle::new(n as u64);
        let mut delay = self.delay;
        if let Some((k, token)) = &self.cancel_at {
            if *k == n {
                token.cancel();
                delay = Duration::from_secs(30);
            }
        }

        let failed = self.fail.iter().any(|f| f == name);
        let recorder = self.recorder.clone();
        tokio::spawn(async move {
            let token = completion.cancelled().clone();
            let result = tokio::select! {
                _ = token.cancelled() => Err(BridgeError::Cancelled),
                _ = tokio::time::sleep(delay) => {
                    if failed { Err(BridgeError::Status(500)) } else { Ok(value) }
                }
            };
            recorder.live.fetch_sub(1, Ordering::SeqCst);
            completion.complete(result);
        });
        handle
    }
}

#[async_trait]
impl BridgeClient for MockBridge {
    async fn get_info(&self) -> Result<BridgeInfo, BridgeError> {
        Ok(BridgeInfo {
            title: "Mock Bridge".to_string(),
            description: "scripted".to_string(),
            version: "0.0.0".to_string(),
            host: "mock".to_string(),
        })
    }

    async fn create_bucket(&self, name: &str) -> Result<BucketMeta, BridgeError> {
        self.check_status()?;
        if self.buckets.iter().any(|bucket| bucket.name == name) {
            return Err(BridgeError::Status(409));
        }
        Ok(BucketMeta {
            id: "fedcba9876543210fedcba9876543210".to_string(),
            name: name.to_string(),
            created: "2026-01-01T00:00:00+00:00".to_string(),
            decrypted: true,
        })
    }

    async fn delete_bucket(&self, bucket_id: &str) -> Result<(), BridgeError> {
        self.check_status()?;
        self.recorder.removed.lock().unwrap().push(bucket_id.to_string());
        Ok(())
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), BridgeError> {
        self.check_status()?;
        if bucket_id != BUCKET_ID || !self.files.iter().any(|file| file.id == file_id) {
            return Err(BridgeError::Status(404));
        }
        self.recorder.removed.lock().unwrap().push(file_id.to_string());
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketMeta>, BridgeError> {
        self.check_status()?;
        Ok(self.buckets.clone())
    }

    async fn list_files(&self, bucket_id: &str) -> Result<Vec<FileMeta>, BridgeError> {
        self.check_status()?;
        if bucket_id != BUCKET_ID {
            return Err(BridgeError::Status(404));
        }
        Ok(self.files.clone())
    }

    async fn store_file(
        &self,
        mut request: StoreRequest,
        progress: ProgressFn,
    ) -> Result<TransferHandle<FileMeta>, BridgeError> {
        let mut body = Vec::new();
        request.source.read_to_end(&mut body).await?;
        progress(1.0, body.len() as u64, request.size);
        let meta = file_meta(&request.file_name);
        Ok(self.dispatch(&request.file_name, meta))
    }

    async fn resolve_file(
        &self,
        _bucket_id: &str,
        file_id: &str,
        mut dest: DestWriter,
        _progress: ProgressFn,
    ) -> Result<TransferHandle<()>, BridgeError> {
        let name = file_id.strip_prefix("id-").unwrap_or(file_id).to_string();
        dest.write_all(format!("content of {}", name).as_bytes()).await?;
        dest.flush().await?;
        Ok(self.dispatch(&name, ()))
    }
}

/// Plans `operation` and drives it through a queue over `bridge`.
pub async fn run_queue(
    bridge: &dyn BridgeClient,
    operation: Operation,
    list_dir: &Path,
    cancel: &CancelController,
    overwrite: bool,
) -> Result<Outcome, TransferError> {
    let prompt = FixedAnswer(overwrite);
    let executor = Executor::new(bridge, &prompt, UploadOptions::default(), false);
    let mut ctx = TransferContext::plan(&operation)?;
    let mut queue = QueueManager::new(bridge, executor, list_dir, cancel);
    queue.run(&mut ctx).await
}
