// Bridge 客户端接口

pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub use local::LocalBridge;

/// `(fraction in [0, 1], bytes done, bytes total)`
pub type ProgressFn = Arc<dyn Fn(f64, u64, u64) + Send + Sync>;
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;
pub type DestWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub type TransferId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMeta {
    pub id: String,
    pub name: String,
    pub created: String,
    pub decrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub mimetype: String,
    pub created: String,
    pub decrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeInfo {
    pub title: String,
    pub description: String,
    pub version: String,
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub prepare_frame_limit: u32,
    pub push_frame_limit: u32,
    pub push_shard_limit: u32,
    pub use_erasure_coding: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            prepare_frame_limit: 1,
            push_frame_limit: 64,
            push_shard_limit: 64,
            use_erasure_coding: true,
        }
    }
}

pub struct StoreRequest {
    pub bucket_id: String,
    pub file_name: String,
    pub source: SourceReader,
    pub size: u64,
    pub options: UploadOptions,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("request failed with status code: {0}")]
    Status(u16),

    #[error("file decryption error")]
    Decryption,

    #[error("transfer canceled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Cancellation side of a transfer, usable without knowing its result type.
#[derive(Debug, Clone)]
pub struct TransferControl {
    id: TransferId,
    token: CancellationToken,
}

impl TransferControl {
    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Opaque handle of one in-flight transfer.
pub struct TransferHandle<T> {
    control: TransferControl,
    done: oneshot::Receiver<Result<T, BridgeError>>,
}

/// Bridge-side half of a [`TransferHandle`]; consuming it delivers the result.
pub struct Completion<T> {
    token: CancellationToken,
    tx: oneshot::Sender<Result<T, BridgeError>>,
}

impl<T> TransferHandle<T> {
    pub fn new(id: TransferId) -> (Self, Completion<T>) {
        let token = CancellationToken::new();
        let (tx, done) = oneshot::channel();
        let handle = Self {
            control: TransferControl {
                id,
                token: token.clone(),
            },
            done,
        };
        (handle, Completion { token, tx })
    }

    pub fn id(&self) -> TransferId {
        self.control.id
    }

    pub fn control(&self) -> &TransferControl {
        &self.control
    }

    /// Waits for the result. Cancel-safe, so it can sit in a `select!`.
    pub async fn wait(&mut self) -> Result<T, BridgeError> {
        match (&mut self.done).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Other(
                "transfer ended without reporting a result".to_string(),
            )),
        }
    }
}

impl<T> Completion<T> {
    pub fn cancelled(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn complete(self, result: Result<T, BridgeError>) {
        // 接收端已丢弃时结果无人关心
        let _ = self.tx.send(result);
    }
}

#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn get_info(&self) -> Result<BridgeInfo, BridgeError>;

    async fn list_buckets(&self) -> Result<Vec<BucketMeta>, BridgeError>;

    async fn create_bucket(&self, name: &str) -> Result<BucketMeta, BridgeError>;

    /// Removes the bucket together with every file in it.
    async fn delete_bucket(&self, bucket_id: &str) -> Result<(), BridgeError>;

    async fn list_files(&self, bucket_id: &str) -> Result<Vec<FileMeta>, BridgeError>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), BridgeError>;

    async fn store_file(
        &self,
        request: StoreRequest,
        progress: ProgressFn,
    ) -> Result<TransferHandle<FileMeta>, BridgeError>;

    async fn resolve_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        dest: DestWriter,
        progress: ProgressFn,
    ) -> Result<TransferHandle<()>, BridgeError>;

    /// Best-effort and idempotent.
    fn cancel(&self, control: &TransferControl) {
        control.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_is_delivered_once() {
        let (mut handle, completion) = TransferHandle::<u32>::new(7);
        assert_eq!(handle.id(), 7);
        completion.complete(Ok(42));
        assert_eq!(handle.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dropped_completion_is_an_error() {
        let (mut handle, completion) = TransferHandle::<u32>::new(1);
        drop(completion);
        assert!(matches!(handle.wait().await, Err(BridgeError::Other(_))));
    }

    #[tokio::test]
    async fn cancel_reaches_the_bridge_side() {
        let (handle, completion) = TransferHandle::<()>::new(3);
        handle.control().cancel();
        handle.control().cancel();
        assert!(completion.is_cancelled());
        completion.cancelled().cancelled().await;
    }
}
