// 基于本地目录的 Bridge 实现
// 根目录下每个子目录是一个 bucket，上传时的元数据存放在 .meta/<id>.json
use super::{
    BridgeClient, BridgeError, BridgeInfo, BucketMeta, Completion, DestWriter, FileMeta, ProgressFn,
    StoreRequest, TransferHandle, TransferId,
};
use crate::utils::file::md5_hex;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const META_DIR: &str = ".meta";
const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

pub struct LocalBridge {
    root: PathBuf,
    chunk_size: usize,
    next_id: AtomicU64,
}

impl LocalBridge {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn bucket_id(name: &str) -> String {
        md5_hex(&[name])
    }

    pub fn file_id(bucket_id: &str, filename: &str) -> String {
        md5_hex(&[bucket_id, filename])[..24].to_string()
    }

    fn next_transfer_id(&self) -> TransferId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn bucket_dir(&self, bucket_id: &str) -> Result<PathBuf, BridgeError> {
        if bucket_id.len() != 32 || !bucket_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BridgeError::Status(400));
        }
        self.list_buckets()
            .await?
            .into_iter()
            .find(|bucket| bucket.id == bucket_id)
            .map(|bucket| self.root.join(bucket.name))
            .ok_or(BridgeError::Status(404))
    }

    async fn find_file(&self, bucket_id: &str, file_id: &str) -> Result<(PathBuf, FileMeta), BridgeError> {
        let dir = self.bucket_dir(bucket_id).await?;
        let meta = self
            .list_files(bucket_id)
            .await?
            .into_iter()
            .find(|file| file.id == file_id)
            .ok_or(BridgeError::Status(404))?;
        Ok((dir.join(&meta.filename), meta))
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn format_time(time: std::io::Result<SystemTime>) -> String {
    match time {
        Ok(time) => chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339(),
        Err(_) => String::new(),
    }
}

fn guess_mimetype(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") | Some("log") | Some("md") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

// 分块拷贝，每块之间检查取消并上报进度
async fn copy_chunks<R, W, T>(
    reader: &mut R,
    writer: &mut W,
    total: u64,
    chunk_size: usize,
    progress: &ProgressFn,
    completion: &Completion<T>,
) -> Result<u64, BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut transferred = 0u64;

    progress(0.0, 0, total);
    loop {
        if completion.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read]).await?;
        transferred += bytes_read as u64;

        let fraction = if total > 0 {
            (transferred as f64 / total as f64).min(1.0)
        } else {
            1.0
        };
        progress(fraction, transferred, total.max(transferred));
        tokio::task::yield_now().await;
    }
    writer.flush().await?;
    Ok(transferred)
}

#[async_trait]
impl BridgeClient for LocalBridge {
    async fn get_info(&self) -> Result<BridgeInfo, BridgeError> {
        if !tokio::fs::metadata(&self.root).await?.is_dir() {
            return Err(BridgeError::Status(404));
        }
        Ok(BridgeInfo {
            title: "Storj Bridge".to_string(),
            description: "Directory-backed bridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: self.root.display().to_string(),
        })
    }

    async fn create_bucket(&self, name: &str) -> Result<BucketMeta, BridgeError> {
        if name.is_empty() || name.contains(['/', '\\']) || is_hidden(name) {
            return Err(BridgeError::Status(400));
        }
        let dir = self.root.join(name);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(BridgeError::Status(409));
            }
            Err(e) => return Err(e.into()),
        }
        debug!("created bucket {}", dir.display());

        Ok(BucketMeta {
            id: Self::bucket_id(name),
            name: name.to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            decrypted: true,
        })
    }

    async fn delete_bucket(&self, bucket_id: &str) -> Result<(), BridgeError> {
        let dir = self.bucket_dir(bucket_id).await?;
        tokio::fs::remove_dir_all(&dir).await?;
        debug!("removed bucket {}", dir.display());
        Ok(())
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), BridgeError> {
        let (path, meta) = self.find_file(bucket_id, file_id).await?;
        tokio::fs::remove_file(&path).await?;

        let sidecar = path.with_file_name(META_DIR).join(format!("{}.json", meta.id));
        match tokio::fs::remove_file(&sidecar).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_buckets(&self) -> Result<Vec<BucketMeta>, BridgeError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut buckets = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() || is_hidden(&name) {
                continue;
            }
            buckets.push(BucketMeta {
                id: Self::bucket_id(&name),
                created: format_time(metadata.created().or_else(|_| metadata.modified())),
                decrypted: true,
                name,
            });
        }

        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn list_files(&self, bucket_id: &str) -> Result<Vec<FileMeta>, BridgeError> {
        let dir = self.bucket_dir(bucket_id).await?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || is_hidden(&filename) {
                continue;
            }

            let id = Self::file_id(bucket_id, &filename);
            let sidecar = dir.join(META_DIR).join(format!("{}.json", id));
            let stored = match tokio::fs::read_to_string(&sidecar).await {
                Ok(content) => match serde_json::from_str::<FileMeta>(&content) {
                    Ok(meta) => Some(meta),
                    Err(e) => {
                        warn!("Ignoring unreadable metadata {}: {}", sidecar.display(), e);
                        None
                    }
                },
                Err(_) => None,
            };

            files.push(FileMeta {
                id,
                size: metadata.len(),
                mimetype: stored
                    .as_ref()
                    .map(|meta| meta.mimetype.clone())
                    .unwrap_or_else(|| guess_mimetype(&filename).to_string()),
                created: stored
                    .map(|meta| meta.created)
                    .unwrap_or_else(|| format_time(metadata.modified())),
                decrypted: true,
                filename,
            });
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn store_file(
        &self,
        request: StoreRequest,
        progress: ProgressFn,
    ) -> Result<TransferHandle<FileMeta>, BridgeError> {
        let dir = self.bucket_dir(&request.bucket_id).await?;
        let file_name = request.file_name.clone();
        if file_name.is_empty() || file_name.contains(['/', '\\']) || is_hidden(&file_name) {
            return Err(BridgeError::Status(400));
        }

        debug!(
            "store {} into {} (prepare={}, push_frame={}, push_shard={}, rs={})",
            file_name,
            dir.display(),
            request.options.prepare_frame_limit,
            request.options.push_frame_limit,
            request.options.push_shard_limit,
            request.options.use_erasure_coding
        );

        let (handle, completion) = TransferHandle::new(self.next_transfer_id());
        let chunk_size = self.chunk_size;
        let bucket_id = request.bucket_id.clone();

        tokio::spawn(async move {
            let StoreRequest {
                mut source, size, ..
            } = request;
            let part_path = dir.join(format!(".{}.part", file_name));
            let final_path = dir.join(&file_name);

            let result: Result<FileMeta, BridgeError> = async {
                let mut part = tokio::fs::File::create(&part_path).await?;
                let copied =
                    copy_chunks(&mut source, &mut part, size, chunk_size, &progress, &completion).await?;
                drop(part);
                tokio::fs::rename(&part_path, &final_path).await?;

                let meta = FileMeta {
                    id: LocalBridge::file_id(&bucket_id, &file_name),
                    filename: file_name.clone(),
                    size: copied,
                    mimetype: guess_mimetype(&file_name).to_string(),
                    created: chrono::Utc::now().to_rfc3339(),
                    decrypted: true,
                };
                let meta_dir = dir.join(META_DIR);
                tokio::fs::create_dir_all(&meta_dir).await?;
                let json = serde_json::to_string_pretty(&meta)
                    .map_err(|e| BridgeError::Other(e.to_string()))?;
                tokio::fs::write(meta_dir.join(format!("{}.json", meta.id)), json).await?;
                Ok(meta)
            }
            .await;

            if result.is_err() {
                let _ = tokio::fs::remove_file(&part_path).await;
            }
            drop(source);
            completion.complete(result);
        });

        Ok(handle)
    }

    async fn resolve_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        mut dest: DestWriter,
        progress: ProgressFn,
    ) -> Result<TransferHandle<()>, BridgeError> {
        let (path, meta) = self.find_file(bucket_id, file_id).await?;
        let (handle, completion) = TransferHandle::new(self.next_transfer_id());
        let chunk_size = self.chunk_size;

        tokio::spawn(async move {
            let result: Result<(), BridgeError> = async {
                let mut source = tokio::fs::File::open(&path).await?;
                copy_chunks(&mut source, &mut dest, meta.size, chunk_size, &progress, &completion)
                    .await
                    .map(|_| ())
            }
            .await;
            drop(dest);
            completion.complete(result);
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn no_progress() -> ProgressFn {
        Arc::new(|_, _, _| {})
    }

    #[tokio::test]
    async fn lists_buckets_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::create_dir(tmp.path().join(".hidden")).unwrap();
        std::fs::write(tmp.path().join("docs/b.txt"), "bb").unwrap();
        std::fs::write(tmp.path().join("docs/a.pdf"), "a").unwrap();

        let bridge = LocalBridge::new(tmp.path());
        let buckets = bridge.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "docs");
        assert_eq!(buckets[0].id, LocalBridge::bucket_id("docs"));

        let files = bridge.list_files(&buckets[0].id).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, ["a.pdf", "b.txt"]);
        assert_eq!(files[0].mimetype, "application/pdf");
        assert_eq!(files[1].size, 2);
    }

    #[tokio::test]
    async fn unknown_and_malformed_bucket_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = LocalBridge::new(tmp.path());

        assert!(matches!(
            bridge.list_files("not-an-id").await,
            Err(BridgeError::Status(400))
        ));
        assert!(matches!(
            bridge.list_files(&LocalBridge::bucket_id("nope")).await,
            Err(BridgeError::Status(404))
        ));
    }

    #[tokio::test]
    async fn store_then_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        let bridge = LocalBridge::new(tmp.path()).with_chunk_size(4);
        let bucket_id = LocalBridge::bucket_id("docs");

        let payload = b"hello local bridge".to_vec();
        let request = StoreRequest {
            bucket_id: bucket_id.clone(),
            file_name: "greeting.txt".to_string(),
            size: payload.len() as u64,
            source: Box::new(std::io::Cursor::new(payload.clone())),
            options: Default::default(),
        };
        let mut handle = bridge.store_file(request, no_progress()).await.unwrap();
        let meta = handle.wait().await.unwrap();
        assert_eq!(meta.size, payload.len() as u64);
        assert_eq!(meta.mimetype, "text/plain");

        let listed = bridge.list_files(&bucket_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, meta.id);

        let out = tmp.path().join("out.txt");
        let dest = tokio::fs::File::create(&out).await.unwrap();
        let mut handle = bridge
            .resolve_file(&bucket_id, &meta.id, Box::new(dest), no_progress())
            .await
            .unwrap();
        handle.wait().await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), payload);
    }

    #[tokio::test]
    async fn resolve_unknown_file_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        let bridge = LocalBridge::new(tmp.path());
        let result = bridge
            .resolve_file(
                &LocalBridge::bucket_id("docs"),
                "missing",
                Box::new(tokio::io::sink()),
                no_progress(),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::Status(404))));
    }

    #[tokio::test]
    async fn create_and_delete_buckets() {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = LocalBridge::new(tmp.path());

        let bucket = bridge.create_bucket("photos").await.unwrap();
        assert_eq!(bucket.id, LocalBridge::bucket_id("photos"));
        assert!(tmp.path().join("photos").is_dir());
        assert!(matches!(
            bridge.create_bucket("photos").await,
            Err(BridgeError::Status(409))
        ));
        assert!(matches!(
            bridge.create_bucket("../escape").await,
            Err(BridgeError::Status(400))
        ));

        std::fs::write(tmp.path().join("photos/cat.png"), "png").unwrap();
        bridge.delete_bucket(&bucket.id).await.unwrap();
        assert!(!tmp.path().join("photos").exists());
        assert!(matches!(
            bridge.delete_bucket(&bucket.id).await,
            Err(BridgeError::Status(404))
        ));
    }

    #[tokio::test]
    async fn delete_file_removes_its_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        let bridge = LocalBridge::new(tmp.path());
        let bucket_id = LocalBridge::bucket_id("docs");

        let request = StoreRequest {
            bucket_id: bucket_id.clone(),
            file_name: "notes.md".to_string(),
            size: 5,
            source: Box::new(std::io::Cursor::new(b"notes".to_vec())),
            options: Default::default(),
        };
        let meta = bridge
            .store_file(request, no_progress())
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        let sidecar = tmp.path().join("docs").join(META_DIR).join(format!("{}.json", meta.id));
        assert!(sidecar.is_file());

        bridge.delete_file(&bucket_id, &meta.id).await.unwrap();
        assert!(!tmp.path().join("docs/notes.md").exists());
        assert!(!sidecar.exists());
        assert!(bridge.list_files(&bucket_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn info_names_the_root() {
        let tmp = tempfile::tempdir().unwrap();
        let info = LocalBridge::new(tmp.path()).get_info().await.unwrap();
        assert_eq!(info.host, tmp.path().display().to_string());
    }
}
