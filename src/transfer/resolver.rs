// bucket 名称解析为 bucket id
use crate::bridge::{BridgeClient, BridgeError, BucketMeta};
use crate::transfer::queue::{Command, Stage, TransferContext};
use crate::utils::error::TransferError;
use log::{debug, info};

/// Maps a failed bucket-level bridge call onto the error taxonomy.
pub fn bucket_error(err: BridgeError, bucket: &str) -> TransferError {
    match err {
        BridgeError::Status(401) => TransferError::AuthFailed,
        BridgeError::Status(404) => TransferError::BucketNotFound {
            name: bucket.to_string(),
        },
        BridgeError::Status(400) => TransferError::InvalidBucket {
            id: bucket.to_string(),
        },
        BridgeError::Decryption => TransferError::DecryptionError,
        other => TransferError::TransferFailed {
            message: other.to_string(),
        },
    }
}

fn print_bucket(bucket: &BucketMeta) {
    println!(
        "ID: {} \tDecrypted: {} \tCreated: {} \tName: {}",
        bucket.id, bucket.decrypted, bucket.created, bucket.name
    );
}

/// Resolves `ctx.bucket_name` with a single `list_buckets` call and returns
/// the stage that follows for `ctx.command`.
pub async fn resolve_bucket(
    bridge: &dyn BridgeClient,
    ctx: &mut TransferContext,
) -> Result<Stage, TransferError> {
    let name = ctx.bucket_name.clone().unwrap_or_default();
    let buckets = bridge
        .list_buckets()
        .await
        .map_err(|e| bucket_error(e, &name))?;
    debug!("bridge returned {} buckets", buckets.len());

    if ctx.command == Command::ListBuckets {
        if buckets.is_empty() {
            println!("No buckets.");
        }
        buckets.iter().for_each(print_bucket);
        return Ok(Stage::Done);
    }

    let bucket = buckets
        .into_iter()
        .find(|bucket| bucket.name == name)
        .ok_or_else(|| TransferError::BucketNotFound { name: name.clone() })?;

    if ctx.command == Command::GetBucketId {
        print_bucket(&bucket);
    }
    info!("bucket '{}' resolved to {}", bucket.name, bucket.id);
    ctx.bucket_id = Some(bucket.id);

    Ok(ctx.command.after_resolve())
}
