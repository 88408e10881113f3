// bucket 和文件的管理命令
use crate::bridge::{BridgeClient, BridgeError};
use crate::transfer::queue::{Command, Stage, TransferContext};
use crate::transfer::resolver::bucket_error;
use crate::utils::error::TransferError;
use log::info;

/// Runs the one bridge call behind `get-info`, `add-bucket`, `remove-bucket`
/// or `remove-file`.
pub async fn manage(bridge: &dyn BridgeClient, ctx: &mut TransferContext) -> Result<Stage, TransferError> {
    let bucket_name = ctx.bucket_name.clone().unwrap_or_default();

    match ctx.command {
        Command::GetInfo => {
            let info = bridge.get_info().await.map_err(|e| TransferError::TransferFailed {
                message: format!("Failed to get info: {}", e),
            })?;
            println!("Title:       {}", info.title);
            println!("Description: {}", info.description);
            println!("Version:     {}", info.version);
            println!("Host:        {}", info.host);
        }
        Command::AddBucket => {
            let bucket = bridge.create_bucket(&bucket_name).await.map_err(|e| match e {
                BridgeError::Status(404) | BridgeError::Status(409) => TransferError::BucketExists {
                    name: bucket_name.clone(),
                },
                other => bucket_error(other, &bucket_name),
            })?;
            println!(
                "ID: {} \tDecrypted: {} \tName: {}",
                bucket.id, bucket.decrypted, bucket.name
            );
            ctx.bucket_id = Some(bucket.id);
        }
        Command::RemoveBucket => {
            let bucket_id = ctx.bucket_id.clone().unwrap_or_default();
            bridge
                .delete_bucket(&bucket_id)
                .await
                .map_err(|e| bucket_error(e, &bucket_name))?;
            info!("removed bucket {} ({})", bucket_name, bucket_id);
            println!("Bucket was successfully removed.");
        }
        Command::RemoveFile => {
            let bucket_id = ctx.bucket_id.clone().unwrap_or_default();
            let file_id = ctx.file_id.clone().unwrap_or_default();
            bridge.delete_file(&bucket_id, &file_id).await.map_err(|e| match e {
                BridgeError::Status(404) => TransferError::FileNotFound { name: file_id.clone() },
                other => bucket_error(other, &bucket_name),
            })?;
            println!("File was successfully removed from bucket.");
        }
        _ => return Ok(Stage::Failed),
    }

    Ok(Stage::Done)
}
