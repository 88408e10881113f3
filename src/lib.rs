// 库文件，导出模块
pub mod bridge;
pub mod cli;
pub mod config;
pub mod transfer;
pub mod uri;
pub mod utils;

use anyhow::{Context, Result};
use bridge::LocalBridge;
use config::{Config, ConsolePrompt, FixedAnswer, OverwritePrompt};
use log::info;
use transfer::{CancelController, Executor, Outcome, QueueManager, TransferContext};

pub async fn run_transfer(config: Config) -> Result<Outcome> {
    std::fs::create_dir_all(&config.bridge_root)
        .with_context(|| format!("Cannot open bridge at {}", config.bridge_root.display()))?;
    let bridge = LocalBridge::new(&config.bridge_root);
    info!("using bridge at {}", config.bridge_root.display());

    let prompt: Box<dyn OverwritePrompt> = if config.assume_yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(ConsolePrompt)
    };

    let mut ctx = TransferContext::plan(&config.operation)?;
    let cancel = CancelController::listen();
    let executor = Executor::new(
        &bridge,
        prompt.as_ref(),
        config.upload_options,
        config.show_progress(),
    );
    let mut queue = QueueManager::new(&bridge, executor, &config.list_dir, &cancel);

    let outcome = queue.run(&mut ctx).await?;
    Ok(outcome)
}
