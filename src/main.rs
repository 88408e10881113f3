use anyhow::Result;
use clap::Parser;
use storj_transfer::{
    cli::Cli,
    config::{level_filter, Config},
    run_transfer,
    transfer::Outcome,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    // 日志级别由 --log 决定，RUST_LOG 可覆盖
    env_logger::Builder::new()
        .filter_level(level_filter(config.log_level))
        .parse_default_env()
        .init();

    match run_transfer(config).await {
        // 批量中个别文件失败不影响退出码，汇总已由队列输出
        Ok(Outcome::Done(_)) => {}
        Ok(Outcome::Cancelled) => {
            eprintln!("Transfer canceled");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Transfer failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
