use clap::Parser;
use config::{Args, Config};

mod analyser;
mod config;
mod downloader;
mod server;
mod tokenizer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_args(Args::parse())?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .try_init()?;

    server::server(config).await?;

    Ok(())
}
