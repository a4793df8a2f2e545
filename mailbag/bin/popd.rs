use std::sync::Arc;

use clap::Parser;
use mailbag::{cli::Args, runtime};
use mailbag_common::{config::SessionConfig, logging};
use mailbag_pop3::Pop3;
use mailbag_store::FileMailStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init();

    let store = Arc::new(FileMailStore::from_dir(std::env::current_dir()?));
    runtime::serve(Pop3::new(SessionConfig::default(), store), args.port).await
}
