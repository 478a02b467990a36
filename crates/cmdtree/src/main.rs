use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cmdtree::cli::run(cmdtree::cli::Cli::parse()).await
}
