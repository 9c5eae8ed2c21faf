mod cli;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli::run() {
        cli::RunOutcome::Serve { addr, config } => {
            dishcast::serve(addr, config).await?;
            Ok(())
        }
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    }
}
