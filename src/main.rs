use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use automedia::app::AppContext;
use automedia::cli::{commands, Cli, Commands};
use automedia::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("automedia=info")))
        .init();

    let cli = Cli::parse();

    // Status and stop only look at the lock file
    match &cli.command {
        Commands::Status { download_dir } => {
            commands::status(download_dir);
            return Ok(());
        }
        Commands::Stop { download_dir } => {
            commands::stop(download_dir)?;
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Add {
            kind,
            url,
            name,
            start_after,
        } => {
            commands::add_source(
                &ctx,
                kind.into(),
                &url,
                name.as_deref(),
                start_after.as_deref(),
            )
            .await?;
        }
        Commands::Sync { download_dir } => {
            commands::sync(&ctx, &download_dir).await?;
        }
        Commands::Downloaded => {
            commands::list_downloaded(&ctx)?;
        }
        Commands::List => {
            commands::list_sources(&ctx)?;
        }
        Commands::Status { .. } | Commands::Stop { .. } => {}
    }

    Ok(())
}
