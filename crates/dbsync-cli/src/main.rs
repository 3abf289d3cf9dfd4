//! 🚀 dbsync-cli: the front door. Loads config, sets up logging, and lets the
//! library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 🪣➡️🗄️ Sync index documents from S3 into DynamoDB.
#[derive(Debug, Parser)]
#[command(name = "dbsync", version, about)]
struct Cli {
    /// TOML config file. Environment variables fill in whatever it leaves out.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, Default, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Walk the bucket and write every page and section (the default).
    #[default]
    Sync,
    /// Create the destination table, then exit.
    CreateTable,
}

#[tokio::main]
async fn main() -> ExitCode {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut smells_like_credentials = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("credentials")
                    || cause_str.contains("AccessDenied")
                    || cause_str.contains("ExpiredToken")
                {
                    smells_like_credentials = true;
                }
            }
            if smells_like_credentials {
                error!(
                    "🔧 hint: this looks like an AWS credentials problem. Check AWS_PROFILE, \
                     AWS_REGION, and that the role can read the bucket and write the table. ☕"
                );
            }
            ExitCode::from(1)
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    if let Some(path) = &cli.config {
        let exists = path.try_exists().with_context(|| {
            format!(
                "💀 Couldn't check whether the config file exists. If it's a relative path, \
                 try an absolute one. Was checking here: '{}'",
                path.display()
            )
        })?;
        anyhow::ensure!(
            exists,
            "💀 Config file '{}' does not exist. Double check the path (and your cwd).",
            path.display()
        );
    }

    let app_config = dbsync::app_config::load_config(cli.config.as_deref())
        .context("💀 Couldn't load the config. Make sure the file and the DBSYNC_* variables are right.")?;

    match cli.command.unwrap_or_default() {
        Command::CreateTable => {
            dbsync::create_table(&app_config.table).await?;
            info!("✅ table '{}' created", app_config.table.table_name);
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync => {
            let started = Instant::now();
            let summary = dbsync::run(app_config).await?;
            info!("⏱️ sync finished in {:.2?}", started.elapsed());
            println!("{}", summary.render_table());

            if summary.writes.batches_abandoned > 0 || summary.writes.batches_failed > 0 {
                warn!(
                    "🪦 {} batches abandoned, {} failed, {} rows never made it",
                    summary.writes.batches_abandoned,
                    summary.writes.batches_failed,
                    summary.writes.rows_unwritten
                );
                return Ok(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
