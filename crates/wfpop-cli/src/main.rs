mod harvest;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::harvest::HarvestTarget;

#[derive(Debug, Parser)]
#[command(name = "wfpop-cli")]
#[command(about = "n8n workflow popularity harvester")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one full harvest pass and exit.
    Harvest {
        #[arg(value_enum)]
        target: HarvestTarget,
        /// Print the unit plan without calling upstreams or the database.
        #[arg(long)]
        dry_run: bool,
    },
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Migrate,
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("wfpop-cli: pass --help to list commands");
        return Ok(());
    };

    let config = wfpop_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Harvest { target, dry_run } => {
            harvest::run_harvest(&config, target, dry_run).await
        }
        Commands::Db { command } => run_db(&config, command).await,
    }
}

async fn run_db(config: &wfpop_core::AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = wfpop_db::connect_pool_from_config(config).await?;
    match command {
        DbCommands::Migrate => {
            let applied = wfpop_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Ping => {
            wfpop_db::ping(&pool).await?;
            println!("database reachable");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
