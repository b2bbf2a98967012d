mod search;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scrapedeck_scraper::{FetchSettings, SiteRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "scrapedeck-cli")]
#[command(about = "Search listing sites and print the results as JSON")]
struct Cli {
    /// Site registry YAML; overrides `SCRAPEDECK_SITES_PATH`.
    #[arg(long, global = true)]
    sites_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List registered sites and their parameters
    Sites,
    /// Run one search and print the result
    Search {
        /// Site id, e.g. `amazon`
        site: String,
        /// Search term
        term: String,
        /// Pages to walk (listing sites) or hits to return (Wikipedia)
        #[arg(long, visible_aliases = ["max-pages", "max-results"])]
        limit: Option<u32>,
        /// Directory for the JSON artifact; defaults to `SCRAPEDECK_OUTPUT_DIR`
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Print the result without writing an artifact
        #[arg(long)]
        no_save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = scrapedeck_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        println!("scrapedeck-cli: run `sites` to list sites or `search <site> <term>`");
        return Ok(());
    };

    let settings = FetchSettings::from_app_config(&config);
    let sites_path = cli.sites_file.or_else(|| config.sites_path.clone());
    let registry = SiteRegistry::load(sites_path.as_deref(), &settings)?;

    match command {
        Commands::Sites => search::run_sites(&registry),
        Commands::Search {
            site,
            term,
            limit,
            output_dir,
            no_save,
        } => {
            let output_dir =
                (!no_save).then(|| output_dir.unwrap_or_else(|| config.output_dir.clone()));
            search::run_search(&registry, &site, &term, limit, output_dir.as_deref()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
