mod once;
mod schedule;
mod status;

use crate::bigquery::BigQueryClient;
use crate::checkpoint::FileCheckpointStore;
use crate::config::Config;
use crate::error::Result;
use crate::mapping::SourceSpec;
use crate::sources;
use crate::sync::SyncEngine;
use crate::zoho::{HttpTransport, ZohoClient, ZohoTokenExchange};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "zoho-bigquery-sync")]
#[command(about = "Incrementally sync Zoho CRM modules into BigQuery", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Once { sources } => once::execute(sources).await,
            Commands::Schedule { sources, interval } => {
                schedule::execute(sources, *interval).await
            }
            Commands::Status => status::execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one sync cycle across the enabled sources and exit
    Once {
        #[command(flatten)]
        sources: SourceFlags,
    },
    /// Run sync cycles on a fixed interval until interrupted
    Schedule {
        #[command(flatten)]
        sources: SourceFlags,
        /// Minutes between cycles, overriding the configured interval
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Show the stored checkpoint for each source
    Status,
}

#[derive(Args, Debug)]
pub struct SourceFlags {
    /// Skip the leads source
    #[arg(long)]
    pub no_leads: bool,
    /// Skip the deals source
    #[arg(long)]
    pub no_deals: bool,
    /// Skip the extended deals source
    #[arg(long)]
    pub no_deals_complete: bool,
}

impl SourceFlags {
    pub fn enabled(&self) -> Vec<SourceSpec> {
        sources::enabled_sources(!self.no_leads, !self.no_deals, !self.no_deals_complete)
    }
}

type ProductionEngine =
    SyncEngine<ZohoClient<ZohoTokenExchange, HttpTransport>, BigQueryClient, FileCheckpointStore>;

async fn build_engine(config: &Config) -> Result<ProductionEngine> {
    let crm = ZohoClient::new(&config.zoho, &config.sync)?;
    let warehouse = BigQueryClient::new(&config.bigquery).await?;
    let checkpoints = FileCheckpointStore::new(Config::state_dir()?);

    Ok(SyncEngine::new(
        config.sync.clone(),
        crm,
        warehouse,
        checkpoints,
    ))
}
