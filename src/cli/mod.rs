// src/cli/mod.rs
use anyhow::Result;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Config;
use crate::analytics::{AnalyticsEngine, AnalyticsSettings, DashboardFilters, DashboardScope};
use crate::permissions::{AnalyticsPermission, PermissionService};
use crate::store::MemoryStore;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Print a dashboard computed from a seed file
    Stats {
        /// JSON seed file with the audit collections
        seed: PathBuf,
        #[arg(long)]
        year: Option<i32>,
        /// Company id for a per-company dashboard
        #[arg(long)]
        company: Option<String>,
    },
    /// Remove permission records whose user no longer exists
    Cleanup {
        seed: PathBuf,
        /// Where to write the cleaned seed; defaults to overwriting `seed`
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub struct AuditboardCli {
    config: Config,
}

impl AuditboardCli {
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: Config::from_env()?,
        })
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Serve { port } => crate::server::run_server(port).await,
            Commands::Stats { seed, year, company } => {
                let report = self.stats(&seed, year, company).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Commands::Cleanup { seed, output } => {
                let removed = self.cleanup(&seed, output.as_deref().unwrap_or(seed.as_path())).await?;
                println!("Removed {} orphaned permission records", removed);
                Ok(())
            }
        }
    }

    /// Dashboard over the seed data as an unrestricted caller.
    pub async fn stats(
        &self,
        seed: &Path,
        year: Option<i32>,
        company: Option<String>,
    ) -> Result<serde_json::Value> {
        let store = Arc::new(MemoryStore::from_seed_file(seed)?);
        let engine = AnalyticsEngine::new(store, AnalyticsSettings::from(&self.config));
        let filters = DashboardFilters {
            year,
            ..Default::default()
        };
        let scope = match company {
            Some(id) => DashboardScope::Company(id),
            None => DashboardScope::Global,
        };
        let permission = AnalyticsPermission::unrestricted("cli");
        Ok(engine.get_dashboard(&permission, scope, &filters).await?)
    }

    pub async fn cleanup(&self, seed: &Path, output: &Path) -> Result<u64> {
        let store = Arc::new(MemoryStore::from_seed_file(seed)?);
        let removed = PermissionService::new(store.clone()).cleanup_orphans().await?;
        store.write_seed_file(output)?;
        Ok(removed)
    }

    pub fn print_help() {
        println!("Available Commands:");
        println!();
        println!("  auditboard serve [--port <port>]            - Start the HTTP server");
        println!("  auditboard stats <seed> [--year] [--company] - Print a dashboard from a seed file");
        println!("  auditboard cleanup <seed> [--output <file>]  - Sweep orphaned permission records");
        println!();
        println!("  auditboard --server --port 8080              - Legacy server flag");
    }
}
