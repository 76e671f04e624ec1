// src/main.rs
use auditboard::cli::{AuditboardCli, Commands};
use auditboard::server::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    #[derive(Parser)]
    #[command(name = "auditboard")]
    #[command(about = "Security audit analytics and permission service")]
    struct Cli {
        #[command(subcommand)]
        command: Option<Commands>,

        /// Run in server mode
        #[arg(long)]
        server: bool,

        /// Port for server mode
        #[arg(long, default_value = "8080")]
        port: u16,
    }

    let cli = Cli::parse();

    if cli.server {
        return run_server(cli.port).await;
    }

    match cli.command {
        Some(command) => AuditboardCli::new()?.handle_command(command).await,
        None => {
            AuditboardCli::print_help();
            Ok(())
        }
    }
}
