use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use ops_dashboard::{
    auth::hash_password, config::Config, projections::SummaryAnalyzer, start_server,
    state::Dataset,
};

#[derive(Parser)]
#[command(name = "ops-dashboard")]
#[command(about = "Transaction analytics dashboard API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Transaction log (CSV)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load the transaction log and print its summary statistics
    Check {
        /// Transaction log (CSV)
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Print the hash to put in DASHBOARD_USERS for a password
    HashPassword {
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command.unwrap_or(Commands::Serve {
        data: None,
        host: None,
        port: None,
    }) {
        Commands::Serve { data, host, port } => {
            let mut config = Config::load()?;
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            start_server(config).await
        }
        Commands::Check { data } => {
            let path = match data {
                Some(path) => path,
                None => Config::load()?.data_path,
            };
            let dataset = Dataset::load(&path)?;
            println!(
                "{} rows, {} orders, {} active days",
                dataset.table.len(),
                dataset.orders.len(),
                dataset.daily.len()
            );
            for stat in SummaryAnalyzer::new(&dataset.table.rows).analyze() {
                println!("{:<20} {}", stat.label, stat.value);
            }
            Ok(())
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password));
            Ok(())
        }
    }
}
