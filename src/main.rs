//! ampr-audit - AMPRNet Allocation Auditor
//!
//! Reconciles BGP announcements of 44/8 against the registry allocations.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use ampr_audit::cli::{Cli, Commands};
use ampr_audit::commands;
use ampr_audit::report::ReportFormat;
use ampr_audit::ReportPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    // Logs go to stderr, stdout carries the report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Crawl { output_dir } => commands::crawl::run(output_dir, &cli.config).await,
        Commands::Reconcile {
            snapshot,
            start,
            end,
            min_peers,
            covering,
            whois,
            policy,
            format,
        } => {
            let policy = policy
                .map(|p| p.parse::<ReportPolicy>().map_err(|e: String| anyhow::anyhow!(e)))
                .transpose()?;
            let format = format
                .map(|f| f.parse::<ReportFormat>().map_err(|e: String| anyhow::anyhow!(e)))
                .transpose()?;
            let args = commands::reconcile::ReconcileArgs {
                snapshot,
                start,
                end,
                min_peers,
                covering,
                whois,
                policy,
                format,
            };
            commands::reconcile::run(args, &cli.config).await
        }
        Commands::Lookup { prefix, snapshot } => {
            commands::lookup::run(&prefix, snapshot, &cli.config).await
        }
        Commands::Whois { prefix } => commands::whois::run(&prefix, &cli.config).await,
        Commands::Config => {
            print!("{}", ampr_audit::Config::generate_default_yaml());
            Ok(())
        }
        Commands::Version => {
            println!("ampr-audit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
