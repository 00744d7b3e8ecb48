use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use mailtrace::cli::PathArgs;
use mailtrace::config::Config;
use mailtrace::mail::pipeline::{StoreSource, load_or_scan};
use mailtrace::mail::{Analysis, DomainRank, DomainRanks, MessageStore, NoRanks};

#[derive(Parser, Debug)]
#[command(
    name = "mailtrace",
    version,
    about = "Find your addresses and online accounts in a mail archive"
)]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse the archive and refresh the store cache
    Scan,

    /// Infer my addresses and detect accounts
    Analyze {
        /// `rank,domain` CSV with domain popularity
        #[arg(long)]
        ranks: Option<PathBuf>,

        /// Fraction (below 1) or number of messages my addresses must cover
        #[arg(long)]
        min_coverage: Option<f64>,

        /// Upper bound on inferred addresses
        #[arg(long)]
        max_iterations: Option<usize>,
    },
}

fn main() -> Result<()> {
    mailtrace::logging::init();

    let cli = Cli::parse();
    let mut config = cli.paths.load_config()?;

    match cli.command {
        Commands::Scan => {
            let store = build_store(&config, true);
            println!("Stored {} messages", store.len());
        }
        Commands::Analyze {
            ranks,
            min_coverage,
            max_iterations,
        } => {
            if let Some(path) = ranks {
                config.domain_rank.path = Some(path.to_string_lossy().into_owned());
            }
            if let Some(value) = min_coverage {
                config.identity.min_coverage = value;
            }
            if let Some(value) = max_iterations {
                config.identity.max_iterations = value;
            }
            analyze(&config, cli.paths.rescan)?;
        }
    }

    Ok(())
}

fn build_store(config: &Config, rescan: bool) -> MessageStore {
    let (store, source) = load_or_scan(
        &config.exports_path(),
        &config.cache_path(),
        rescan,
        |current, total| {
            if current == total || current % 500 == 0 {
                info!(current, total, "scan progress");
            }
        },
    );

    if let StoreSource::Scan(report) = source {
        println!(
            "Scanned archive: {} messages, {} duplicates, {} failed to parse",
            report.stored, report.duplicates, report.failed
        );
    }
    store
}

fn analyze(config: &Config, rescan: bool) -> Result<()> {
    let store = build_store(config, rescan);

    let ranks: Box<dyn DomainRank> = match config.domain_rank_path() {
        Some(path) => Box::new(DomainRanks::load_or_empty(&path)),
        None => Box::new(NoRanks),
    };

    let analysis = Analysis::run(&store, &config.identity, ranks.as_ref());
    analysis.write_results(&config.cache_path())?;

    println!("My Email Addresses:");
    for addr in &analysis.identity.addresses {
        println!("  - {} ({} messages)", addr.address, addr.count);
    }
    println!(
        "Coverage: {:?} after {} rounds (target {:.0} of {} messages)",
        analysis.identity.outcome,
        analysis.identity.coverage.len(),
        analysis.identity.target,
        analysis.identity.candidate_messages
    );

    println!("\nAccounts ({}):", analysis.accounts.len());
    for account in &analysis.accounts {
        let rank = account
            .domain_rank
            .map(|r| format!("#{}", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:30} {:30} {} .. {} {:4} threads {:4} generated  rank {}",
            account.service_id,
            account.my_addr,
            account.joined.format("%Y-%m-%d"),
            account.last.format("%Y-%m-%d"),
            account.threads,
            account.generated,
            rank
        );
    }

    Ok(())
}
