use clap::Parser;

use mailtrace::cli::PathArgs;
use mailtrace::mail::pipeline::load_or_scan;
use mailtrace::mail::{group, resolve};

/// Thread size distribution and reply-chain anomalies for a mail archive
#[derive(Parser, Debug)]
#[command(name = "analyze_threads", version)]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,
}

fn main() -> anyhow::Result<()> {
    mailtrace::logging::init();

    let cli = Cli::parse();
    let config = cli.paths.load_config()?;

    println!("Loading store...");
    let (store, _) = load_or_scan(
        &config.exports_path(),
        &config.cache_path(),
        cli.paths.rescan,
        |_, _| {},
    );
    println!("Total messages: {}", store.len());

    let roots = resolve(&store);
    let threads = group(&store, &roots);

    println!("\nThreaded results:");
    println!("  Threads: {}", threads.len());
    println!(
        "  Threads whose main message starts them: {}",
        threads.iter().filter(|t| t.main_is_first).count()
    );

    let mut thread_sizes: Vec<(usize, &str)> = threads
        .iter()
        .map(|t| (t.len(), t.main.subject_display()))
        .collect();
    thread_sizes.sort_by(|a, b| b.0.cmp(&a.0));

    println!("\nThread size distribution:");
    let buckets: [(&str, usize, usize); 5] = [
        ("Single message threads", 1, 1),
        ("2-5 messages", 2, 5),
        ("6-10 messages", 6, 10),
        ("11-50 messages", 11, 50),
        ("50+ messages", 51, usize::MAX),
    ];
    for (label, low, high) in buckets {
        let count = thread_sizes
            .iter()
            .filter(|(s, _)| *s >= low && *s <= high)
            .count();
        println!("  {}: {}", label, count);
    }

    println!("\nTop 20 largest threads:");
    for (i, (size, subject)) in thread_sizes.iter().take(20).enumerate() {
        let truncated: String = subject.chars().take(50).collect();
        println!("  {:2}. {:4} msgs - {}", i + 1, size, truncated);
    }

    println!("\n--- Checking for issues ---");
    println!("Reply cycles: {}", roots.cycles);
    println!("Self-replies: {}", roots.self_references);
    println!("Orphan replies (in_reply_to not found): {}", roots.dangling);

    // Large threads without a proper first message hint at broken reply chains
    let mut broken: Vec<(usize, &str)> = threads
        .iter()
        .filter(|t| !t.main_is_first)
        .map(|t| (t.len(), t.thread_id.as_str()))
        .collect();
    broken.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
    println!("Threads without a first message: {}", broken.len());
    for (size, root) in broken.iter().take(5) {
        let truncated: String = root.chars().take(60).collect();
        println!("  {} ({} messages)", truncated, size);
    }

    Ok(())
}
