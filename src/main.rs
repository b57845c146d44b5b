use clap::{Arg, Command};
use log::LevelFilter;
use phish_sentry::pipeline::truncate;
use phish_sentry::{
    Config, DataExtractor, IngestPipeline, Message, RecordStore, RiskLevel, RiskScorer, RunMode,
    Scheduler, SpoolSource, SqliteStore,
};
use std::path::Path;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("phish-sentry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Heuristic phishing scorer for mailbox spools")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("phish-sentry.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("continuous")
                .long("continuous")
                .help("Keep sweeping on the configured interval until interrupted")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Show stored message statistics and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("flagged")
                .long("flagged")
                .value_name("N")
                .help("List the N most recent flagged messages and exit")
                .num_args(0..=1)
                .default_missing_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("test-message")
                .long("test-message")
                .value_name("FILE")
                .help("Score a JSON message file without storing it")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("phish-sentry.yaml");

    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };
    if matches.get_flag("continuous") {
        config.mode = RunMode::Continuous;
    }
    if let Err(e) = config.validate() {
        eprintln!("❌ {e}");
        process::exit(1);
    }

    let scorer = match RiskScorer::with_trusted_domains(&config.extra_trusted_domains) {
        Ok(scorer) => scorer,
        Err(e) => {
            eprintln!("❌ Failed to compile detection rules: {e}");
            process::exit(1);
        }
    };

    if let Some(message_file) = matches.get_one::<String>("test-message") {
        if let Err(e) = test_message_file(&scorer, message_file) {
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
        return;
    }

    let store = match SqliteStore::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("❌ Cannot open database '{}': {e}", config.database_path);
            process::exit(1);
        }
    };

    if matches.get_flag("stats") {
        print_stats(store.as_ref());
        return;
    }

    if let Some(limit) = matches.get_one::<usize>("flagged") {
        print_flagged(store.as_ref(), *limit);
        return;
    }

    let extractor = match DataExtractor::new() {
        Ok(extractor) => extractor,
        Err(e) => {
            eprintln!("❌ Failed to compile extraction patterns: {e}");
            process::exit(1);
        }
    };

    let pipeline = IngestPipeline::new(scorer, store, extractor);
    let source = SpoolSource::new(&config.spool_dir);
    let mut scheduler = Scheduler::new(&config, pipeline, Box::new(source));

    match config.mode {
        RunMode::Single => {
            if let Err(e) = scheduler.run_once() {
                eprintln!("❌ Sweep failed: {e}");
                process::exit(1);
            }
        }
        RunMode::Continuous => {
            let handle = scheduler.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.stop();
                }
            });
            scheduler.start().await;

            let stats = scheduler.stats();
            log::info!(
                "Run totals: {} checked, {} flagged, started {}",
                stats.total_checked,
                stats.flagged_count,
                stats
                    .started_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut config = if Path::new(path).exists() {
        Config::from_file(path)?
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Config::default()
    };
    config.apply_env()?;
    Ok(config)
}

fn generate_default_config(path: &str) {
    match Config::default().to_file(path) {
        Ok(()) => println!("Default configuration written to: {path}"),
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_message_file(scorer: &RiskScorer, path: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let message: Message = serde_json::from_str(&content)?;
    let verdict = scorer.score(&message);

    println!("🧪 {path}");
    println!("  From:    {} <{}>", message.sender_display_name, message.sender_email);
    println!("  Subject: {}", message.subject);
    println!(
        "  Result:  {} {} ({}/100){}",
        verdict.risk_level.marker(),
        verdict.risk_level,
        verdict.score,
        if verdict.is_flagged { " - FLAGGED" } else { "" }
    );
    for reason in &verdict.reasons {
        println!("    • {reason}");
    }
    if !verdict.urls_found.is_empty() {
        println!("  URLs:");
        for url in &verdict.urls_found {
            println!("    {url}");
        }
    }
    Ok(())
}

fn print_stats(store: &dyn RecordStore) {
    let stats = match store.stats() {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("❌ Error reading statistics: {e}");
            process::exit(1);
        }
    };

    println!("📊 phish-sentry statistics");
    println!("  Messages analyzed: {}", stats.total);
    println!("  Flagged:           {}", stats.flagged);
    for level in RiskLevel::all().into_iter().rev() {
        let count = stats.by_risk_level.get(&level).copied().unwrap_or(0);
        println!("  {} {:<8} {}", level.marker(), level, count);
    }
}

fn print_flagged(store: &dyn RecordStore, limit: usize) {
    let records = match store.flagged(limit) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("❌ Error reading flagged messages: {e}");
            process::exit(1);
        }
    };

    if records.is_empty() {
        println!("No flagged messages");
        return;
    }

    for record in records {
        println!(
            "{} {} {}/100 {} | {} - {}",
            record.verdict.risk_level.marker(),
            record.record_id,
            record.verdict.score,
            record.stored_at.format("%Y-%m-%d %H:%M"),
            truncate(&record.message.sender_email, 30),
            truncate(&record.message.subject, 50)
        );
        for reason in &record.verdict.reasons {
            println!("    • {reason}");
        }
    }
}
