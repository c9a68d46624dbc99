use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use solgraph_core::builder::{GraphBuilder, Seed};
use solgraph_core::config::ExplorerConfig;
use solgraph_core::events::{ExplorerEvent, Severity};
use solgraph_core::report::generate_graph_report;
use solgraph_core::store::Database;
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_CONFIG_DIR: &str = "~/.config/solgraph/";

/// Collect endpoint URLs from repeated flags or a file, falling back to the
/// public default.
pub fn load_endpoints_from_source(
    endpoints: Vec<Url>,
    endpoints_file: Option<&PathBuf>,
) -> Result<Vec<Url>, String> {
    if let Some(path) = endpoints_file {
        return load_endpoints_from_file(path);
    }
    if endpoints.is_empty() {
        return Ok(vec![Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is valid")]);
    }
    Ok(endpoints)
}

/// Load and parse endpoint URLs from a newline-delimited file.
pub fn load_endpoints_from_file(path: &PathBuf) -> Result<Vec<Url>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read endpoints file {}: {}", path.display(), e))?;

    let endpoints: Vec<Url> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_endpoint_line(line.trim()))
        .collect();

    if endpoints.is_empty() {
        return Err(format!("No valid endpoint URLs found in {}", path.display()));
    }

    Ok(endpoints)
}

/// Parse a single line as an endpoint URL, trying to add https:// if needed.
pub fn parse_endpoint_line(line: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(line) {
        return Some(url);
    }

    let with_scheme = format!("https://{}", line);
    if let Ok(url) = Url::parse(&with_scheme) {
        return Some(url);
    }

    eprintln!("[!] Skipping invalid endpoint '{}'", line);
    None
}

fn config_db_path() -> PathBuf {
    let expanded = shellexpand::tilde(DEFAULT_CONFIG_DIR);
    Path::new(expanded.as_ref()).join("solgraph.db")
}

/// Open the local database when one was initialized; expansion works without
/// it, just without persisted paths and snapshots.
fn open_store(no_store: bool) -> Option<Arc<Database>> {
    if no_store {
        return None;
    }
    let path = config_db_path();
    if !Database::exists(&path) {
        return None;
    }
    match Database::new(&path) {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            eprintln!("[!] Could not open database at {}: {}", path.display(), e);
            None
        }
    }
}

pub fn handle_init(args: &ArgMatches) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let config_dir = args.get_one::<String>("PATH").unwrap();
    let force = args.get_flag("force");
    let expanded_config_dir = shellexpand::tilde(config_dir);
    let solgraph_config_dir = Path::new(expanded_config_dir.as_ref());
    let db_loc = solgraph_config_dir.join("solgraph.db");
    let db_path = db_loc.as_path();

    if Database::exists(db_path) && !force {
        spinner.finish_and_clear();
        println!(
            "{} Database already exists at {}. Re-run with --force to overwrite.",
            "✗".red().bold(),
            db_path.display()
        );
        return;
    }

    spinner.set_message("Creating configuration directory...");
    if let Err(e) = fs::create_dir_all(solgraph_config_dir) {
        spinner.finish_and_clear();
        eprintln!("{} Failed to create {}: {}", "✗".red().bold(), solgraph_config_dir.display(), e);
        std::process::exit(1);
    }

    if Database::exists(db_path) {
        spinner.set_message("Removing existing database...");
        if let Err(e) = Database::remove(db_path) {
            spinner.finish_and_clear();
            eprintln!("{} Failed to remove {}: {}", "✗".red().bold(), db_path.display(), e);
            std::process::exit(1);
        }
    }

    spinner.set_message(format!("Initializing database at: {}", db_path.display()));
    if let Err(e) = Database::new(db_path) {
        spinner.finish_and_clear();
        eprintln!("{} Failed to create database: {}", "✗".red().bold(), e);
        std::process::exit(1);
    }

    spinner.finish_with_message(format!(
        "{} Solgraph initialized\n  {} Config directory: {}\n  {} Database: {}",
        "✓".green().bold(),
        "→".blue(),
        solgraph_config_dir.display(),
        "→".blue(),
        db_path.display()
    ));
}

pub async fn handle_expand(args: &ArgMatches) {
    tracing_subscriber::fmt::init();

    if let Err(e) = run_expand(args).await {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_expand(args: &ArgMatches) -> anyhow::Result<()> {
    let seed_input = args.get_one::<String>("SEED").unwrap();
    let endpoints: Vec<Url> = args
        .get_many::<Url>("endpoint")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let endpoints_file = args.get_one::<PathBuf>("endpoints-file");
    let depth = *args.get_one::<u32>("depth").unwrap();
    let limit = *args.get_one::<usize>("limit").unwrap();
    let output = args.get_one::<PathBuf>("output");
    let no_store = args.get_flag("no-store");

    let seed = Seed::parse(seed_input)
        .map_err(|_| anyhow!("'{seed_input}' is not a valid signature or address"))?;
    let endpoints = load_endpoints_from_source(endpoints, endpoints_file).map_err(|e| anyhow!(e))?;

    println!("\n  Expanding around {}", seed_input.bright_white());
    println!("  Endpoints: {}", endpoints.len());
    println!("  Max depth: {}\n", depth);

    let config = ExplorerConfig::new(endpoints)
        .with_max_depth(depth)
        .with_history_limit(limit);

    let store = open_store(no_store);
    let session = store
        .as_ref()
        .and_then(|db| match db.create_session(seed_input) {
            Ok(id) => Some(id),
            Err(e) => {
                eprintln!("[!] Could not record session: {}", e);
                None
            }
        });

    let builder = GraphBuilder::new(config, store.clone()).context("failed to set up the session")?;

    // Render engine events as terminal progress.
    let mut events = builder.subscribe();
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message("Expanding...");
    let progress_clone = progress.clone();
    let event_pump = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ExplorerEvent::Progress {
                    percent,
                    loaded,
                    discovered,
                } => {
                    progress_clone.set_message(format!(
                        "Expanding... {percent}% ({loaded}/{discovered} accounts)"
                    ));
                }
                ExplorerEvent::Alert {
                    severity: Severity::Warning,
                    scope,
                    message,
                } => {
                    progress_clone.println(format!("[!] {scope}: {message}"));
                }
                _ => {}
            }
        }
    });

    let result = builder.expand(&seed).await;
    event_pump.abort();
    builder.close();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            progress.finish_and_clear();
            if let (Some(db), Some(id)) = (&store, &session) {
                let _ = db.fail_session(id);
            }
            return Err(e).context("expansion failed");
        }
    };

    progress.finish_and_clear();
    println!("{} Expansion complete!\n", "✓".green().bold());

    let report = generate_graph_report(&builder.snapshot(), &summary);
    match output {
        Some(path) => {
            fs::write(path, &report)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            println!("Report saved to {}", path.display());
        }
        None => print!("{report}"),
    }

    if let (Some(db), Some(id)) = (&store, &session) {
        let _ = db.complete_session(id);
    }

    Ok(())
}

pub async fn handle_path(args: &ArgMatches) {
    tracing_subscriber::fmt::init();

    if let Err(e) = run_path(args).await {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_path(args: &ArgMatches) -> anyhow::Result<()> {
    let from = args.get_one::<String>("from").unwrap();
    let to = args.get_one::<String>("to").unwrap();
    for address in [from, to] {
        if !solgraph_rpc::types::is_valid_address(address) {
            return Err(anyhow!("'{address}' is not a valid address"));
        }
    }
    let endpoints: Vec<Url> = args
        .get_many::<Url>("endpoint")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let depth = *args.get_one::<u32>("depth").unwrap();

    let endpoints = load_endpoints_from_source(endpoints, None).map_err(|e| anyhow!(e))?;
    let config = ExplorerConfig::new(endpoints).with_max_depth(depth);
    let store = open_store(false);
    let builder = GraphBuilder::new(config, store).context("failed to set up the session")?;

    println!("\n  Searching for a path {} -> {}\n", from.bright_white(), to.bright_white());

    builder
        .expand(&Seed::parse(from).map_err(|_| anyhow!("'{from}' is not a valid address"))?)
        .await
        .context("expansion from the source failed")?;

    match builder.find_path(from, to) {
        Some(path) => {
            println!("{} Path found ({} hops):\n", "✓".green().bold(), path.hops.len() - 1);
            for (i, hop) in path.hops.iter().enumerate() {
                let marker = if i == 0 || i == path.hops.len() - 1 {
                    "●".green()
                } else {
                    "○".normal()
                };
                println!("  {} {}", marker, hop);
            }
        }
        None => {
            println!(
                "{} No path between {} and {} within {} hops",
                "✗".yellow().bold(),
                from,
                to,
                depth
            );
        }
    }

    builder.close();
    Ok(())
}
