//! Dossier CLI
//!
//! Privacy-first local signal discovery.

use clap::{Parser, Subcommand};
use dossier::config::{AppPaths, CategoryConsent, DiscoveryCategory};
use dossier::orchestrator::Orchestrator;
use dossier::{PRIVACY_DECLARATION, VERSION};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dossier")]
#[command(version = VERSION)]
#[command(about = "Privacy-first local signal discovery", long_about = None)]
struct Cli {
    /// Override the app home directory
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one discovery pass and write the digest
    Discover {
        /// Categories to collect, comma-separated
        /// (browsing_bookmarks, dev_environment, apps_system, messages_notes)
        #[arg(long)]
        categories: Option<String>,

        /// Print the digest to stdout as well
        #[arg(long)]
        print: bool,
    },

    /// Show or update the persisted category consent
    Categories {
        /// Replace the consented categories, comma-separated
        #[arg(long)]
        set: Option<String>,
    },

    /// Show state-file presence and last digest age
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show resolved paths
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = match cli.home {
        Some(home) => AppPaths::with_home(home),
        None => AppPaths::default(),
    };

    match cli.command {
        Commands::Discover { categories, print } => {
            cmd_discover(paths, categories, print).await;
        }
        Commands::Categories { set } => {
            cmd_categories(paths, set);
        }
        Commands::Status => {
            cmd_status(paths);
        }
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
        }
        Commands::Config => {
            cmd_config(paths);
        }
    }
}

async fn cmd_discover(paths: AppPaths, categories: Option<String>, print: bool) {
    println!("Dossier v{VERSION}");
    println!();

    let consent = match categories {
        Some(csv) => {
            let consent = CategoryConsent::from_csv(&csv);
            if consent.categories.is_empty() {
                eprintln!("Error: no valid categories in {csv:?}");
                eprintln!("Valid categories:");
                for category in DiscoveryCategory::ALL {
                    eprintln!("  {category}");
                }
                std::process::exit(1);
            }
            consent
        }
        None => CategoryConsent::load(&paths.categories_path()).unwrap_or_default(),
    };

    println!("Collecting categories:");
    for category in &consent.categories {
        println!("  {category}");
    }
    println!();

    let orchestrator = Orchestrator::new(paths);
    match orchestrator.run(&consent).await {
        Ok(outcome) => {
            println!("Digest written to {:?}", outcome.digest_path);
            if print {
                println!();
                println!("{}", outcome.digest);
            }
        }
        Err(e) => {
            eprintln!("Error: discovery failed: {e:#}");
            std::process::exit(1);
        }
    }
}

fn cmd_categories(paths: AppPaths, set: Option<String>) {
    if let Some(csv) = set {
        let consent = CategoryConsent::from_csv(&csv);
        if consent.categories.is_empty() {
            eprintln!("Error: no valid categories in {csv:?}");
            std::process::exit(1);
        }
        if let Err(e) = consent.save(&paths.categories_path()) {
            eprintln!("Error saving consent: {e}");
            std::process::exit(1);
        }
        println!("Consent updated.");
    }

    let consent = CategoryConsent::load(&paths.categories_path()).unwrap_or_default();
    println!("Consented categories:");
    for category in DiscoveryCategory::ALL {
        let mark = if consent.includes(category) { "x" } else { " " };
        println!("  [{mark}] {category}");
    }
}

fn cmd_status(paths: AppPaths) {
    println!("Dossier Status");
    println!("==============");
    println!();

    let digest = paths.digest_path();
    if digest.exists() {
        let age = std::fs::metadata(&digest)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok());
        match age {
            Some(age) => println!("Digest: present ({} minutes old)", age.as_secs() / 60),
            None => println!("Digest: present"),
        }
    } else {
        println!("Digest: not yet written");
    }

    println!(
        "Consent record: {}",
        if paths.categories_path().exists() {
            "present"
        } else {
            "not yet written"
        }
    );
    println!(
        "Identity map: {}",
        if paths.identity_map_path().exists() {
            "present"
        } else {
            "empty"
        }
    );
}

fn cmd_config(paths: AppPaths) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Home:      {:?}", paths.home);
    println!("Cache:     {:?}", paths.cache_dir());
    println!("State:     {:?}", paths.state_dir());
    println!("Digest:    {:?}", paths.digest_path());
    println!("Consent:   {:?}", paths.categories_path());
    println!("Identity:  {:?}", paths.identity_map_path());
}
