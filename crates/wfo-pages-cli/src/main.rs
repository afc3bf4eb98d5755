//! WFO Pages CLI
//!
//! Builds markdown taxon pages in a vault from the World Flora Online Plant
//! List:
//! - Searching names (accepted, synonym, unplaced)
//! - Adding a taxon page and linking it with its existing relatives
//! - Keeping the ancestor index (`wfo-pages/ancestors.json`) in step
//! - Refreshing pages after a classification version change

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

mod interactive;
mod pages;
mod search;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "wfo-pages")]
#[command(
    author,
    version,
    about = "WFO Pages: taxon pages from the World Flora Online Plant List"
)]
struct Cli {
    /// Vault root (the folder that holds `wfo-pages/`)
    #[arg(long, global = true, default_value = ".")]
    vault: PathBuf,

    /// More log output; repeat for trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List names matching a search string
    Search {
        /// Search text (at least 3 characters)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Add (or update) the page for a taxon
    Add {
        /// WFO name id, e.g. wfo-4000032999
        wfo_id: String,

        /// Re-fetch pages that already hold a snapshot
        #[arg(long)]
        force: bool,
    },

    /// Delete a taxon page and unlink it from its relatives
    Remove {
        /// WFO name id of the page's taxon
        wfo_id: String,
    },

    /// Re-synchronize every taxon page in the vault
    Refresh {
        /// Re-fetch every snapshot (after changing the classification version)
        #[arg(long)]
        force: bool,
    },

    /// Inspect or rebuild the ancestor index
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Show or change vault settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Debounced interactive search
    Interactive,
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Rebuild the index from the pages on disk
    Rebuild,

    /// List the recorded descendants of a taxon
    Descendants {
        /// WFO name id of the ancestor
        wfo_id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings
    Show,

    /// Change saved settings
    Set {
        /// Classification version, yyyy-mm
        #[arg(long)]
        classification_version: Option<String>,

        /// GraphQL endpoint
        #[arg(long)]
        api_url: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Search { text } => cmd_search(&cli.vault, &text.join(" "))?,
        Commands::Add { wfo_id, force } => pages::cmd_add(&cli.vault, &wfo_id, force)?,
        Commands::Remove { wfo_id } => pages::cmd_remove(&cli.vault, &wfo_id)?,
        Commands::Refresh { force } => pages::cmd_refresh(&cli.vault, force)?,
        Commands::Index { command } => match command {
            IndexCommands::Rebuild => pages::cmd_index_rebuild(&cli.vault)?,
            IndexCommands::Descendants { wfo_id } => {
                pages::cmd_index_descendants(&cli.vault, &wfo_id)?
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(&cli.vault)?,
            ConfigCommands::Set {
                classification_version,
                api_url,
                timeout_secs,
            } => cmd_config_set(&cli.vault, classification_version, api_url, timeout_secs)?,
        },
        Commands::Interactive => interactive::cmd_interactive(&cli.vault)?,
    }

    Ok(())
}

/// Logs go to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_search(vault: &Path, text: &str) -> Result<()> {
    if wfo_pages_lookup::suggestion_terms(text).is_none() {
        println!(
            "{}",
            format!(
                "type at least {} characters to search",
                wfo_pages_lookup::MIN_SUGGEST_CHARS
            )
            .dimmed()
        );
        return Ok(());
    }
    // Searching only reads settings; the vault's pages folder is left alone.
    let (_, client) = pages::configured_client(vault)?;
    let mut view = search::SearchView::default();
    if view.run(&client, text)? == 0 {
        println!("{}", format!("no names match `{}`", text.trim()).dimmed());
    }
    Ok(())
}

fn cmd_config_show(vault: &Path) -> Result<()> {
    let path = Settings::path(vault);
    let saved = Settings::load(vault)?;
    let effective = saved.clone().with_env_overrides();

    println!("{}", serde_json::to_string_pretty(&effective)?);
    if path.is_file() {
        println!("{} {}", "file:".dimmed(), path.display());
    } else {
        println!("{} {} (not saved, defaults)", "file:".dimmed(), path.display());
    }
    if effective != saved {
        println!(
            "{} overridden by {} / {}",
            "env:".dimmed(),
            settings::ENV_API_URL,
            settings::ENV_CLASSIFICATION_VERSION
        );
    }
    Ok(())
}

fn cmd_config_set(
    vault: &Path,
    classification_version: Option<String>,
    api_url: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let mut settings = Settings::load(vault)?;
    let previous_version = settings.classification_version.clone();

    if let Some(version) = classification_version {
        settings.classification_version = version.trim().to_string();
    }
    if let Some(url) = api_url {
        settings.api_url = url.trim().to_string();
    }
    if let Some(secs) = timeout_secs {
        settings.timeout_secs = secs;
    }

    let path = settings.save(vault)?;
    println!("{} saved {}", "ok:".green().bold(), path.display());

    if settings.classification_version != previous_version {
        println!(
            "{} classification version changed to {}; run `wfo-pages refresh --force` to update existing pages",
            "note:".yellow().bold(),
            settings.classification_version
        );
    }
    Ok(())
}
