//! Spendy CLI
//!
//! Command-line access to an encrypted Spendy ledger kept in a local
//! directory (for example one synchronized by a file-sharing service).
//!
//! # Commands
//!
//! - `keygen` - Generate a new encryption key
//! - `show` - Print the ledger
//! - `set-category` - Map a description pattern to a category
//! - `rename-category` - Rename a category and its subcategories
//! - `exclude-category` - Exclude a category from totals, or include it again

mod commands;

use clap::{Parser, Subcommand};
use commands::Ledger;
use spendy_ledger::{SpendyAction, OBJECT_NAME};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Spendy ledger tools.
#[derive(Parser)]
#[command(name = "spendy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the encrypted ledger
    #[arg(global = true, short, long, env = "SPENDY_DIR")]
    dir: Option<PathBuf>,

    /// Base64 encryption key
    #[arg(global = true, short, long, env = "SPENDY_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Name of the ledger object
    #[arg(global = true, short, long, default_value = OBJECT_NAME)]
    name: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new encryption key
    Keygen,

    /// Print the ledger
    Show {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Map a description pattern to a category
    SetCategory {
        /// Description pattern
        pattern: String,
        /// Category, e.g. "food/groceries"
        category: String,
    },

    /// Rename a category and its subcategories
    RenameCategory {
        /// Current name
        category: String,
        /// New name
        renamed: String,
    },

    /// Exclude a category from totals
    ExcludeCategory {
        /// Category to exclude
        category: String,

        /// Include the category again instead
        #[arg(short, long)]
        include: bool,
    },
}

impl Cli {
    fn ledger(&self) -> Result<Ledger, Box<dyn std::error::Error>> {
        let dir = self
            .dir
            .clone()
            .ok_or("Ledger directory required (--dir or SPENDY_DIR)")?;
        let key = self
            .key
            .clone()
            .ok_or("Encryption key required (--key or SPENDY_KEY)")?;
        Ok(Ledger::new(dir, key, self.name.clone()))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Keygen => commands::keygen::run(),
        Commands::Show { format } => commands::show::run(&cli.ledger()?, format).await?,
        Commands::SetCategory { pattern, category } => {
            let action = SpendyAction::SetCategory {
                pattern: pattern.clone(),
                category: category.clone(),
            };
            commands::edit::run(&cli.ledger()?, action).await?;
        }
        Commands::RenameCategory { category, renamed } => {
            let action = SpendyAction::RenameCategory {
                category: category.clone(),
                renamed: renamed.clone(),
            };
            commands::edit::run(&cli.ledger()?, action).await?;
        }
        Commands::ExcludeCategory { category, include } => {
            let action = SpendyAction::ExcludeCategory {
                category: category.clone(),
                excluded: !include,
            };
            commands::edit::run(&cli.ledger()?, action).await?;
        }
    }

    Ok(())
}
