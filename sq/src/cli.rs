//! CLI argument parsing for the sq operator tool

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sq")]
#[command(author, version, about = "Inspect and repair a speech bundle queue", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Queue root (overrides config)
    #[arg(short, long)]
    pub queue: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List pending and checked-out bundles
    List,

    /// List archived bundles
    Archive,

    /// Restore bundles left checked out by a dead consumer
    Recover,

    /// Delete old archive entries
    Prune {
        /// Archive entries to keep (default: config archive-keep)
        #[arg(short, long)]
        keep: Option<usize>,
    },

    /// Check out the oldest pending bundle
    Checkout,

    /// Return a checked-out bundle to pending
    Release {
        /// Bundle ID
        #[arg(required = true)]
        id: String,
    },

    /// Delete a checked-out bundle without archiving it
    Discard {
        /// Bundle ID
        #[arg(required = true)]
        id: String,
    },

    /// Archive a checked-out bundle
    Complete {
        /// Bundle ID
        #[arg(required = true)]
        id: String,
    },
}
