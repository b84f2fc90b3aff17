//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// DocPlus Extension Host CLI
///
/// Inspect plugin manifests, think-tag output, the command allowlist and
/// extension storage.
#[derive(Parser, Debug)]
#[command(name = "docplus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plugin manifest management (list, show, enable, disable)
    Ext(ExtCommand),

    /// Split a model response into visible content and reasoning
    Think {
        /// File to parse (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the command allowlist
    Commands {
        /// Check whether a single command is allowed
        #[arg(short, long, value_name = "NAME")]
        check: Option<String>,
    },

    /// Extension storage inspection
    Storage(StorageCommand),

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Extension Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ExtCommand {
    #[command(subcommand)]
    pub action: ExtAction,
}

#[derive(Subcommand, Debug)]
pub enum ExtAction {
    /// List installed extensions
    List {
        /// Show all extensions (including disabled)
        #[arg(short, long)]
        all: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show extension details
    Show {
        /// Extension ID
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Enable an extension
    Enable {
        /// Extension ID
        id: String,
    },

    /// Disable an extension
    Disable {
        /// Extension ID
        id: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct StorageCommand {
    #[command(subcommand)]
    pub action: StorageAction,
}

#[derive(Subcommand, Debug)]
pub enum StorageAction {
    /// List the keys an extension has stored
    List {
        /// Extension ID
        ext: String,
    },

    /// Print one stored value
    Get {
        /// Extension ID
        ext: String,

        /// Storage key
        key: String,
    },

    /// Remove every entry an extension has stored
    Clear {
        /// Extension ID
        ext: String,
    },
}
