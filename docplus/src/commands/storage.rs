//! Extension storage inspection.
//!
//! Reads the same backend the host uses, through the per-extension namespace.

use anyhow::{Context, Result};
use colored::Colorize;
use docplus_sdk::extensions::NamespacedStorage;
use docplus_sdk::open_storage;
use docplus_sdk::utils::validate_id;

use crate::cli::{StorageAction, StorageCommand};
use crate::config::Config;

/// Execute storage command.
pub fn execute(cmd: StorageCommand, config: &Config) -> Result<()> {
    match cmd.action {
        StorageAction::List { ext } => list(&open(&ext, config)?),
        StorageAction::Get { ext, key } => get(&open(&ext, config)?, &key),
        StorageAction::Clear { ext } => clear(&open(&ext, config)?),
    }
}

fn open(extension_id: &str, config: &Config) -> Result<NamespacedStorage> {
    validate_id(extension_id).with_context(|| format!("Invalid extension ID: {}", extension_id))?;
    let backend = open_storage(&config.host.storage).context("Failed to open extension storage")?;
    Ok(NamespacedStorage::new(extension_id, backend))
}

/// List stored keys.
fn list(storage: &NamespacedStorage) -> Result<()> {
    let keys = storage.keys()?;
    if keys.is_empty() {
        println!("{}", "No stored keys.".yellow());
        return Ok(());
    }
    for key in keys {
        println!("  {}", key);
    }
    Ok(())
}

/// Print one stored value as JSON.
fn get(storage: &NamespacedStorage, key: &str) -> Result<()> {
    match storage.get(key)? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{} {}", "Not found:".yellow(), key),
    }
    Ok(())
}

/// Remove every entry of the extension.
fn clear(storage: &NamespacedStorage) -> Result<()> {
    let removed = storage.clear()?;
    println!("{} Removed {} entries", "✓".green(), removed);
    Ok(())
}
