//! Extension management commands.
//!
//! Lists and toggles plugin manifests under the configured plugins directory.

use anyhow::{Context, Result};
use chrono::DateTime;
use colored::Colorize;
use docplus_sdk::extensions::{ManifestStore, PluginManifest};
use serde::Serialize;

use crate::cli::{ExtAction, ExtCommand};
use crate::config::Config;

/// One line of `ext list` output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionRow {
    id: String,
    name: String,
    version: String,
    category: String,
    enabled: bool,
}

impl From<&PluginManifest> for ExtensionRow {
    fn from(manifest: &PluginManifest) -> Self {
        Self {
            id: manifest.id.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            category: manifest.descriptor().category.to_string(),
            enabled: manifest.enabled,
        }
    }
}

/// Execute extension command.
pub async fn execute(cmd: ExtCommand, config: &Config) -> Result<()> {
    let store = ManifestStore::new(&config.host.plugins_dir);
    match cmd.action {
        ExtAction::List { all, json } => list(&store, all, json).await,
        ExtAction::Show { id, json } => show(&store, &id, json).await,
        ExtAction::Enable { id } => set_enabled(&store, &id, true).await,
        ExtAction::Disable { id } => set_enabled(&store, &id, false).await,
    }
}

/// Manifests to list, disabled ones only with `all`.
async fn collect(store: &ManifestStore, all: bool) -> Result<Vec<PluginManifest>> {
    let manifests = store.list().await.context("Failed to read plugin manifests")?;
    Ok(manifests
        .into_iter()
        .filter(|m| all || m.enabled)
        .collect())
}

/// List installed extensions.
async fn list(store: &ManifestStore, all: bool, json: bool) -> Result<()> {
    let manifests = collect(store, all).await?;

    if json {
        let rows: Vec<ExtensionRow> = manifests.iter().map(ExtensionRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if manifests.is_empty() {
        println!("{}", "No extensions installed.".yellow());
        if !all {
            println!("  Use {} to show disabled extensions.", "--all".cyan());
        }
        return Ok(());
    }

    println!("{}", "Installed Extensions".bold());
    println!("{}", "═".repeat(60));

    for manifest in manifests {
        let state_icon = if manifest.enabled {
            "●".green()
        } else {
            "○".yellow()
        };

        println!(
            "{} {} {} {}",
            state_icon,
            manifest.name.bold(),
            format!("v{}", manifest.version).dimmed(),
            format!("({})", manifest.id).dimmed()
        );

        if !manifest.description.is_empty() {
            println!("  {}", manifest.description);
        }
    }

    println!();
    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(ts) if secs > 0 => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => "-".to_string(),
    }
}

/// Show extension details.
async fn show(store: &ManifestStore, id: &str, json: bool) -> Result<()> {
    let manifest = store
        .get(id)
        .await
        .with_context(|| format!("Extension not found: {}", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    let descriptor = manifest.descriptor();

    println!("{}", manifest.name.bold());
    println!("{}", "─".repeat(50));
    println!("  ID:        {}", manifest.id);
    println!("  Version:   {}", manifest.version);
    println!("  Type:      {}", manifest.plugin_type);
    println!("  Category:  {}", descriptor.category);
    println!(
        "  Enabled:   {}",
        if manifest.enabled {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    if !manifest.author.is_empty() {
        println!("  Author:    {}", manifest.author);
    }
    if !manifest.tags.is_empty() {
        println!("  Tags:      {}", manifest.tags.join(", "));
    }
    if let Some(ref permissions) = manifest.permissions {
        println!("  Permissions: {}", permissions.join(", "));
    }
    println!("  Created:   {}", format_timestamp(manifest.created_at));
    println!("  Updated:   {}", format_timestamp(manifest.updated_at));

    if !manifest.description.is_empty() {
        println!();
        println!("  {}", manifest.description);
    }

    Ok(())
}

/// Enable or disable an extension.
async fn set_enabled(store: &ManifestStore, id: &str, enabled: bool) -> Result<()> {
    let manifest = store
        .set_enabled(id, enabled)
        .await
        .with_context(|| format!("Failed to update extension: {}", id))?;

    let verb = if enabled { "Enabled" } else { "Disabled" };
    println!(
        "{} {} {}",
        "✓".green(),
        verb,
        format!("{} ({})", manifest.name, manifest.id).bold()
    );
    Ok(())
}
