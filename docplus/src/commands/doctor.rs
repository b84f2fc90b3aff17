//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use docplus_sdk::extensions::ManifestStore;
use docplus_sdk::open_storage;

use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "docplus Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Validate configuration
    print!("  Configuration: ");
    match config.host.validate() {
        Ok(()) => println!("{}", "✓ valid".green()),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Configuration is invalid");
        }
    }

    // Check plugins directory
    print!("  Plugins directory: ");
    if config.host.plugins_dir.exists() {
        let store = ManifestStore::new(&config.host.plugins_dir);
        match store.list().await {
            Ok(manifests) => {
                let enabled = manifests.iter().filter(|m| m.enabled).count();
                println!(
                    "{}",
                    format!("✓ {} manifests ({} enabled)", manifests.len(), enabled).green()
                );
            }
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Plugins directory is unreadable");
            }
        }
    } else {
        println!("{}", "○ will be created".yellow());
    }

    // Check storage backend
    print!("  Storage: ");
    match open_storage(&config.host.storage) {
        Ok(_) => match &config.host.storage.database_path {
            Some(path) => println!("{}", format!("✓ {}", path.display()).green()),
            None => println!("{}", "○ in-memory (not persisted)".yellow()),
        },
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Cannot open extension storage");
        }
    }

    // Check AI settings
    print!("  AI provider: ");
    if config.host.ai.is_configured() {
        println!("{}", format!("✓ {}", config.host.ai.provider).green());
    } else {
        println!("{}", "○ not configured".yellow());
    }

    // Command allowlist
    print!("  Command allowlist: ");
    let allowlist = config.host.commands.allowlist();
    if allowlist.is_empty() {
        println!("{}", "○ empty (extensions cannot invoke commands)".yellow());
    } else {
        println!("{}", format!("✓ {} commands", allowlist.len()).green());
    }

    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
