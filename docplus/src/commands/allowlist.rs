//! Command allowlist inspection.

use anyhow::{Result, bail};
use colored::Colorize;
use docplus_core::DEFAULT_ALLOWED_COMMANDS;

use crate::config::Config;

/// Execute commands command.
pub fn execute(check: Option<&str>, config: &Config) -> Result<()> {
    let allowlist = config.host.commands.allowlist();

    if let Some(name) = check {
        if allowlist.is_allowed(name) {
            println!("{} {} is allowed", "✓".green(), name.bold());
            return Ok(());
        }
        bail!("Command '{}' is not in the allowlist", name);
    }

    let source = if config.host.commands.allowed.is_some() {
        "from config"
    } else {
        "built-in defaults"
    };

    println!(
        "{} {}",
        "Allowed Commands".bold(),
        format!("({}, {})", allowlist.len(), source).dimmed()
    );
    println!("{}", "═".repeat(60));
    for name in allowlist.names() {
        let marker = if DEFAULT_ALLOWED_COMMANDS.contains(&name.as_str()) {
            "●".green()
        } else {
            "+".cyan()
        };
        println!("{} {}", marker, name);
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_check_default_allowlist() {
        let config = Config::default();

        assert_ok!(execute(Some("read_file"), &config));
        let err = assert_err!(execute(Some("delete_project"), &config));
        assert!(err.to_string().contains("delete_project"));
    }

    #[test]
    fn test_check_configured_allowlist() {
        let mut config = Config::default();
        config.host = config.host.with_allowed_commands(["list_documents"]);

        assert_ok!(execute(Some("list_documents"), &config));
        assert_err!(execute(Some("read_file"), &config));
        assert_ok!(execute(None, &config));
    }
}
