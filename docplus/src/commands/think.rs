//! Think-tag inspection.
//!
//! Splits a saved model response into the visible content an extension would
//! receive and the reasoning shown on the thinking channel.

use anyhow::{Context, Result};
use colored::Colorize;
use docplus_core::{ThinkParseResult, parse_think_tags};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Execute think command.
pub async fn execute(file: Option<PathBuf>, json: bool) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };

    let result = parse_think_tags(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render(&result));
    }
    Ok(())
}

fn render(result: &ThinkParseResult) -> String {
    let mut out = String::new();

    if !result.thinking.is_empty() {
        let title = if result.is_thinking {
            "Thinking (in progress)"
        } else {
            "Thinking"
        };
        out.push_str(&format!("{}\n", title.cyan().bold()));
        out.push_str(&format!("{}\n", "─".repeat(50)));
        for line in result.thinking.lines() {
            out.push_str(&format!("  {}\n", line.dimmed()));
        }
        out.push('\n');
    }

    out.push_str(&format!("{}\n", "Content".bold()));
    out.push_str(&format!("{}\n", "─".repeat(50)));
    if result.content.is_empty() {
        out.push_str(&format!("  {}\n", "(empty)".yellow()));
    } else {
        out.push_str(&result.content);
        out.push('\n');
    }
    out
}
