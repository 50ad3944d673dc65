// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `minions validate <file>`: run the structural check locally, no daemon needed.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use minions_orchestrator_core::infrastructure::source_validator::{SourceValidator, SourceVerdict, ENTRY_POINT};

pub async fn handle_command(file: PathBuf) -> Result<()> {
    let verdict = check_file(&file).await?;

    if verdict.valid {
        println!("{}", format!("✓ {} is a deployable agent", file.display()).green());
        if !verdict.defines_entry_point {
            println!(
                "{}",
                format!("⚠ No '{}' function is defined; the wrapper calls it", ENTRY_POINT).yellow()
            );
        }
        return Ok(());
    }

    println!("{}", format!("✗ {} is not a deployable agent", file.display()).red());
    if let Some(reason) = &verdict.reason {
        println!("  {}", reason);
    }
    std::process::exit(1);
}

pub async fn check_file(file: &Path) -> Result<SourceVerdict> {
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    Ok(SourceValidator::new().inspect(&source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_file_reads_and_inspects() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("agent.py");
        std::fs::write(
            &good,
            "import gradio as gr\n\ndef predict(x):\n    return x\n\ngr.Interface(fn=predict, inputs='text', outputs='text')\n",
        )
        .unwrap();
        let bad = dir.path().join("plain.py");
        std::fs::write(&bad, "print('hello')\n").unwrap();

        let verdict = check_file(&good).await.unwrap();
        assert!(verdict.valid);
        assert!(verdict.defines_entry_point);

        let verdict = check_file(&bad).await.unwrap();
        assert!(!verdict.valid);
        assert!(verdict.reason.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        assert!(check_file(Path::new("/nonexistent/agent.py")).await.is_err());
    }
}
