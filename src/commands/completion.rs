//! Completion command
//!
//! Generate shell completion scripts
//!
//! ```bash
//! # Bash
//! gridforge completion bash > /usr/local/share/bash-completion/completions/gridforge
//!
//! # Zsh
//! gridforge completion zsh > /usr/local/share/zsh/site-functions/_gridforge
//! ```

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

/// Outputs a completion script for the specified shell to stdout.
pub(crate) fn run(shell: Shell) -> Result<()> {
    let mut cmd = crate::Cli::command();

    generate(shell, &mut cmd, "gridforge", &mut io::stdout());

    Ok(())
}
