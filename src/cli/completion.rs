//
//  git-providers
//  cli/completion.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! `gp completion <shell>`

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use super::{Cli, GlobalOptions};

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionCommand {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionCommand {
    pub async fn run(&self, _global: &GlobalOptions) -> Result<()> {
        generate(self.shell, &mut Cli::command(), "gp", &mut std::io::stdout());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_shell_argument() {
        let cli = Cli::try_parse_from(["gp", "completion", "zsh"]).unwrap();
        match cli.command {
            crate::cli::Commands::Completion(cmd) => assert_eq!(cmd.shell, Shell::Zsh),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_bash_script_names_binary() {
        let mut buf = Vec::new();
        generate(Shell::Bash, &mut Cli::command(), "gp", &mut buf);
        assert!(String::from_utf8(buf).unwrap().contains("_gp"));
    }
}
