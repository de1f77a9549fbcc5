use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::io::{self, Write};

use crate::cli::{Cli, GlobalOptions};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Prints a shell completion script for vss."
)]
struct CompletionsArgs {
    /// The shell to generate completions for.
    #[arg(value_enum)]
    shell: Shell,
}

pub fn handle(args: Vec<String>, _options: GlobalOptions) -> Result<()> {
    let completions_args = CompletionsArgs::try_parse_from(&args)?;
    write_completions(completions_args.shell, &mut io::stdout().lock())
}

fn write_completions(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    log::debug!("Generating {} completions for '{}'", shell, name);
    clap_complete::generate(shell, &mut command, name, out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(shell: Shell) -> String {
        let mut out = Vec::new();
        write_completions(shell, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_bash_completion_knows_the_global_flags() {
        let script = render(Shell::Bash);
        assert!(script.contains("_vss"));
        assert!(script.contains("--replay") && script.contains("--debug"));
    }

    #[test]
    fn test_every_supported_shell_renders() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::Elvish, Shell::PowerShell] {
            assert!(!render(shell).is_empty(), "{shell} produced nothing");
        }
    }

    #[test]
    fn test_shell_is_required_and_validated() {
        assert!(CompletionsArgs::try_parse_from(Vec::<String>::new()).is_err());
        assert!(CompletionsArgs::try_parse_from(["tcsh"]).is_err());
        let parsed = CompletionsArgs::try_parse_from(["zsh"]).unwrap();
        assert_eq!(parsed.shell, Shell::Zsh);
    }
}
