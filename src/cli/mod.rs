use clap::Parser;

use crate::{
    core::{orchestrator::RunError, parameters::ParameterError},
    system::{executor::ExecutionError, prompt::PromptError},
};

pub mod dispatcher;
pub mod handlers;

/// Builds the color-aware help text from the `<tag>` markup in the locale file.
fn build_help_string() -> &'static str {
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// vss: pick annotated shell scripts, answer their questions once, run them in order.
#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Skip the selection prompt and run the last selection again.
    #[arg(long, short)]
    pub replay: bool,

    /// Verbose logging for vss, and `VSS_DEBUG=1` for the scripts.
    #[arg(long, short)]
    pub debug: bool,

    /// A management command. Without one, vss runs scripts.
    pub command: Option<String>,

    /// Arguments for the command.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// The global flags, handed to every handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalOptions {
    pub replay: bool,
    pub debug: bool,
}

impl From<&Cli> for GlobalOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            replay: cli.replay,
            debug: cli.debug,
        }
    }
}

/// The process exit status for an error that ended the program.
///
/// A cancelled prompt is a normal way to leave (0), an interrupted script gives 130,
/// a failed script gives its own code and anything else gives 1.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    if prompt_cancelled(error) {
        return 0;
    }
    if run_interrupted(error) {
        return 130;
    }
    match error.downcast_ref::<RunError>() {
        Some(RunError::ScriptFailed { code, .. }) => *code,
        _ => 1,
    }
}

pub fn prompt_cancelled(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<PromptError>(), Some(PromptError::Interrupted))
        || matches!(
            error.downcast_ref::<ParameterError>(),
            Some(ParameterError::Prompt(PromptError::Interrupted))
        )
}

pub fn run_interrupted(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<ExecutionError>(), Some(ExecutionError::Interrupted))
        || matches!(
            error.downcast_ref::<RunError>(),
            Some(RunError::Execution(ExecutionError::Interrupted))
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_cancelled_prompts_exit_cleanly() {
        assert_eq!(exit_code_for(&PromptError::Interrupted.into()), 0);
        let wrapped = ParameterError::Prompt(PromptError::Interrupted);
        assert_eq!(exit_code_for(&wrapped.into()), 0);

        let broken = PromptError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert_eq!(exit_code_for(&broken.into()), 1);
    }

    #[test]
    fn test_interrupted_run_exits_with_130() {
        assert_eq!(exit_code_for(&ExecutionError::Interrupted.into()), 130);
        let wrapped = RunError::Execution(ExecutionError::Interrupted);
        assert_eq!(exit_code_for(&wrapped.into()), 130);
    }

    #[test]
    fn test_failed_script_code_is_propagated() {
        let failed = RunError::ScriptFailed {
            name: "deploy".into(),
            code: 42,
        };
        assert_eq!(exit_code_for(&failed.into()), 42);

        let with_context: anyhow::Result<()> = Err(RunError::ScriptFailed {
            name: "deploy".into(),
            code: 7,
        })
        .context("while running");
        assert_eq!(exit_code_for(&with_context.unwrap_err()), 7);
    }

    #[test]
    fn test_other_errors_exit_with_1() {
        assert_eq!(exit_code_for(&anyhow::anyhow!("store is corrupt")), 1);
        let missing = RunError::MissingRequirements {
            script: "smoke".into(),
            problems: vec!["'URL' was not exported by 'deploy.sh'".into()],
        };
        assert_eq!(exit_code_for(&missing.into()), 1);
    }

    #[test]
    fn test_bare_invocation_has_no_command() {
        let cli = Cli::try_parse_from(["vss"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.replay);
    }

    #[test]
    fn test_replay_flag_and_alias() {
        assert!(Cli::try_parse_from(["vss", "--replay"]).unwrap().replay);
        assert!(Cli::try_parse_from(["vss", "-r"]).unwrap().replay);
    }

    #[test]
    fn test_command_arguments_are_passed_through() {
        let cli = Cli::try_parse_from(["vss", "rm", "~/scripts", "--yes"]).unwrap();
        assert_eq!(cli.command.as_deref(), Some("rm"));
        assert_eq!(cli.args, vec!["~/scripts", "--yes"]);
    }
}
