use anyhow::{Result, anyhow};

use crate::cli::{Cli, GlobalOptions, handlers};

/// A system command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, GlobalOptions) -> Result<()>,
}

/// The single source of truth for all system commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run::handle,
    },
    CommandDefinition {
        name: "add-script-dir",
        aliases: &["add"],
        handler: handlers::add_dir::handle,
    },
    CommandDefinition {
        name: "remove-script-dir",
        aliases: &["rm"],
        handler: handlers::remove_dir::handle,
    },
    CommandDefinition {
        name: "list-script-dirs",
        aliases: &["dirs"],
        handler: handlers::list_dirs::handle,
    },
    CommandDefinition {
        name: "list-scripts",
        aliases: &["ls"],
        handler: handlers::list_scripts::handle,
    },
    CommandDefinition {
        name: "new",
        aliases: &["new-script"],
        handler: handlers::new_script::handle,
    },
    CommandDefinition {
        name: "completions",
        aliases: &[],
        handler: handlers::completions::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes to a handler. No command means `run`.
pub fn dispatch(cli: Cli) -> Result<()> {
    log::debug!("Dispatching: {:?}", cli);
    let options = GlobalOptions::from(&cli);

    let Some(name) = cli.command else {
        return handlers::run::handle(cli.args, options);
    };

    let command = find_command(&name).ok_or_else(|| {
        let known: Vec<&str> = COMMAND_REGISTRY.iter().map(|c| c.name).collect();
        anyhow!(
            t!("cli.error.unknown_command"),
            name = name,
            known = known.join(", ")
        )
    })?;
    (command.handler)(cli.args, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_found_by_name_and_alias() {
        assert_eq!(find_command("add").map(|c| c.name), Some("add-script-dir"));
        assert_eq!(find_command("list-scripts").map(|c| c.name), Some("list-scripts"));
        assert!(find_command("deploy.sh").is_none());
        assert_eq!(find_command("new").map(|c| c.name), Some("new"));
        assert_eq!(find_command("completions").map(|c| c.name), Some("completions"));
    }

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut all: Vec<&str> = COMMAND_REGISTRY
            .iter()
            .flat_map(|c| std::iter::once(c.name).chain(c.aliases.iter().copied()))
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let cli = Cli {
            command: Some("frobnicate".to_string()),
            ..Cli::default()
        };
        let err = dispatch(cli).unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
        assert!(err.to_string().contains("add-script-dir"));
    }
}
