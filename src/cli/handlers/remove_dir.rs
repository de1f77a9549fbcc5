use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

use crate::{
    cli::{GlobalOptions, handlers::commons},
    core::{paths, store::JsonStore},
    models::GlobalConfig,
    system::prompt::{DialoguerPrompter, Prompter},
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Unregisters a script directory.")]
struct RemoveDirArgs {
    /// The directory to unregister. Asked for when omitted and more than one is registered.
    path: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

pub fn handle(args: Vec<String>, _options: GlobalOptions) -> Result<()> {
    let remove_args = RemoveDirArgs::try_parse_from(&args)?;
    let mut global = commons::open_global_store()?;

    if global.get().script_dirs.is_empty() {
        println!("{}", t!("dirs.info.none_registered").yellow());
        return Ok(());
    }

    let Some(target) = unregister(&mut global, &DialoguerPrompter::new(), &remove_args)? else {
        println!("{}", t!("common.info.operation_cancelled"));
        return Ok(());
    };

    println!(
        "{}",
        format!(t!("dirs.success.removed"), path = target.cyan()).green()
    );
    println!(
        "  {}",
        format!(
            t!("dirs.info.remaining"),
            count = global.get().script_dirs.len()
        )
        .dimmed()
    );
    Ok(())
}

/// Picks the directory to drop, confirms unless `--yes`, and saves the store.
/// Returns the removed entry, or `None` when the confirmation was declined.
fn unregister(
    global: &mut JsonStore<GlobalConfig>,
    prompter: &dyn Prompter,
    remove_args: &RemoveDirArgs,
) -> Result<Option<String>> {
    let registered = global.get().script_dirs.clone();
    let target = match &remove_args.path {
        Some(raw) => find_registered(&registered, raw)?,
        None => match registered.as_slice() {
            [only] => only.clone(),
            _ => {
                if !prompter.is_interactive() {
                    return Err(anyhow!(t!("dirs.error.path_required")));
                }
                let choice = prompter.select(t!("dirs.prompt.choose_remove"), &registered, 0)?;
                registered
                    .get(choice)
                    .cloned()
                    .ok_or_else(|| anyhow!(t!("dirs.error.path_required")))?
            }
        },
    };

    if !remove_args.yes {
        if !prompter.is_interactive() {
            return Err(anyhow!(t!("dirs.error.confirmation_required")));
        }
        let question = format!(t!("dirs.prompt.confirm_remove"), path = target);
        if !prompter.confirm(&question, false)? {
            return Ok(None);
        }
    }

    global.get_mut().script_dirs.retain(|dir| dir != &target);
    global.flush()?;
    log::debug!("Unregistered script directory '{}'", target);
    Ok(Some(target))
}

/// Matches the raw path as typed, expanded, or canonicalized.
fn find_registered(registered: &[String], raw: &str) -> Result<String> {
    let expanded = paths::expand_user_path(raw)?;
    let canonical = dunce::canonicalize(&expanded)
        .ok()
        .map(|p| p.display().to_string());

    registered
        .iter()
        .find(|dir| {
            dir.as_str() == raw || **dir == expanded || canonical.as_ref() == Some(*dir)
        })
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                t!("dirs.error.not_registered"),
                path = raw,
                registered = registered.join("\n  ")
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::prompt::scripted::ScriptedPrompter;
    use tempfile::{TempDir, tempdir};

    fn store_with(dirs: &[&str]) -> (TempDir, JsonStore<GlobalConfig>) {
        let home = tempdir().unwrap();
        let mut global = JsonStore::<GlobalConfig>::open(home.path().join("global.json")).unwrap();
        global.get_mut().script_dirs = dirs.iter().map(|d| d.to_string()).collect();
        global.flush().unwrap();
        (home, global)
    }

    fn args(path: Option<&str>, yes: bool) -> RemoveDirArgs {
        RemoveDirArgs {
            path: path.map(str::to_string),
            yes,
        }
    }

    #[test]
    fn test_choice_then_confirmation_removes_and_persists() {
        let (home, mut global) = store_with(&["/a", "/b", "/c"]);
        let prompter = ScriptedPrompter::new(&["1", "y"]);

        let removed = unregister(&mut global, &prompter, &args(None, false)).unwrap();
        assert_eq!(removed.as_deref(), Some("/b"));
        assert_eq!(prompter.asked.borrow().len(), 2);

        let reloaded = JsonStore::<GlobalConfig>::open(home.path().join("global.json")).unwrap();
        assert_eq!(reloaded.get().script_dirs, vec!["/a", "/c"]);
    }

    #[test]
    fn test_declined_confirmation_keeps_everything() {
        let (_home, mut global) = store_with(&["/only"]);
        let prompter = ScriptedPrompter::new(&["n"]);

        let removed = unregister(&mut global, &prompter, &args(None, false)).unwrap();
        assert_eq!(removed, None);
        assert_eq!(global.get().script_dirs, vec!["/only"]);
    }

    #[test]
    fn test_yes_skips_the_confirmation() {
        let (_home, mut global) = store_with(&["/a", "/b"]);
        let prompter = ScriptedPrompter::offline();

        let removed = unregister(&mut global, &prompter, &args(Some("/a"), true)).unwrap();
        assert_eq!(removed.as_deref(), Some("/a"));
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn test_without_terminal_path_and_yes_are_required() {
        let (_home, mut global) = store_with(&["/a", "/b"]);
        let prompter = ScriptedPrompter::offline();

        let err = unregister(&mut global, &prompter, &args(None, true)).unwrap_err();
        assert_eq!(err.to_string(), t!("dirs.error.path_required"));
        let err = unregister(&mut global, &prompter, &args(Some("/b"), false)).unwrap_err();
        assert_eq!(err.to_string(), t!("dirs.error.confirmation_required"));
        assert_eq!(global.get().script_dirs.len(), 2);
    }

    #[test]
    fn test_find_registered_by_expanded_or_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dunce::canonicalize(dir.path()).unwrap().display().to_string();
        let registered = vec!["/elsewhere".to_string(), canonical.clone()];

        let with_slash = format!("{}/", dir.path().display());
        assert_eq!(find_registered(&registered, &with_slash).unwrap(), canonical);
        assert_eq!(find_registered(&registered, "/elsewhere").unwrap(), "/elsewhere");
    }

    #[test]
    fn test_unknown_path_lists_registered_dirs() {
        let registered = vec!["/a".to_string(), "/b".to_string()];
        let err = find_registered(&registered, "/definitely/not/registered").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/definitely/not/registered"));
        assert!(message.contains("/a") && message.contains("/b"));
    }
}
