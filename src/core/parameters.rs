// src/core/parameters.rs

use crate::{
    core::paths::{self, PathError},
    models::{Script, ScriptArg, ScriptOpt, StoredValue},
    system::{
        git::WorktreeSource,
        prompt::{PromptError, Prompter},
    },
};
use colored::*;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("No value is stored for '{key}' and there is no terminal to ask for one. Run vss interactively once to answer it.")]
    NonInteractive { key: String },
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// What one resolution walk did, by key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Arguments that received a new value.
    pub args: Vec<String>,
    /// Options that received a new value (including an explicit "none").
    pub opts: Vec<String>,
    /// Options left unset on purpose (missing base directory, no worktrees).
    pub skipped: Vec<String>,
}

/// Fills in every argument and option the selected scripts declare, asking only for
/// the keys that have no stored value yet.
pub struct ParameterResolver<'a> {
    prompter: &'a dyn Prompter,
    worktrees: &'a dyn WorktreeSource,
    arg_default: Option<String>,
}

impl std::fmt::Debug for ParameterResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("interactive", &self.prompter.is_interactive())
            .field("arg_default", &self.arg_default)
            .finish()
    }
}

impl<'a> ParameterResolver<'a> {
    pub fn new(prompter: &'a dyn Prompter, worktrees: &'a dyn WorktreeSource) -> Self {
        Self {
            prompter,
            worktrees,
            arg_default: dirs::home_dir().map(|home| home.display().to_string()),
        }
    }

    /// Walks `scripts` in the given (execution) order; per script, arguments come before
    /// options so a worktree option can use an argument resolved just before it.
    ///
    /// A stored `false` or `null` counts as present and is never asked again.
    pub fn resolve(
        &self,
        scripts: &[Script],
        args: &mut BTreeMap<String, StoredValue>,
        opts: &mut BTreeMap<String, Option<StoredValue>>,
    ) -> Result<ResolutionReport, ParameterError> {
        let mut report = ResolutionReport::default();

        for script in scripts {
            log::debug!("Collecting arguments for '{}'", script.name);
            for arg in &script.args {
                if args.contains_key(&arg.name) {
                    continue;
                }
                let value = self.ask_arg(arg)?;
                args.insert(arg.name.clone(), StoredValue::Text(value));
                report.args.push(arg.name.clone());
            }

            log::debug!("Collecting options for '{}'", script.name);
            for opt in &script.opts {
                if opts.contains_key(opt.name()) {
                    continue;
                }
                match self.ask_opt(opt, args)? {
                    OptOutcome::Value(value) => {
                        opts.insert(opt.name().to_string(), value);
                        report.opts.push(opt.name().to_string());
                    }
                    OptOutcome::Unset => report.skipped.push(opt.name().to_string()),
                }
            }
        }

        Ok(report)
    }

    fn ask_arg(&self, arg: &ScriptArg) -> Result<String, ParameterError> {
        if !self.prompter.is_interactive() {
            return Err(ParameterError::NonInteractive {
                key: arg.name.clone(),
            });
        }

        let prompt = format!(
            t!("parameters.prompt.arg"),
            name = arg.name.cyan(),
            description = arg.description
        );
        loop {
            let answer = self.prompter.input(&prompt, self.arg_default.as_deref())?;
            if answer.trim().is_empty() {
                eprintln!("{}", t!("parameters.error.value_required").red());
                continue;
            }
            return Ok(paths::expand_user_path(&answer)?);
        }
    }

    fn ask_opt(
        &self,
        opt: &ScriptOpt,
        args: &BTreeMap<String, StoredValue>,
    ) -> Result<OptOutcome, ParameterError> {
        match opt {
            ScriptOpt::Boolean { default, .. } => {
                let value = if self.prompter.is_interactive() {
                    self.prompter
                        .confirm(opt.description(), default.unwrap_or(false))?
                } else {
                    default.ok_or_else(|| non_interactive(opt))?
                };
                Ok(OptOutcome::Value(Some(StoredValue::Bool(value))))
            }
            ScriptOpt::String {
                default,
                optional,
                pattern,
                pattern_help,
                ..
            } => {
                if !self.prompter.is_interactive() {
                    return match default {
                        Some(d) if pattern.as_ref().is_none_or(|p| p.is_match(d)) => {
                            Ok(OptOutcome::Value(Some(StoredValue::Text(d.clone()))))
                        }
                        None if *optional => Ok(OptOutcome::Value(None)),
                        _ => Err(non_interactive(opt)),
                    };
                }

                loop {
                    let answer = self.prompter.input(opt.description(), default.as_deref())?;
                    if answer.is_empty() {
                        if *optional {
                            return Ok(OptOutcome::Value(None));
                        }
                        let message = pattern_help
                            .as_deref()
                            .unwrap_or(t!("parameters.error.value_required"));
                        eprintln!("{}", message.red());
                        continue;
                    }
                    if let Some(pattern) = pattern
                        && !pattern.is_match(&answer)
                    {
                        let message = pattern_help
                            .as_deref()
                            .unwrap_or(t!("parameters.error.invalid_format"));
                        eprintln!("{}", message.red());
                        continue;
                    }
                    return Ok(OptOutcome::Value(Some(StoredValue::Text(answer))));
                }
            }
            ScriptOpt::Worktree {
                base_dir_arg,
                default,
                optional,
                ..
            } => self.ask_worktree(opt, base_dir_arg, default.as_deref(), *optional, args),
        }
    }

    fn ask_worktree(
        &self,
        opt: &ScriptOpt,
        base_dir_arg: &str,
        default: Option<&str>,
        optional: bool,
        args: &BTreeMap<String, StoredValue>,
    ) -> Result<OptOutcome, ParameterError> {
        let Some(StoredValue::Text(base_dir)) = args.get(base_dir_arg) else {
            log::warn!(
                "Base directory argument '{}' is not set; skipping option '{}'",
                base_dir_arg,
                opt.name()
            );
            eprintln!(
                "{} {}",
                t!("common.warning").yellow().bold(),
                format_args!(
                    t!("parameters.warning.base_dir_missing"),
                    arg = base_dir_arg,
                    option = opt.name()
                )
            );
            return Ok(OptOutcome::Unset);
        };

        let base = Path::new(base_dir);
        let worktrees = self.worktrees.list(base);
        log::debug!("Found {} worktree(s) under '{}'", worktrees.len(), base_dir);

        if worktrees.is_empty() && optional {
            return Ok(OptOutcome::Unset);
        }

        // Choice 0 is the base directory; the declared default moves the cursor to its worktree.
        let default_choice = default
            .and_then(|wanted| {
                let wanted = paths::expand_user_path(wanted).unwrap_or_else(|_| wanted.to_string());
                worktrees.iter().position(|wt| wt.path == Path::new(&wanted))
            })
            .map_or(0, |i| i + 1);

        let choice = if self.prompter.is_interactive() {
            let mut choices = vec![format!(t!("parameters.choice.use_base_dir"), path = base_dir)];
            choices.extend(worktrees.iter().map(|wt| wt.display_name(base)));
            self.prompter.select(opt.description(), &choices, default_choice)?
        } else {
            default_choice
        };
        let value = choice
            .checked_sub(1)
            .and_then(|i| worktrees.get(i))
            .map(|wt| StoredValue::Text(wt.path.display().to_string()));
        Ok(OptOutcome::Value(value))
    }
}

enum OptOutcome {
    /// Store this value; `None` is stored as `null` and never exported.
    Value(Option<StoredValue>),
    /// Leave the option absent from the store.
    Unset,
}

fn non_interactive(opt: &ScriptOpt) -> ParameterError {
    ParameterError::NonInteractive {
        key: opt.name().to_string(),
    }
}
