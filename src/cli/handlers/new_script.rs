use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{
    cli::{GlobalOptions, handlers::commons},
    constants::{ANNOTATION_NAMESPACE, SCRIPT_EXTENSION},
    models::{OptPattern, Requirement, Script, ScriptArg, ScriptOpt},
    system::{
        prompt::{DialoguerPrompter, PromptError, Prompter},
        runtime,
    },
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Creates an annotated script in a registered directory, step by step."
)]
struct NewScriptArgs {}

const SHELLS: [&str; 2] = ["bash", "zsh"];

/// Everything the wizard collected about the new script.
#[derive(Debug, Clone)]
struct ScriptDraft {
    file_name: String,
    name: String,
    description: Option<String>,
    shell: String,
    after: Vec<String>,
    requires: Vec<Requirement>,
    args: Vec<ScriptArg>,
    opts: Vec<ScriptOpt>,
    stdin_inherit: bool,
}

impl ScriptDraft {
    /// The script text: shebang, annotations, then an empty body.
    fn render(&self) -> Result<String, serde_json::Error> {
        let mut lines = vec![format!("#!/usr/bin/env {}", self.shell), String::new()];
        lines.push(annotation("name", &self.name));
        if let Some(description) = &self.description {
            lines.push(annotation("description", description));
        }
        if !self.after.is_empty() {
            lines.push(annotation("after", &self.after.join(" ")));
        }
        for requirement in &self.requires {
            lines.push(annotation(
                "requires",
                &format!("{} {}", requirement.script, requirement.variables.join(" ")),
            ));
        }
        for arg in &self.args {
            lines.push(annotation("arg", &format!("{} {}", arg.name, arg.description)));
        }
        for opt in &self.opts {
            lines.push(annotation("opt", &serde_json::to_string(opt)?));
        }
        if self.stdin_inherit {
            lines.push(annotation("stdin", "inherit"));
        }
        lines.extend([String::new(), "set -e".to_string(), String::new()]);
        Ok(lines.join("\n") + "\n")
    }
}

fn annotation(field: &str, value: &str) -> String {
    format!("# @{}.{} {}", ANNOTATION_NAMESPACE, field, value)
}

pub fn handle(args: Vec<String>, _options: GlobalOptions) -> Result<()> {
    NewScriptArgs::try_parse_from(&args)?;
    let global = commons::open_global_store()?;
    let dirs = global.get().script_dirs.clone();
    if dirs.is_empty() {
        return Err(anyhow!(t!("new.error.no_dirs")));
    }

    let prompter = DialoguerPrompter::new();
    if !prompter.is_interactive() {
        return Err(anyhow!(t!("new.error.not_interactive")));
    }

    // Existing scripts are offered as `after` and `requires` targets.
    let workspace = commons::prepare_workspace(global.get())?;
    let existing = commons::discover(&workspace.repository).scripts;

    println!("{}\n", t!("new.info.title").cyan().bold());
    let wizard = ScriptWizard::new(&prompter, &existing);
    let target_dir = wizard.target_dir(&dirs)?;
    let draft = wizard.draft(&target_dir)?;
    let path = write_script(&target_dir, &draft)?;

    println!(
        "\n{}",
        format!(t!("new.success.created"), path = path.display().to_string().cyan()).green()
    );
    println!(
        "  {}",
        format!(
            t!("new.info.summary"),
            args = draft.args.len(),
            opts = draft.opts.len(),
            after = draft.after.len()
        )
        .dimmed()
    );
    Ok(())
}

/// Writes the draft as a new executable file. An existing file is never overwritten.
fn write_script(dir: &Path, draft: &ScriptDraft) -> Result<PathBuf> {
    let path = dir.join(&draft.file_name);
    let content = draft.render()?;
    let write_context = || format!(t!("new.error.write"), path = path.display());

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(write_context)?;
    file.write_all(content.as_bytes()).with_context(write_context)?;
    runtime::set_executable(&path)?;

    log::debug!("Created '{}' ({} bytes)", path.display(), content.len());
    Ok(path)
}

/// Checks a file name typed without its extension and returns it with `.sh` appended.
fn check_file_name(raw: &str, dir: &Path) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(t!("new.error.file_name_empty").to_string());
    }
    if raw.contains(['/', '\\']) {
        return Err(t!("new.error.file_name_separator").to_string());
    }
    let extension = format!(".{}", SCRIPT_EXTENSION);
    if raw.ends_with(&extension) {
        return Err(t!("new.error.file_name_extension").to_string());
    }
    let file_name = format!("{}{}", raw, extension);
    let path = dir.join(&file_name);
    if path.exists() {
        return Err(format!(t!("new.error.file_exists"), path = path.display()));
    }
    Ok(file_name)
}

/// An environment variable name: ASCII letters, digits and `_`, not starting with a digit.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Option types offered by the wizard, in `ScriptOpt` order. A worktree option needs an
/// argument to take its base directory from.
fn opt_kinds(has_args: bool) -> Vec<String> {
    let mut kinds = vec!["boolean".to_string(), "string".to_string()];
    if has_args {
        kinds.push("worktree".to_string());
    }
    kinds
}

fn print_problem(message: &str) {
    eprintln!("{}", message.red());
}

/// Asks, step by step, for everything a new script declares.
struct ScriptWizard<'a> {
    prompter: &'a dyn Prompter,
    /// File names of the discovered scripts, first occurrence only.
    targets: Vec<String>,
    labels: Vec<String>,
}

impl<'a> ScriptWizard<'a> {
    fn new(prompter: &'a dyn Prompter, existing: &[Script]) -> Self {
        let mut targets: Vec<String> = Vec::new();
        let mut labels = Vec::new();
        for script in existing {
            let file_name = script.id.file_name().to_string();
            if !targets.contains(&file_name) {
                targets.push(file_name);
                labels.push(script.label());
            }
        }
        Self {
            prompter,
            targets,
            labels,
        }
    }

    fn target_dir(&self, dirs: &[String]) -> Result<PathBuf, PromptError> {
        if let [only] = dirs {
            return Ok(PathBuf::from(only));
        }
        let choice = self.prompter.select(t!("new.prompt.target_dir"), dirs, 0)?;
        Ok(PathBuf::from(dirs.get(choice).map_or("", String::as_str)))
    }

    fn draft(&self, dir: &Path) -> Result<ScriptDraft, PromptError> {
        let file_name = self.file_name(dir)?;
        let name = self.name(&file_name)?;
        let description = self.optional_text(t!("new.prompt.description"))?;
        let shell_choice = self.prompter.select(
            t!("new.prompt.shell"),
            &SHELLS.map(str::to_string),
            0,
        )?;
        let shell = SHELLS.get(shell_choice).copied().unwrap_or("bash").to_string();
        let after = self.after()?;
        let requires = self.requires()?;
        let args = self.args()?;
        let opts = self.opts(&args)?;
        let stdin_inherit = self.prompter.confirm(t!("new.prompt.stdin_inherit"), false)?;

        Ok(ScriptDraft {
            file_name,
            name,
            description,
            shell,
            after,
            requires,
            args,
            opts,
            stdin_inherit,
        })
    }

    fn file_name(&self, dir: &Path) -> Result<String, PromptError> {
        loop {
            let raw = self.prompter.input(t!("new.prompt.file_name"), None)?;
            match check_file_name(&raw, dir) {
                Ok(file_name) => return Ok(file_name),
                Err(problem) => print_problem(&problem),
            }
        }
    }

    /// An empty answer takes the file name with dashes and underscores as spaces.
    fn name(&self, file_name: &str) -> Result<String, PromptError> {
        let default = file_name
            .strip_suffix(&format!(".{}", SCRIPT_EXTENSION))
            .unwrap_or(file_name)
            .replace(['_', '-'], " ");
        let answer = self.prompter.input(t!("new.prompt.name"), Some(&default))?;
        let answer = answer.trim();
        Ok(if answer.is_empty() { default } else { answer.to_string() })
    }

    fn optional_text(&self, prompt: &str) -> Result<Option<String>, PromptError> {
        let answer = self.prompter.input(prompt, None)?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }

    fn required_text(&self, prompt: &str) -> Result<String, PromptError> {
        loop {
            if let Some(answer) = self.optional_text(prompt)? {
                return Ok(answer);
            }
            print_problem(t!("parameters.error.value_required"));
        }
    }

    /// A variable name that is valid and not in `taken`.
    fn identifier(&self, prompt: &str, taken: &[&str]) -> Result<String, PromptError> {
        loop {
            let answer = self.prompter.input(prompt, None)?;
            let answer = answer.trim();
            if !is_identifier(answer) {
                print_problem(t!("new.error.identifier"));
            } else if taken.contains(&answer) {
                print_problem(&format!(t!("new.error.duplicate_name"), name = answer));
            } else {
                return Ok(answer.to_string());
            }
        }
    }

    fn another(&self) -> Result<bool, PromptError> {
        self.prompter.confirm(t!("new.prompt.another"), false)
    }

    fn after(&self) -> Result<Vec<String>, PromptError> {
        if self.targets.is_empty() || !self.prompter.confirm(t!("new.prompt.add_after"), false)? {
            return Ok(Vec::new());
        }
        let checked = vec![false; self.labels.len()];
        let chosen = self
            .prompter
            .multi_select(t!("new.prompt.after"), &self.labels, &checked)?;
        Ok(chosen
            .iter()
            .filter_map(|&i| self.targets.get(i).cloned())
            .collect())
    }

    fn requires(&self) -> Result<Vec<Requirement>, PromptError> {
        let mut requirements = Vec::new();
        if self.targets.is_empty() || !self.prompter.confirm(t!("new.prompt.add_requires"), false)? {
            return Ok(requirements);
        }

        loop {
            let choice = self
                .prompter
                .select(t!("new.prompt.requires_script"), &self.labels, 0)?;
            let Some(script) = self.targets.get(choice).cloned() else {
                continue;
            };
            let variables = loop {
                let answer = self.prompter.input(t!("new.prompt.requires_variables"), None)?;
                let variables: Vec<String> = answer.split_whitespace().map(str::to_string).collect();
                if variables.is_empty() {
                    print_problem(t!("new.error.variables_required"));
                } else if !variables.iter().all(|v| is_identifier(v)) {
                    print_problem(t!("new.error.identifier"));
                } else {
                    break variables;
                }
            };
            requirements.push(Requirement { script, variables });

            if !self.another()? {
                return Ok(requirements);
            }
        }
    }

    fn args(&self) -> Result<Vec<ScriptArg>, PromptError> {
        let mut args: Vec<ScriptArg> = Vec::new();
        if !self.prompter.confirm(t!("new.prompt.add_args"), false)? {
            return Ok(args);
        }

        loop {
            let taken: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
            let name = self.identifier(t!("new.prompt.arg_name"), &taken)?;
            let description = self.required_text(t!("new.prompt.arg_description"))?;
            args.push(ScriptArg { name, description });

            if !self.another()? {
                return Ok(args);
            }
        }
    }

    fn opts(&self, args: &[ScriptArg]) -> Result<Vec<ScriptOpt>, PromptError> {
        let mut opts: Vec<ScriptOpt> = Vec::new();
        if !self.prompter.confirm(t!("new.prompt.add_opts"), false)? {
            return Ok(opts);
        }

        let kinds = opt_kinds(!args.is_empty());
        let arg_names: Vec<String> = args.iter().map(|a| a.name.clone()).collect();

        loop {
            let kind = self.prompter.select(t!("new.prompt.opt_type"), &kinds, 0)?;
            let taken: Vec<&str> = arg_names
                .iter()
                .map(String::as_str)
                .chain(opts.iter().map(ScriptOpt::name))
                .collect();
            let name = self.identifier(t!("new.prompt.opt_name"), &taken)?;
            let description = self.required_text(t!("new.prompt.opt_description"))?;
            let optional = self.prompter.confirm(t!("new.prompt.opt_optional"), true)?;

            let opt = match kind {
                0 => ScriptOpt::Boolean {
                    name,
                    description,
                    default: if self.prompter.confirm(t!("new.prompt.set_default"), false)? {
                        Some(self.prompter.confirm(t!("new.prompt.default_value"), false)?)
                    } else {
                        None
                    },
                    optional,
                },
                1 => {
                    let default = if self.prompter.confirm(t!("new.prompt.set_default"), false)? {
                        self.optional_text(t!("new.prompt.default_value"))?
                    } else {
                        None
                    };
                    let (pattern, pattern_help) = self.pattern()?;
                    ScriptOpt::String {
                        name,
                        description,
                        default,
                        optional,
                        pattern,
                        pattern_help,
                    }
                }
                _ => {
                    let choice = self
                        .prompter
                        .select(t!("new.prompt.base_dir_arg"), &arg_names, 0)?;
                    ScriptOpt::Worktree {
                        name,
                        description,
                        base_dir_arg: arg_names.get(choice).cloned().unwrap_or_default(),
                        default: None,
                        optional,
                    }
                }
            };
            opts.push(opt);

            if !self.another()? {
                return Ok(opts);
            }
        }
    }

    fn pattern(&self) -> Result<(Option<OptPattern>, Option<String>), PromptError> {
        if !self.prompter.confirm(t!("new.prompt.add_pattern"), false)? {
            return Ok((None, None));
        }
        let pattern = loop {
            let raw = self.prompter.input(t!("new.prompt.pattern"), None)?;
            match OptPattern::new(raw.trim()) {
                Ok(pattern) => break pattern,
                Err(e) => print_problem(&format!(t!("new.error.invalid_pattern"), error = e)),
            }
        };
        let help = self.optional_text(t!("new.prompt.pattern_help"))?;
        Ok((Some(pattern), help))
    }
}
