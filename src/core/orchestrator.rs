// src/core/orchestrator.rs

use crate::{
    constants::{DEBUG_VAR, PALETTE, POST_ENV_FILE_VAR, PRE_ENV_FILE_VAR},
    core::resolver::Resolution,
    models::{Script, ScriptId, StdinMode, StoredValue},
    system::{
        executor::{self, ExecutionError, LaunchSpec, StdioMode},
        runtime,
    },
};
use colored::*;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Script '{name}' failed with exit code {code}")]
    ScriptFailed { name: String, code: i32 },
    #[error("Script '{script}' cannot start because required variables are missing:\n{}", .problems.iter().map(|p| format!("  - {}", p)).collect::<Vec<_>>().join("\n"))]
    MissingRequirements {
        script: String,
        problems: Vec<String>,
    },
    #[error("Could not create an environment snapshot file: {0}")]
    Snapshot(#[source] std::io::Error),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Per-script lifecycle. `Exited(0)` goes back to `Idle`; any other exit ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Announcing,
    Streaming,
    Inherited,
    Exited(i32),
    Aborted(i32),
}

/// The scripts that ran, in order, with what each one exported.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub executed: Vec<ScriptId>,
    pub exports: HashMap<ScriptId, HashMap<String, String>>,
}

/// Runs resolved, parameterized scripts one after the other through the runtime wrapper.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    runtime: PathBuf,
    resolution: &'a Resolution,
    args: &'a BTreeMap<String, StoredValue>,
    opts: &'a BTreeMap<String, Option<StoredValue>>,
    debug: bool,
}

/// The values a script declares, as environment variables. Options stored as `null`
/// are left out so the script falls back on its own default.
pub fn script_env(
    script: &Script,
    args: &BTreeMap<String, StoredValue>,
    opts: &BTreeMap<String, Option<StoredValue>>,
) -> Vec<(String, String)> {
    let arg_values = script
        .args
        .iter()
        .filter_map(|arg| args.get(&arg.name).map(|v| (arg.name.clone(), v.to_string())));
    let opt_values = script.opts.iter().filter_map(|opt| {
        opts.get(opt.name())
            .and_then(Option::as_ref)
            .map(|v| (opt.name().to_string(), v.to_string()))
    });
    arg_values.chain(opt_values).collect()
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        runtime: PathBuf,
        resolution: &'a Resolution,
        args: &'a BTreeMap<String, StoredValue>,
        opts: &'a BTreeMap<String, Option<StoredValue>>,
    ) -> Self {
        Self {
            runtime,
            resolution,
            args,
            opts,
            debug: false,
        }
    }

    /// Passes `VSS_DEBUG=1` to every script.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Runs `scripts` in the given order. The first nonzero exit stops the run and is
    /// returned as `RunError::ScriptFailed` carrying that exit code.
    pub async fn run(&self, scripts: &[Script]) -> Result<RunOutcome, RunError> {
        let mut outcome = RunOutcome::default();

        for (script, color) in scripts.iter().zip(PALETTE.iter().copied().cycle()) {
            let mut state = RunState::Idle;
            transition(script, &mut state, RunState::Announcing);

            println!("{}", format!(t!("run.info.running"), name = script.name).color(color));
            let provided = script_env(script, self.args, self.opts);
            let required = self.required_values(script, &outcome.exports)?;
            for line in announcement(&provided, &required, color) {
                println!("{}", line);
            }

            let mut env: BTreeMap<String, String> = BTreeMap::new();
            for (key, value) in provided {
                log::debug!("{} = {:?}", key, value);
                env.insert(key, value);
            }
            for (key, value, from) in required {
                log::debug!("{} = {:?} (from '{}')", key, value, from);
                env.insert(key, value);
            }
            if self.debug {
                env.insert(DEBUG_VAR.to_string(), "1".to_string());
            }

            let pre_env = snapshot_file("vss-pre-env")?;
            let post_env = snapshot_file("vss-post-env")?;
            env.insert(PRE_ENV_FILE_VAR.to_string(), pre_env.path().display().to_string());
            env.insert(POST_ENV_FILE_VAR.to_string(), post_env.path().display().to_string());

            let stdio = match script.stdin_mode {
                StdinMode::Inherit => StdioMode::Inherit,
                StdinMode::Captured => StdioMode::Capture {
                    tag: script.id.file_name().to_string(),
                    color,
                },
            };
            let spec = LaunchSpec {
                program: self.runtime.clone(),
                args: vec![script.id.path().display().to_string()],
                env,
                cwd: None,
                stdio,
            };

            transition(
                script,
                &mut state,
                match spec.stdio {
                    StdioMode::Inherit => RunState::Inherited,
                    StdioMode::Capture { .. } => RunState::Streaming,
                },
            );
            let code = executor::launch(&spec).await?;
            transition(script, &mut state, RunState::Exited(code));

            let exports = runtime::read_exports(pre_env.path(), post_env.path());
            if !exports.is_empty() {
                log::debug!("'{}' exported: {:?}", script.name, exports);
            }
            outcome.executed.push(script.id.clone());
            outcome.exports.insert(script.id.clone(), exports);

            if code != 0 {
                transition(script, &mut state, RunState::Aborted(code));
                return Err(RunError::ScriptFailed {
                    name: script.name.clone(),
                    code,
                });
            }
            transition(script, &mut state, RunState::Idle);
        }

        Ok(outcome)
    }

    /// Variables this script requires from scripts that already ran, as
    /// `(name, value, declared script)`. Every missing one is reported at once.
    fn required_values(
        &self,
        script: &Script,
        exports: &HashMap<ScriptId, HashMap<String, String>>,
    ) -> Result<Vec<(String, String, String)>, RunError> {
        let mut values = Vec::new();
        let mut problems = Vec::new();

        for requirement in self.resolution.requirements_of(&script.id) {
            let Some(exported) = exports.get(&requirement.source) else {
                problems.push(format!(
                    t!("run.error.requirement_not_run"),
                    required = requirement.declared
                ));
                continue;
            };
            for variable in &requirement.variables {
                match exported.get(variable) {
                    Some(value) => values.push((
                        variable.clone(),
                        value.clone(),
                        requirement.declared.clone(),
                    )),
                    None => problems.push(format!(
                        t!("run.error.variable_not_exported"),
                        variable = variable,
                        required = requirement.declared
                    )),
                }
            }
        }

        if problems.is_empty() {
            Ok(values)
        } else {
            Err(RunError::MissingRequirements {
                script: script.name.clone(),
                problems,
            })
        }
    }
}

/// The variable names handed to a script, one indented line each. Values can hold
/// secrets and only go to the debug log.
fn announcement(
    provided: &[(String, String)],
    required: &[(String, String, String)],
    color: Color,
) -> Vec<String> {
    let provided = provided
        .iter()
        .map(|(key, _)| format!("    {}", key.color(color)));
    let required = required
        .iter()
        .map(|(key, _, from)| format!("    {} (from {})", key.color(color), from.color(color)));
    provided.chain(required).collect()
}

fn transition(script: &Script, state: &mut RunState, next: RunState) {
    log::debug!("[{}] {:?} -> {:?}", script.id.file_name(), state, next);
    *state = next;
}

fn snapshot_file(prefix: &str) -> Result<NamedTempFile, RunError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()
        .map_err(RunError::Snapshot)
}
