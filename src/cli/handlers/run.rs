use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use std::collections::BTreeMap;

use crate::{
    cli::{GlobalOptions, handlers::commons},
    core::{
        orchestrator::Orchestrator, parameters::ParameterResolver, resolver, selection,
        store::JsonStore,
    },
    models::{GlobalConfig, ProjectState, StoredValue},
    system::{
        git::GitWorktrees,
        prompt::{DialoguerPrompter, Prompter},
    },
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Selects scripts, asks for the values they need and runs them in order."
)]
struct RunArgs {
    /// Run the last selection again without asking.
    #[arg(long, short)]
    replay: bool,
}

pub fn handle(args: Vec<String>, options: GlobalOptions) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let replay = options.replay || run_args.replay;

    // 1. Load state and put the runtime files in place.
    let mut global = commons::open_global_store()?;
    let mut project = commons::open_project_store()?;
    let workspace = commons::prepare_workspace(global.get())?;

    // 2. Discover and order everything that is available.
    let discovery = commons::discover(&workspace.repository);
    if discovery.scripts.is_empty() {
        commons::print_warning(t!("run.warning.no_scripts"));
        println!("{}", t!("run.info.add_dir_hint").dimmed());
        return Ok(());
    }
    let resolution = resolver::resolve(discovery.scripts, &workspace.repository.directories())?;

    // 3. Decide what runs.
    let prompter = DialoguerPrompter::new();
    let selected = if replay {
        let selected = resolution.select(&project.get().selected);
        log::debug!(
            "Replaying {} of {} stored selection(s)",
            selected.len(),
            project.get().selected.len()
        );
        selected
    } else {
        if !prompter.is_interactive() {
            return Err(anyhow!(t!("run.error.not_interactive")));
        }
        let selected =
            selection::select_scripts(&prompter, &resolution, &project.get().selected)?;
        project.get_mut().selected = selected.iter().map(|s| s.id.to_string()).collect();
        project.flush()?;
        selected
    };

    if selected.is_empty() {
        println!("{}", t!("run.info.nothing_selected").yellow());
        return Ok(());
    }

    // 4. Fill in arguments and options, then persist what was answered.
    let mut arg_values = global.get().args.clone();
    let mut opt_values = project.get().opts.clone();
    let report = ParameterResolver::new(&prompter, &GitWorktrees).resolve(
        &selected,
        &mut arg_values,
        &mut opt_values,
    )?;
    log::debug!("Parameter resolution: {:?}", report);

    persist_parameters(&mut global, &mut project, &arg_values, &opt_values)?;

    // 5. Run, one script at a time.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context(t!("run.error.async_runtime"))?;
    let orchestrator = Orchestrator::new(
        workspace.runtime.clone(),
        &resolution,
        &arg_values,
        &opt_values,
    )
    .with_debug(options.debug);
    let outcome = runtime.block_on(orchestrator.run(&selected))?;

    println!(
        "\n{}",
        format!(t!("run.success.completed"), count = outcome.executed.len())
            .green()
            .bold()
    );
    Ok(())
}

/// Stores the resolved values. An empty map leaves its store untouched, so a run that
/// needed no values never creates or rewrites a file.
fn persist_parameters(
    global: &mut JsonStore<GlobalConfig>,
    project: &mut JsonStore<ProjectState>,
    args: &BTreeMap<String, StoredValue>,
    opts: &BTreeMap<String, Option<StoredValue>>,
) -> Result<()> {
    if !args.is_empty() {
        global.get_mut().args = args.clone();
        global.flush()?;
    }
    if !opts.is_empty() {
        project.get_mut().opts = opts.clone();
        project.flush()?;
    }
    Ok(())
}
