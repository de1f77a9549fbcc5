use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{
    cli::{GlobalOptions, handlers::commons},
    core::{paths, store::JsonStore},
    models::GlobalConfig,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Registers a directory of scripts. Registration order is priority order."
)]
struct AddDirArgs {
    /// The directory to register. `~` and environment variables are expanded.
    path: String,
}

/// What `register` did with the directory.
#[derive(Debug, PartialEq, Eq)]
enum Registration {
    Added { path: String, scripts: usize },
    AlreadyRegistered(String),
}

pub fn handle(args: Vec<String>, _options: GlobalOptions) -> Result<()> {
    let add_args = AddDirArgs::try_parse_from(&args)?;
    let mut global = commons::open_global_store()?;

    match register(&mut global, &add_args.path)? {
        Registration::AlreadyRegistered(path) => {
            commons::print_warning(&format!(t!("dirs.warning.already_registered"), path = path));
        }
        Registration::Added { path, scripts } => {
            println!(
                "{}",
                format!(t!("dirs.success.added"), path = path.cyan()).green()
            );
            println!(
                "  {}",
                format!(t!("dirs.info.script_count"), count = scripts).dimmed()
            );
        }
    }
    Ok(())
}

/// Canonicalizes `raw` and appends it to the registered directories, unless it is there already.
fn register(global: &mut JsonStore<GlobalConfig>, raw: &str) -> Result<Registration> {
    let dir = paths::resolve_existing_dir(raw)?;
    let dir_str = dir.display().to_string();

    if global.get().script_dirs.contains(&dir_str) {
        return Ok(Registration::AlreadyRegistered(dir_str));
    }

    global.get_mut().script_dirs.push(dir_str.clone());
    global.flush()?;
    log::debug!("Registered script directory '{}'", dir_str);

    Ok(Registration::Added {
        path: dir_str,
        scripts: commons::count_scripts(&dir).unwrap_or(0),
    })
}
