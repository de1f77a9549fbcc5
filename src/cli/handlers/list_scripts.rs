use anyhow::Result;
use clap::Parser;
use colored::*;

use crate::{
    cli::{GlobalOptions, handlers::commons},
    core::resolver::{self, Resolution},
    models::{Script, ScriptOrigin},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists every available script in execution order."
)]
struct ListScriptsArgs {}

pub fn handle(args: Vec<String>, _options: GlobalOptions) -> Result<()> {
    ListScriptsArgs::try_parse_from(&args)?;
    let global = commons::open_global_store()?;
    let workspace = commons::prepare_workspace(global.get())?;

    let discovery = commons::discover(&workspace.repository);
    if discovery.scripts.is_empty() {
        commons::print_warning(t!("run.warning.no_scripts"));
        println!("{}", t!("run.info.add_dir_hint").dimmed());
        return Ok(());
    }
    let resolution = resolver::resolve(discovery.scripts, &workspace.repository.directories())?;

    println!("{}\n", t!("scripts.header").bold());
    for (position, script) in resolution.ordered.iter().enumerate() {
        for line in script_lines(position + 1, script, &resolution) {
            println!("{}", line);
        }
        println!();
    }

    let (bundled, external) = count_by_origin(&resolution);
    println!(
        "{}",
        format!(
            t!("scripts.total"),
            count = resolution.ordered.len(),
            bundled = bundled,
            external = external
        )
        .bold()
    );
    Ok(())
}

/// `(bundled, external)` script counts.
fn count_by_origin(resolution: &Resolution) -> (usize, usize) {
    let bundled = resolution
        .ordered
        .iter()
        .filter(|s| s.origin == ScriptOrigin::Bundled)
        .count();
    (bundled, resolution.ordered.len() - bundled)
}

fn script_lines(position: usize, script: &Script, resolution: &Resolution) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:>3}. {} {}",
            position,
            script.name.cyan().bold(),
            format!("[{}]", script.origin).dimmed()
        ),
        format!("     {:<14} {}", t!("scripts.field.location").blue(), script.id),
    ];
    if let Some(description) = &script.description {
        lines.push(format!(
            "     {:<14} {}",
            t!("scripts.field.description").blue(),
            description
        ));
    }
    for arg in &script.args {
        lines.push(format!(
            "     {:<14} {} {}",
            t!("scripts.field.arg").blue(),
            arg.name.green(),
            arg.description.dimmed()
        ));
    }
    for opt in &script.opts {
        let kind = if opt.is_optional() {
            format!("({}, optional)", opt.kind())
        } else {
            format!("({})", opt.kind())
        };
        lines.push(format!(
            "     {:<14} {} {} {}",
            t!("scripts.field.opt").blue(),
            opt.name().green(),
            kind.dimmed(),
            opt.description().dimmed()
        ));
    }
    let dependencies = resolution.dependencies_of(&script.id);
    if !dependencies.is_empty() {
        let names: Vec<&str> = dependencies.iter().map(|id| id.file_name()).collect();
        lines.push(format!(
            "     {:<14} {}",
            t!("scripts.field.after").blue(),
            names.join(", ")
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::annotations;
    use crate::models::ScriptId;
    use std::path::PathBuf;

    fn resolution() -> Resolution {
        let bundled = PathBuf::from("/cache/bundled");
        let external = PathBuf::from("/ops");
        let scripts = vec![
            annotations::parse_script(
                concat!(
                    "# @vercel.name Deploy\n",
                    "# @vercel.description Ships the build\n",
                    "# @vercel.after build.sh\n",
                    "# @vercel.arg FRONT_DIR Front repository\n",
                    "# @vercel.opt {\"name\":\"PROD\",\"type\":\"boolean\",\"description\":\"Production?\",\"optional\":true}\n",
                ),
                ScriptId::new(&external, "deploy.sh"),
                ScriptOrigin::External,
            )
            .unwrap(),
            annotations::parse_script("", ScriptId::new(&bundled, "build.sh"), ScriptOrigin::Bundled)
                .unwrap(),
        ];
        resolver::resolve(scripts, &[bundled, external]).unwrap()
    }

    #[test]
    fn test_lines_show_every_declared_field() {
        let resolution = resolution();
        let deploy = resolution
            .get(&ScriptId::new("/ops", "deploy.sh"))
            .unwrap();
        let lines = script_lines(2, deploy, &resolution);

        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("  2.") && lines[0].contains("Deploy") && lines[0].contains("[external]"));
        assert!(lines[1].contains("/ops/deploy.sh"));
        assert!(lines[2].contains("Ships the build"));
        assert!(lines[3].contains("FRONT_DIR") && lines[3].contains("Front repository"));
        assert!(lines[4].contains("PROD") && lines[4].contains("(boolean, optional)"));
        assert!(lines[5].contains("build.sh"));
    }

    #[test]
    fn test_bare_script_has_name_and_location_only() {
        let resolution = resolution();
        let build = resolution
            .get(&ScriptId::new("/cache/bundled", "build.sh"))
            .unwrap();
        let lines = script_lines(1, build, &resolution);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("build.sh") && lines[0].contains("[bundled]"));
    }

    #[test]
    fn test_counts_by_origin() {
        assert_eq!(count_by_origin(&resolution()), (1, 1));
    }
}
