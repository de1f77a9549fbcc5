use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::Path;

use crate::cli::{GlobalOptions, handlers::commons};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists the registered script directories in priority order."
)]
struct ListDirsArgs {}

pub fn handle(args: Vec<String>, _options: GlobalOptions) -> Result<()> {
    ListDirsArgs::try_parse_from(&args)?;
    let global = commons::open_global_store()?;
    let dirs = &global.get().script_dirs;

    if dirs.is_empty() {
        println!("{}", t!("dirs.info.none_registered").yellow());
        println!("{}", t!("run.info.add_dir_hint").dimmed());
        return Ok(());
    }

    println!("{}", t!("dirs.header.registered").bold());
    for line in listing(dirs) {
        println!("{}", line);
    }
    println!("\n{}", t!("dirs.info.bundled_first").dimmed());
    Ok(())
}

/// One numbered line per directory, with its state.
fn listing(dirs: &[String]) -> Vec<String> {
    dirs.iter()
        .enumerate()
        .map(|(position, dir)| {
            format!("  {}. {} {}", position + 1, dir.cyan(), describe(Path::new(dir)))
        })
        .collect()
}

fn describe(dir: &Path) -> ColoredString {
    if !dir.exists() {
        t!("dirs.status.missing").red()
    } else if !dir.is_dir() {
        t!("dirs.status.not_a_directory").red()
    } else {
        format!(
            t!("dirs.info.script_count"),
            count = commons::count_scripts(dir).unwrap_or(0)
        )
        .dimmed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_listing_numbers_dirs_and_reports_their_state() {
        let home = tempdir().unwrap();
        let scripts = home.path().join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(scripts.join("a.sh"), "").unwrap();
        fs::write(scripts.join("b.sh"), "").unwrap();
        let file = home.path().join("file.sh");
        fs::write(&file, "").unwrap();
        let gone = home.path().join("gone");

        let dirs: Vec<String> = [&scripts, &file, &gone]
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let lines = listing(&dirs);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  1. ") && lines[0].contains("(2 script(s))"));
        assert!(lines[1].starts_with("  2. ") && lines[1].contains(t!("dirs.status.not_a_directory")));
        assert!(lines[2].starts_with("  3. ") && lines[2].contains(t!("dirs.status.missing")));
    }
}
