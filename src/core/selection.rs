// src/core/selection.rs

use crate::{
    core::resolver::Resolution,
    models::Script,
    system::prompt::{PromptError, Prompter},
};
use colored::*;

/// Asks which scripts to run. The list is in execution order and `previous` (script
/// identities) is pre-checked. An empty choice, or one where a chosen script requires an
/// unchosen one, is rejected and asked again with the last choice checked.
pub fn select_scripts(
    prompter: &dyn Prompter,
    resolution: &Resolution,
    previous: &[String],
) -> Result<Vec<Script>, PromptError> {
    let items: Vec<String> = resolution.ordered.iter().map(Script::label).collect();
    let mut checked: Vec<bool> = resolution
        .ordered
        .iter()
        .map(|s| previous.contains(&s.id.to_string()))
        .collect();

    loop {
        let chosen = prompter.multi_select(t!("selection.prompt"), &items, &checked)?;
        if chosen.is_empty() {
            eprintln!("{}", t!("selection.error.empty").red());
            continue;
        }

        let selected: Vec<Script> = chosen
            .iter()
            .filter_map(|&i| resolution.ordered.get(i).cloned())
            .collect();
        let missing = resolution.missing_requirements(&selected);
        if missing.is_empty() {
            log::debug!("Selected {} script(s)", selected.len());
            return Ok(selected);
        }

        for m in &missing {
            eprintln!(
                "{}",
                format!(
                    t!("selection.error.requirement_not_selected"),
                    script = m.script,
                    required = m.required
                )
                .red()
            );
        }
        checked = (0..items.len()).map(|i| chosen.contains(&i)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{annotations, resolver};
    use crate::models::{ScriptId, ScriptOrigin};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    /// Replays a queue of multi-select answers and records the pre-checked state each time.
    struct Picks {
        answers: RefCell<VecDeque<Vec<usize>>>,
        seen_checked: RefCell<Vec<Vec<bool>>>,
    }

    impl Picks {
        fn new(answers: Vec<Vec<usize>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                seen_checked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompter for Picks {
        fn is_interactive(&self) -> bool {
            true
        }
        fn input(&self, _: &str, _: Option<&str>) -> Result<String, PromptError> {
            unreachable!()
        }
        fn confirm(&self, _: &str, _: bool) -> Result<bool, PromptError> {
            unreachable!()
        }
        fn select(&self, _: &str, _: &[String], _: usize) -> Result<usize, PromptError> {
            unreachable!()
        }
        fn multi_select(&self, _: &str, _: &[String], checked: &[bool]) -> Result<Vec<usize>, PromptError> {
            self.seen_checked.borrow_mut().push(checked.to_vec());
            self.answers
                .borrow_mut()
                .pop_front()
                .ok_or(PromptError::Interrupted)
        }
    }

    fn resolution() -> Resolution {
        let dir = PathBuf::from("/s");
        let scripts = [
            ("deploy.sh", ""),
            ("smoke.sh", "# @vercel.requires deploy.sh URL\n"),
            ("lint.sh", ""),
        ]
        .iter()
        .map(|(file, content)| {
            annotations::parse_script(content, ScriptId::new(&dir, *file), ScriptOrigin::External)
                .unwrap()
        })
        .collect();
        resolver::resolve(scripts, &[dir]).unwrap()
    }

    fn names(scripts: &[Script]) -> Vec<&str> {
        scripts.iter().map(|s| s.id.file_name()).collect()
    }

    #[test]
    fn test_previous_selection_is_prechecked() {
        let resolution = resolution();
        let picks = Picks::new(vec![vec![1]]);
        let previous = vec!["/s/lint.sh".to_string(), "/gone/old.sh".to_string()];

        let selected = select_scripts(&picks, &resolution, &previous).unwrap();
        assert_eq!(names(&selected), vec!["lint.sh"]);
        assert_eq!(picks.seen_checked.borrow()[0], vec![false, true, false]);
    }

    #[test]
    fn test_empty_and_incomplete_selections_are_asked_again() {
        let resolution = resolution();
        // Execution order is deploy, lint, smoke.
        let picks = Picks::new(vec![vec![], vec![2], vec![0, 2]]);

        let selected = select_scripts(&picks, &resolution, &[]).unwrap();
        assert_eq!(names(&selected), vec!["deploy.sh", "smoke.sh"]);
        // The rejected choice is kept checked for the next attempt.
        assert_eq!(picks.seen_checked.borrow()[2], vec![false, false, true]);
    }

    #[test]
    fn test_cancelled_prompt_is_reported() {
        let resolution = resolution();
        let picks = Picks::new(Vec::new());
        assert!(matches!(
            select_scripts(&picks, &resolution, &[]),
            Err(PromptError::Interrupted)
        ));
    }
}
