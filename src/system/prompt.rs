// src/system/prompt.rs

use dialoguer::console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use std::io::IsTerminal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    /// Ctrl+C or Esc during a prompt. Not a failure: the program ends quietly.
    #[error("Prompt cancelled by the user.")]
    Interrupted,
    #[error("Terminal prompt failed: {0}")]
    Io(#[source] std::io::Error),
}

impl From<dialoguer::Error> for PromptError {
    fn from(error: dialoguer::Error) -> Self {
        match error {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                Self::Interrupted
            }
            dialoguer::Error::IO(e) => Self::Io(e),
            #[allow(unreachable_patterns)]
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// The terminal widgets the run needs. Parameter resolution and selection only talk to
/// this trait, so they can be driven by a scripted implementation in tests.
pub trait Prompter {
    /// Whether a human can answer. When false, callers fall back to defaults.
    fn is_interactive(&self) -> bool;

    /// Free text. An empty answer is allowed and returned as-is.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Returns the index of the chosen item.
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize, PromptError>;

    /// Returns the indices of the checked items, in list order.
    fn multi_select(
        &self,
        prompt: &str,
        items: &[String],
        checked: &[bool],
    ) -> Result<Vec<usize>, PromptError>;
}

/// `dialoguer` widgets with the colorful theme, on stderr.
#[derive(Default)]
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl std::fmt::Debug for DialoguerPrompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialoguerPrompter").finish_non_exhaustive()
    }
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self::default()
    }
}

/// dialoguer hides the cursor while a widget is active; an interrupted widget can leave it hidden.
fn restore_cursor<T>(result: Result<T, PromptError>) -> Result<T, PromptError> {
    if matches!(result, Err(PromptError::Interrupted)) {
        let _ = Term::stderr().show_cursor();
    }
    result
}

impl Prompter for DialoguerPrompter {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        restore_cursor(input.interact_text().map_err(PromptError::from))
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact_opt()
            .map_err(PromptError::from)
            .and_then(|answer| answer.ok_or(PromptError::Interrupted));
        restore_cursor(answer)
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize, PromptError> {
        let choice = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()
            .map_err(PromptError::from)
            .and_then(|choice| choice.ok_or(PromptError::Interrupted));
        restore_cursor(choice)
    }

    fn multi_select(
        &self,
        prompt: &str,
        items: &[String],
        checked: &[bool],
    ) -> Result<Vec<usize>, PromptError> {
        let chosen = MultiSelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .defaults(checked)
            .interact_opt()
            .map_err(PromptError::from)
            .and_then(|chosen| chosen.ok_or(PromptError::Interrupted));
        restore_cursor(chosen)
    }
}

/// Answers prompts from a queue, for handler tests. `confirm` reads `y`, `select` an index
/// and `multi_select` comma-separated indices.
#[cfg(test)]
pub(crate) mod scripted {
    use super::{PromptError, Prompter};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub(crate) struct ScriptedPrompter {
        interactive: bool,
        answers: RefCell<VecDeque<String>>,
        pub(crate) asked: RefCell<Vec<String>>,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Self {
                interactive: true,
                answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
                asked: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn offline() -> Self {
            Self::default()
        }

        pub(crate) fn remaining(&self) -> usize {
            self.answers.borrow().len()
        }

        fn next(&self, prompt: &str) -> String {
            self.asked.borrow_mut().push(prompt.to_string());
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected prompt: {}", prompt))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn is_interactive(&self) -> bool {
            self.interactive
        }
        fn input(&self, prompt: &str, _default: Option<&str>) -> Result<String, PromptError> {
            Ok(self.next(prompt))
        }
        fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
            Ok(self.next(prompt) == "y")
        }
        fn select(&self, prompt: &str, _items: &[String], _default: usize) -> Result<usize, PromptError> {
            Ok(self.next(prompt).parse().unwrap())
        }
        fn multi_select(&self, prompt: &str, _: &[String], _: &[bool]) -> Result<Vec<usize>, PromptError> {
            Ok(self
                .next(prompt)
                .split(',')
                .filter(|i| !i.is_empty())
                .map(|i| i.parse().unwrap())
                .collect())
        }
    }
}
