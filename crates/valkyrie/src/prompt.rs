//! Interactive terminal prompts

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use valkyrie_cloud::Confirmation;

/// Confirmation gate backed by the interactive terminal
pub struct TerminalPrompt;

impl Confirmation for TerminalPrompt {
    fn confirm(&self, message: &str) -> std::io::Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(std::io::Error::other)
    }
}

pub fn confirm(message: &str, default: bool) -> dialoguer::Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .default(default)
        .interact()
}

/// Required input; the default is offered only when non-empty
pub fn input(message: &str, default: &str) -> dialoguer::Result<String> {
    let theme = ColorfulTheme::default();
    let mut prompt = Input::with_theme(&theme).with_prompt(message);
    if !default.is_empty() {
        prompt = prompt.default(default.to_string());
    }
    prompt.interact_text()
}

pub fn input_optional(message: &str) -> dialoguer::Result<String> {
    Input::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .allow_empty(true)
        .interact_text()
}

pub fn input_number(message: &str, default: u32) -> dialoguer::Result<u32> {
    Input::<u32>::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .default(default)
        .interact_text()
}

pub fn select(message: &str, items: &[String], default: usize) -> dialoguer::Result<usize> {
    Select::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .items(items)
        .default(default)
        .interact()
}

pub fn multi_select(message: &str, items: &[String]) -> dialoguer::Result<Vec<usize>> {
    MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .items(items)
        .interact()
}
