use crate::domain::ports::{Prompt, SelectOption};
use std::collections::VecDeque;

/// 不提示：所有問題都視為沒有答案
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Prompt for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn select(&mut self, _message: &str, _options: &[SelectOption]) -> Option<usize> {
        None
    }

    fn confirm(&mut self, _message: &str, _default: bool) -> Option<bool> {
        None
    }

    fn text(&mut self, _message: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    Select(usize),
    Confirm(bool),
    Text(String),
}

/// 依序回放預先準備的答案，並記錄所有問題與通知
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<ScriptedAnswer>,
    transcript: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn is_interactive(&self) -> bool {
        true
    }

    fn select(&mut self, message: &str, options: &[SelectOption]) -> Option<usize> {
        self.transcript.push(message.to_string());
        for option in options {
            match &option.description {
                Some(description) => self
                    .transcript
                    .push(format!("{} - {}", option.label, description)),
                None => self.transcript.push(option.label.clone()),
            }
        }

        match self.answers.pop_front()? {
            ScriptedAnswer::Select(index) if index < options.len() => Some(index),
            _ => None,
        }
    }

    fn confirm(&mut self, message: &str, _default: bool) -> Option<bool> {
        self.transcript.push(message.to_string());
        match self.answers.pop_front()? {
            ScriptedAnswer::Confirm(answer) => Some(answer),
            _ => None,
        }
    }

    fn text(&mut self, message: &str) -> Option<String> {
        self.transcript.push(message.to_string());
        match self.answers.pop_front()? {
            ScriptedAnswer::Text(answer) => Some(answer),
            _ => None,
        }
    }

    fn notify(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}

#[cfg(feature = "cli")]
pub use terminal::TerminalPrompt;

#[cfg(feature = "cli")]
mod terminal {
    use crate::domain::ports::{Prompt, SelectOption};
    use dialoguer::{Confirm, Input, Select};
    use is_terminal::IsTerminal;

    /// 終端機互動提示；stdin 不是終端機時自動退回非互動
    #[derive(Debug, Clone, Copy)]
    pub struct TerminalPrompt {
        interactive: bool,
    }

    impl TerminalPrompt {
        pub fn new(enabled: bool) -> Self {
            Self {
                interactive: enabled && std::io::stdin().is_terminal(),
            }
        }
    }

    impl Prompt for TerminalPrompt {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn select(&mut self, message: &str, options: &[SelectOption]) -> Option<usize> {
            if !self.interactive || options.is_empty() {
                return None;
            }

            let items: Vec<String> = options
                .iter()
                .map(|option| match &option.description {
                    Some(description) => format!("{}  ({})", option.label, description),
                    None => option.label.clone(),
                })
                .collect();

            Select::new()
                .with_prompt(message)
                .items(&items)
                .default(0)
                .interact_opt()
                .map_err(|e| tracing::debug!("prompt aborted: {}", e))
                .ok()
                .flatten()
        }

        fn confirm(&mut self, message: &str, default: bool) -> Option<bool> {
            if !self.interactive {
                return None;
            }

            Confirm::new()
                .with_prompt(message)
                .default(default)
                .interact_opt()
                .map_err(|e| tracing::debug!("prompt aborted: {}", e))
                .ok()
                .flatten()
        }

        fn text(&mut self, message: &str) -> Option<String> {
            if !self.interactive {
                return None;
            }

            Input::<String>::new()
                .with_prompt(message)
                .interact_text()
                .map_err(|e| tracing::debug!("prompt aborted: {}", e))
                .ok()
        }

        fn notify(&mut self, message: &str) {
            if self.interactive {
                eprintln!("{}", message);
            }
        }
    }
}
