//! Interactive input for field resolution
//!
//! Fields never read from the terminal directly. They go through a
//! [`Prompter`], which lets the CLI talk to a user while tests and
//! non-interactive runs feed answers from a queue.

use std::collections::VecDeque;
use std::io;

use inquire::{InquireError, Text};

use crate::core::error::Result;

/// Source of answers for field prompts
pub trait Prompter {
    /// Ask a question and return the raw answer.
    ///
    /// `default` is only shown to the user; interpreting an empty answer is
    /// left to the caller. `None` means no more input is available.
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<Option<String>>;

    /// Show an informational line (choice lists, warnings).
    fn say(&mut self, line: &str);
}

/// Prompter for an interactive terminal, backed by `inquire`.
///
/// Escape, end of input and a stdin that is not a terminal all count as
/// closed input. Ctrl-C aborts with an interrupted I/O error.
#[derive(Debug, Default)]
pub struct ConsolePrompter;

impl ConsolePrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for ConsolePrompter {
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<Option<String>> {
        let mut text = Text::new(question);
        if let Some(default) = default.filter(|d| !d.is_empty()) {
            text = text.with_default(default);
        }

        text.prompt().map(Some).or_else(prompt_error)
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Maps prompt failures that just mean "no more input" to `Ok(None)`
fn prompt_error(error: InquireError) -> Result<Option<String>> {
    match error {
        InquireError::OperationCanceled | InquireError::NotTTY => Ok(None),
        InquireError::IO(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        InquireError::OperationInterrupted => {
            Err(io::Error::new(io::ErrorKind::Interrupted, "prompt interrupted").into())
        }
        InquireError::IO(e) => Err(e.into()),
        e => Err(io::Error::other(e.to_string()).into()),
    }
}

/// Prompter that replays a fixed list of answers.
///
/// Once the answers are used up it behaves like closed input, so every
/// further field falls back to its default. An empty `ScriptedPrompter` is
/// therefore a "use all defaults" prompter.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    questions: Vec<String>,
    output: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
            output: Vec::new(),
        }
    }

    /// A prompter without answers; every field takes its default
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Questions asked so far, in order
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Lines passed to [`Prompter::say`]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str, _default: Option<&str>) -> Result<Option<String>> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front())
    }

    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}
