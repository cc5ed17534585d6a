//! Interactive prompt seam for the guided wizard.
//!
//! The wizard and the expert question go through the [`Prompt`] trait so the
//! flows stay testable with a scripted double instead of a live terminal.

use std::io::{self, BufRead, Write};

/// Blocking line-oriented prompting.
pub trait Prompt {
    /// Print the question and read one trimmed line.
    fn line(&mut self, question: &str) -> io::Result<String>;

    /// Yes/no question; reprompts until one of y/n/yes/no is given.
    fn yes_no(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let answer = self.line(question)?.to_ascii_lowercase();
            match answer.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => {}
            }
        }
    }

    /// Prompt for an integer within an inclusive range, reprompting on
    /// invalid input.
    fn int_in_range(&mut self, question: &str, min: i64, max: i64) -> io::Result<i64> {
        loop {
            match self.line(question)?.parse::<i64>() {
                Ok(value) if value >= min && value <= max => return Ok(value),
                _ => println!("Invalid number. Please enter a value between {min} and {max}."),
            }
        }
    }
}

/// Terminal-backed prompt used in production.
#[derive(Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn line(&mut self, question: &str) -> io::Result<String> {
        println!("{question}");
        io::stdout().flush()?;
        let mut buffer = String::new();
        io::stdin().lock().read_line(&mut buffer)?;
        Ok(buffer.trim().to_string())
    }
}

/// Scripted prompt for tests: answers are consumed front to back.
#[cfg(test)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.answers.is_empty()
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn line(&mut self, _question: &str) -> io::Result<String> {
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "scripted prompt ran dry")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_reprompts_until_a_valid_answer() {
        let mut prompt = ScriptedPrompt::new(["maybe", "", "YES"]);
        assert!(prompt.yes_no("?").expect("answer"));
        assert!(prompt.exhausted());
    }

    #[test]
    fn int_in_range_rejects_out_of_range_values() {
        let mut prompt = ScriptedPrompt::new(["abc", "-3", "70000", "8282"]);
        assert_eq!(prompt.int_in_range("?", 0, 65535).expect("answer"), 8282);
    }
}
