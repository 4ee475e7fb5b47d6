//! Interactive terminal prompts.

use config_manager::{
    keys, parse_yes_no, ConfigKey, ConfigSource, ConfigurationError, ConfigurationResult,
};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, IsTerminal, Stdin, Stdout, Write};

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;

/// Reads one line of input without echoing it.
pub trait HiddenInput {
    /// Returns `None` at end of input.
    fn read_hidden_line(&self) -> io::Result<Option<String>>;
}

/// Reads key presses from the terminal with echo turned off.
pub struct RawTerminal;

impl HiddenInput for RawTerminal {
    fn read_hidden_line(&self) -> io::Result<Option<String>> {
        terminal::enable_raw_mode()?;
        let line = read_keys();
        let restored = terminal::disable_raw_mode();
        let line = line?;
        restored?;
        Ok(line)
    }
}

fn read_keys() -> io::Result<Option<String>> {
    let mut line = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => return Ok(Some(line)),
            // Raw mode turns Ctrl-C into a key press instead of a signal
            KeyCode::Char('c') if control => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "input cancelled"))
            }
            KeyCode::Char('d') if control && line.is_empty() => return Ok(None),
            KeyCode::Char(c) if !control => line.push(c),
            KeyCode::Backspace => {
                line.pop();
            }
            _ => {}
        }
    }
}

/// Asks the user for configuration values.
///
/// Only keys that carry a prompt text are asked for. End of input and blank
/// answers count as "no value". Answers for secret keys are read through
/// [`HiddenInput`] and never echoed.
pub struct PromptSource<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
    hidden: Box<dyn HiddenInput>,
}

impl PromptSource<BufReader<Stdin>, Stdout> {
    /// Prompts on the controlling terminal.
    ///
    /// Returns `None` unless both stdin and stdout are terminals, so that
    /// piped or scheduled runs never block waiting for input.
    pub fn terminal() -> Option<Self> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        if stdin.is_terminal() && stdout.is_terminal() {
            Some(Self::new(BufReader::new(stdin), stdout))
        } else {
            None
        }
    }
}

impl<R: BufRead, W: Write> PromptSource<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
            hidden: Box::new(RawTerminal),
        }
    }

    /// Replaces the reader used for secret values.
    pub fn with_hidden_input(mut self, hidden: impl HiddenInput + 'static) -> Self {
        self.hidden = Box::new(hidden);
        self
    }

    /// Asks whether existing rules should be deleted before new ones are created.
    ///
    /// Repeats the question until it gets a yes or no; returns `None` at end of input.
    pub fn confirm_delete(&self, repository_count: usize) -> ConfigurationResult<Option<bool>> {
        let key = keys::CONFIRM_DELETE_EXISTING_RULES;
        let question = format!(
            "Delete all existing branch restrictions in {} repositories before applying the new rules? [yes/no]: ",
            repository_count
        );
        loop {
            let answer = match self.ask(key.name, &question, false)? {
                Some(answer) => answer,
                None => return Ok(None),
            };
            match parse_yes_no(&key, Some(&answer)) {
                Ok(Some(confirmed)) => return Ok(Some(confirmed)),
                _ => self.say(key.name, "Please answer 'yes' or 'no'.")?,
            }
        }
    }

    /// Writes `question` and reads one line. `None` means end of input.
    fn ask(&self, name: &str, question: &str, secret: bool) -> ConfigurationResult<Option<String>> {
        let failed = |e: io::Error| prompt_failed(name, e);

        {
            let mut output = self.output.borrow_mut();
            output.write_all(question.as_bytes()).map_err(failed)?;
            output.flush().map_err(failed)?;
        }

        if secret {
            let line = self.hidden.read_hidden_line().map_err(failed)?;
            // The hidden read swallows the newline
            writeln!(self.output.borrow_mut()).map_err(failed)?;
            return Ok(line.map(|l| l.trim().to_string()));
        }

        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(failed)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&self, name: &str, message: &str) -> ConfigurationResult<()> {
        writeln!(self.output.borrow_mut(), "{}", message).map_err(|e| prompt_failed(name, e))
    }
}

impl<R: BufRead, W: Write> ConfigSource for PromptSource<R, W> {
    fn get(&self, key: &ConfigKey) -> ConfigurationResult<Option<String>> {
        let Some(question) = key.prompt else {
            return Ok(None);
        };
        let answer = self.ask(key.name, question, key.secret)?;
        Ok(answer.filter(|a| !a.is_empty()))
    }
}

fn prompt_failed(name: &str, error: io::Error) -> ConfigurationError {
    ConfigurationError::PromptFailed {
        name: name.to_string(),
        reason: error.to_string(),
    }
}
