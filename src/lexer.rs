//! A module implementing lexical analysis (word splitting) of a submitted command line.
//!
//! The rules follow POSIX shell quoting without any expansion: single quotes are
//! literal, double quotes honour a small set of backslash escapes, and a backslash
//! outside quotes escapes any character. Operators such as `|` or `>` have no special
//! meaning here and end up inside words.

use std::fmt;
use thiserror::Error;

/// The kind of quote left open at the end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quote::Single => f.write_str("single"),
            Quote::Double => f.write_str("double"),
        }
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unterminated {0}-quoted string")]
    UnfinishedQuote(Quote),
    /// The line ended with a lone backslash.
    #[error("unterminated backslash escape")]
    UnfinishedEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input and returns the collected words.
    ///
    /// A word is emitted once it has been *started*, which is why `""` yields an
    /// empty word while plain whitespace yields nothing.
    fn make_words(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => Err(LexingError::UnfinishedQuote(Quote::Single)),
            LexingState::ReadingDoubleQuote => Err(LexingError::UnfinishedQuote(Quote::Double)),
            LexingState::ReadingWord => {
                out.push(std::mem::take(&mut self.buffer));
                Ok(out)
            }
            LexingState::Start => Ok(out),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\n' => {}
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => match self.read_char() {
                None => return Err(LexingError::UnfinishedEscape),
                // line continuation, no word started yet
                Some('\n') => {}
                Some(c) => {
                    self.buffer.push(c);
                    self.state = LexingState::ReadingWord;
                }
            },
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\n' => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => match self.read_char() {
                None => return Err(LexingError::UnfinishedEscape),
                Some('\n') => {}
                Some(c) => self.buffer.push(c),
            },
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.read_char() {
                None => return Err(LexingError::UnfinishedQuote(Quote::Double)),
                Some('\n') => {}
                Some(c @ ('$' | '`' | '"' | '\\')) => self.buffer.push(c),
                Some(c) => {
                    self.buffer.push('\\');
                    self.buffer.push(c);
                }
            },
            c => self.buffer.push(c),
        }
        Ok(())
    }
}

/// Split a raw command line into argument words.
///
/// Empty and whitespace-only input yields an empty vector. Malformed quoting or a
/// dangling backslash yields a [`LexingError`].
///
/// ```
/// use applet_shell::lexer::split_into_words;
/// assert_eq!(split_into_words(r#"echo "a b" c"#).unwrap(), ["echo", "a b", "c"]);
/// ```
pub fn split_into_words(line: &str) -> Result<Vec<String>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_words()
}
