//! The ordered diagnostic log and its terminal rendering.
//!
//! Elaboration never aborts on the first problem: commands report
//! [`Message`]s into a [`MessageLog`] and the driver moves on. A message is
//! a span, a severity, and text, with optional secondary notes pointing at
//! related positions (for example the previous declaration in a duplicate
//! declaration error). Rendering uses [`annotate_snippets`] to produce
//! Rust-style diagnostics against the source text.

use crate::{FileRef, LinedString, Span};
use annotate_snippets::{Level, Renderer, Snippet};
use std::fmt;

/// Determines how a message is displayed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorLevel {
  /// Level for informational messages, such as the result of `#check`.
  Info,
  /// Level for warnings, such as a redeclared variable that is being ignored.
  Warning,
  /// Level for errors (which may or may not be fatal).
  Error,
}

impl ErrorLevel {
  /// Convert an [`ErrorLevel`] to the [`annotate_snippets`] severity type.
  #[must_use]
  pub fn to_level(self) -> Level {
    match self {
      ErrorLevel::Info => Level::Info,
      ErrorLevel::Warning => Level::Warning,
      ErrorLevel::Error => Level::Error,
    }
  }
}

impl fmt::Display for ErrorLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorLevel::Info => "info",
      ErrorLevel::Warning => "warning",
      ErrorLevel::Error => "error",
    }
    .fmt(f)
  }
}

/// A single diagnostic: a position, a severity, and the message text.
#[derive(Debug)]
pub struct Message {
  /// The location of the message (possibly zero-length,
  /// possibly enclosing an identifier or other object).
  pub pos: Span,
  /// The severity of the message.
  pub level: ErrorLevel,
  /// The message text.
  pub text: String,
  /// Related positions, rendered as notes under the main message.
  pub notes: Vec<(Span, String)>,
}

impl Message {
  /// Constructs a message with no notes.
  pub fn new(pos: impl Into<Span>, level: ErrorLevel, text: impl Into<String>) -> Message {
    Message { pos: pos.into(), level, text: text.into(), notes: vec![] }
  }

  /// Render this message against the source text, Rust-style.
  #[must_use]
  pub fn render(&self, path: &FileRef, file: &LinedString) -> String {
    let origin = path.rel();
    let mut snippet = Snippet::source(file)
      .origin(origin)
      .line_start(1)
      .fold(true)
      .annotation(self.level.to_level().span(self.pos.into()));
    for (pos, note) in &self.notes {
      snippet = snippet.annotation(Level::Note.span((*pos).into()).label(note));
    }
    let message = self.level.to_level().title(&self.text).snippet(snippet);
    Renderer::styled().render(message).to_string()
  }
}

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.level, self.text)
  }
}

/// The accumulated diagnostics of an elaboration run, in emission order.
#[derive(Debug, Default)]
pub struct MessageLog(Vec<Message>);

impl MessageLog {
  /// Appends a message to the log.
  pub fn push(&mut self, m: Message) { self.0.push(m) }

  /// The messages, in emission order.
  #[must_use]
  pub fn messages(&self) -> &[Message] { &self.0 }

  /// Does the log contain any [`Error`](ErrorLevel::Error) level messages?
  #[must_use]
  pub fn has_errors(&self) -> bool {
    self.0.iter().any(|m| m.level == ErrorLevel::Error)
  }

  /// The number of messages.
  #[must_use]
  pub fn len(&self) -> usize { self.0.len() }

  /// Is the log empty?
  #[must_use]
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// An iterator over the messages.
  pub fn iter(&self) -> std::slice::Iter<'_, Message> { self.0.iter() }

  /// Render every message against the source text, separated by blank lines.
  #[must_use]
  pub fn render(&self, path: &FileRef, file: &LinedString) -> String {
    let mut out = String::new();
    for m in &self.0 {
      if !out.is_empty() {
        out.push_str("\n\n")
      }
      out.push_str(&m.render(path, file));
    }
    out
  }
}

impl<'a> IntoIterator for &'a MessageLog {
  type Item = &'a Message;
  type IntoIter = std::slice::Iter<'a, Message>;
  fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}
