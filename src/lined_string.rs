//! Embellished String which carries the positions of its line breaks.
//!
//! Spans into a source file are byte ranges; diagnostics and the position
//! annotations on pre-expressions want line/column pairs. [`LinedString`]
//! precomputes the newline positions of a source text so that the
//! conversion is a binary search.

use crate::Position;
use std::ops::Deref;

/// Wrapper around std's String which stores data about the positions of any newline characters.
///
/// Also contains a boolean indicating whether the string has any unicode characters,
/// which allows column computation to take the fast path on plain ASCII text.
/// The indices stored in `lines` are the successors of any newline characters.
#[derive(Default, Clone, Debug)]
pub struct LinedString {
  s: String,
  unicode: bool,
  lines: Vec<usize>,
}

impl LinedString {
  /// Calculate and store information about the positions of any newline
  /// characters in the string, and set 'unicode' to true if the string contains unicode.
  /// The data in 'lines' is actually the positions of the characters immediately after
  /// the line break (so \n.pos + 1).
  #[must_use]
  fn get_lines(unicode: &mut bool, s: &str) -> Vec<usize> {
    let mut lines = vec![];
    for (b, c) in s.char_indices() {
      if c == '\n' {
        lines.push(b + 1)
      }
      if !c.is_ascii() {
        *unicode = true
      }
    }
    lines
  }

  /// Turn a byte index into a [`Position`].
  ///
  /// # Safety
  /// `idx` must be a valid index in the string.
  #[must_use]
  pub fn to_pos(&self, idx: usize) -> Position {
    let (pos, line) = match self.lines.binary_search(&idx) {
      Ok(n) => (idx, n + 1),
      Err(n) => (n.checked_sub(1).map_or(0, |i| self.lines[i]), n),
    };
    Position {
      line: line.try_into().unwrap_or(u32::MAX),
      character: if self.unicode {
        // Safety: we know that `pos` is valid index, and we have assumed that `idx` is
        unsafe { self.s.get_unchecked(pos..idx) }.chars().map(char::len_utf16).sum()
      } else {
        idx - pos
      }
      .try_into()
      .unwrap_or(u32::MAX),
    }
  }

  /// Get the [`Position`] (line and UTF-16 code unit offset) of the end of the file.
  #[must_use]
  pub fn end(&self) -> Position { self.to_pos(self.s.len()) }
}

impl Deref for LinedString {
  type Target = String;
  fn deref(&self) -> &String { &self.s }
}

impl From<String> for LinedString {
  fn from(s: String) -> LinedString {
    let mut unicode = false;
    let lines = LinedString::get_lines(&mut unicode, &s);
    LinedString { s, unicode, lines }
  }
}

impl From<&str> for LinedString {
  fn from(s: &str) -> LinedString { s.to_owned().into() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn positions() {
    let file: LinedString = "ab\ncd\n\nef".into();
    assert_eq!(file.to_pos(0), Position { line: 0, character: 0 });
    assert_eq!(file.to_pos(1), Position { line: 0, character: 1 });
    assert_eq!(file.to_pos(3), Position { line: 1, character: 0 });
    assert_eq!(file.to_pos(6), Position { line: 2, character: 0 });
    assert_eq!(file.to_pos(8), Position { line: 3, character: 1 });
    assert_eq!(file.end(), Position { line: 3, character: 2 });
  }

  #[test]
  fn unicode_columns_are_utf16() {
    let file: LinedString = "a\u{1F600}b\ncd".into();
    // the emoji is 4 bytes and 2 UTF-16 units
    assert_eq!(file.to_pos(5), Position { line: 0, character: 3 });
    assert_eq!(file.to_pos(7), Position { line: 1, character: 0 });
  }
}
