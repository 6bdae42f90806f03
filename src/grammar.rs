//! The live parser configuration: the data the elaborator feeds back to
//! the parser as notations are declared.
//!
//! The parser is an external collaborator. It consumes two tables from
//! here: a [`TokenTable`], the prefix trie of tokens the tokenizer should
//! recognize, and a rule table keyed by minted notation-kind name telling
//! it how to parse each user notation. Both are persistent structures with
//! the same sharing discipline as [`RbMap`](crate::RbMap): a scope snapshot
//! is a cheap clone, and restoring it on `end` makes section-local notation
//! vanish without bookkeeping.

use crate::{ArcString, Name, NotationId, RbMap};
use std::fmt;
use std::sync::Arc;

/// A precedence level. Tokens bind at most [`Prec::MAX`], the precedence
/// of atomic terms.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Prec(pub u32);

impl Prec {
  /// The precedence of atomic terms, the default for unannotated tokens.
  pub const MAX: Prec = Prec(1024);
}

impl fmt::Display for Prec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// One element of a notation rule, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotationItem {
  /// Expect this literal token.
  Literal {
    /// The token text.
    token: ArcString,
    /// The token's precedence.
    prec: Prec,
  },
  /// Parse a term argument at the given precedence.
  Slot {
    /// The argument name, referenced by the notation's expansion template.
    name: Name,
    /// The maximum precedence of the parsed term.
    prec: Prec,
  },
  /// Parse a binder group; the bound names scope over later slots.
  Binder,
}

impl NotationItem {
  /// The `(token, precedence)` pair of this item, used for positional
  /// comparison against reserved notations. Binder items have neither.
  #[must_use]
  pub fn token_prec(&self) -> (Option<&ArcString>, Option<Prec>) {
    match self {
      NotationItem::Literal { token, prec } => (Some(token), Some(*prec)),
      NotationItem::Slot { prec, .. } => (None, Some(*prec)),
      NotationItem::Binder => (None, None),
    }
  }
}

/// One grammar rule: how to parse a declared (or reserved) notation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotationRule {
  /// The notation this rule parses into.
  pub id: NotationId,
  /// The literal/slot/binder sequence.
  pub items: Vec<NotationItem>,
  /// A reservation from `reserve notation`: the rule shape exists but no
  /// notation has claimed it yet, so the expander has no entry for it.
  pub reserved: bool,
}

impl NotationRule {
  /// The first literal token of the rule, which keys reservation matching.
  #[must_use]
  pub fn leading_token(&self) -> Option<&ArcString> {
    self.items.iter().find_map(|item| match item {
      NotationItem::Literal { token, .. } => Some(token),
      _ => None,
    })
  }

  /// The precedence attached to the leading token.
  #[must_use]
  pub fn leading_prec(&self) -> Option<Prec> {
    self.items.iter().find_map(|item| match item {
      NotationItem::Literal { prec, .. } => Some(*prec),
      _ => None,
    })
  }
}

#[derive(Debug)]
struct TrieNode {
  /// The precedence of the token ending here, if a token ends here.
  terminal: Option<Prec>,
  /// Children sorted by byte.
  children: Vec<(u8, TokenTrie)>,
}

#[derive(Debug, Default)]
struct TokenTrie(Option<Arc<TrieNode>>);

impl Clone for TokenTrie {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl TokenTrie {
  fn insert(&self, bytes: &[u8], prec: Prec) -> TokenTrie {
    let (mut terminal, mut children) = match self.0.as_deref() {
      Some(n) => (n.terminal, n.children.clone()),
      None => (None, vec![]),
    };
    match bytes.split_first() {
      None => terminal = Some(prec),
      Some((&b, rest)) => match children.binary_search_by_key(&b, |&(b2, _)| b2) {
        Ok(i) => {
          let updated = children[i].1.insert(rest, prec);
          children[i].1 = updated
        }
        Err(i) => children.insert(i, (b, TokenTrie::default().insert(rest, prec))),
      },
    }
    TokenTrie(Some(Arc::new(TrieNode { terminal, children })))
  }

  fn child(&self, b: u8) -> Option<&TokenTrie> {
    let n = self.0.as_deref()?;
    let i = n.children.binary_search_by_key(&b, |&(b2, _)| b2).ok()?;
    Some(&n.children[i].1)
  }

  fn terminal(&self) -> Option<Prec> { self.0.as_deref()?.terminal }
}

/// The prefix trie of notation tokens the tokenizer recognizes.
///
/// Persistent: inserting returns nothing but replaces the interior `Arc`
/// spine, and clones taken before an insert are unaffected.
#[derive(Clone, Debug, Default)]
pub struct TokenTable(TokenTrie);

impl TokenTable {
  /// Registers a token with its precedence. Re-registering a token
  /// overwrites its precedence.
  pub fn insert(&mut self, token: &ArcString, prec: Prec) {
    self.0 = self.0.insert(token, prec)
  }

  /// The precedence of an exact token, if registered.
  #[must_use]
  pub fn get(&self, token: &[u8]) -> Option<Prec> {
    let mut t = &self.0;
    for &b in token {
      t = t.child(b)?
    }
    t.terminal()
  }

  /// Longest-match query: the longest registered token that is a prefix of
  /// `input`, with its length and precedence.
  #[must_use]
  pub fn longest_match(&self, input: &[u8]) -> Option<(usize, Prec)> {
    let mut t = &self.0;
    let mut best = None;
    for (i, &b) in input.iter().enumerate() {
      if let Some(prec) = t.terminal() {
        best = Some((i, prec))
      }
      match t.child(b) {
        Some(next) => t = next,
        None => return best,
      }
    }
    if let Some(prec) = t.terminal() {
      best = Some((input.len(), prec))
    }
    best
  }
}

/// The parser configuration served to the external parser: the token trie
/// plus the per-kind-name rule table.
#[derive(Clone, Debug, Default)]
pub struct ParserConfig {
  /// Tokens the tokenizer recognizes.
  pub tokens: TokenTable,
  /// Notation parse rules, keyed by minted kind name.
  pub rules: RbMap<Name, NotationRule>,
}

impl ParserConfig {
  /// An empty configuration; the builtin grammar is the parser's own.
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Folds a rule into the configuration: every literal token of the rule
  /// goes into the token trie, and the rule is registered under its minted
  /// kind name. Registering under an existing name replaces the rule,
  /// which is how a reservation is claimed.
  pub fn register(&mut self, rule: NotationRule) {
    for item in &rule.items {
      if let NotationItem::Literal { token, prec } = item {
        self.tokens.insert(token, *prec);
      }
    }
    self.rules = self.rules.insert(rule.id.name(), rule);
  }

  /// Looks up the rule for a minted kind name.
  #[must_use]
  pub fn rule(&self, name: &Name) -> Option<&NotationRule> { self.rules.get(name) }

  /// An iterator over the reserved rules awaiting a notation.
  pub fn reserved_rules(&self) -> impl Iterator<Item = &NotationRule> {
    self.rules.iter().map(|(_, r)| r).filter(|r| r.reserved)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lit(token: &str, prec: u32) -> NotationItem {
    NotationItem::Literal { token: token.into(), prec: Prec(prec) }
  }

  fn slot(name: &str, prec: u32) -> NotationItem {
    NotationItem::Slot { name: name.into(), prec: Prec(prec) }
  }

  #[test]
  fn longest_match_prefers_longer_tokens() {
    let mut tokens = TokenTable::default();
    tokens.insert(&"=".into(), Prec(50));
    tokens.insert(&"=>".into(), Prec(25));
    tokens.insert(&"=?=".into(), Prec(30));
    assert_eq!(tokens.longest_match(b"=>x"), Some((2, Prec(25))));
    assert_eq!(tokens.longest_match(b"=x"), Some((1, Prec(50))));
    assert_eq!(tokens.longest_match(b"=?=y"), Some((3, Prec(30))));
    assert_eq!(tokens.longest_match(b"=?x"), Some((1, Prec(50))));
    assert_eq!(tokens.longest_match(b"x"), None);
    assert_eq!(tokens.get(b"=>"), Some(Prec(25)));
    assert_eq!(tokens.get(b"=?"), None);
  }

  #[test]
  fn snapshots_unaffected_by_later_registration() {
    let mut cfg = ParserConfig::new();
    cfg.register(NotationRule {
      id: crate::NotationId(0),
      items: vec![slot("x", 50), lit("+", 50), slot("y", 51)],
      reserved: false,
    });
    let snapshot = cfg.clone();
    cfg.register(NotationRule {
      id: crate::NotationId(1),
      items: vec![lit("~", 100), slot("x", 100)],
      reserved: false,
    });
    assert!(cfg.tokens.get(b"~").is_some());
    assert!(snapshot.tokens.get(b"~").is_none());
    assert!(snapshot.rule(&crate::NotationId(1).name()).is_none());
    assert!(snapshot.rule(&crate::NotationId(0).name()).is_some());
  }

  #[test]
  fn leading_token_skips_slots() {
    let rule = NotationRule {
      id: crate::NotationId(2),
      items: vec![slot("x", 50), lit("+", 50), slot("y", 51)],
      reserved: true,
    };
    assert_eq!(rule.leading_token(), Some(&"+".into()));
    assert_eq!(rule.leading_prec(), Some(Prec(50)));
  }
}
