//! Hierarchical names.
//!
//! A [`Name`] is a dotted identifier like `foo.bar.baz`, stored as a linked
//! list of components with the parent prefix shared via [`Arc`]. Cloning a
//! name is a reference count bump, and two names that share a prefix share
//! its storage. Components are either strings or numerals; numeral
//! components show up in machine-generated names like `_notation.3` and
//! `_uniq.17`.

use crate::ArcString;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// One component step of a [`Name`]: either the empty name, or a parent
/// name extended with a string or numeral component.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum NameKind {
  /// The empty (anonymous) name, the root of every name.
  Anon,
  /// `parent.s` where `s` is a string component.
  Str(Name, ArcString),
  /// `parent.n` where `n` is a numeral component.
  Num(Name, u64),
}

/// A hierarchical dotted name. See [`NameKind`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Arc<NameKind>);

static ANON: once_cell::sync::Lazy<Name> =
  once_cell::sync::Lazy::new(|| Name(Arc::new(NameKind::Anon)));

impl Default for Name {
  fn default() -> Self { Self::anon() }
}

impl Name {
  /// The empty name.
  #[must_use]
  pub fn anon() -> Name { ANON.clone() }

  /// Is this the empty name?
  #[must_use]
  pub fn is_anon(&self) -> bool { matches!(*self.0, NameKind::Anon) }

  /// The inner node of this name.
  #[must_use]
  pub fn kind(&self) -> &NameKind { &self.0 }

  /// Extend this name with a string component.
  #[must_use]
  pub fn str(&self, s: impl Into<ArcString>) -> Name {
    Name(Arc::new(NameKind::Str(self.clone(), s.into())))
  }

  /// Extend this name with a numeral component.
  #[must_use]
  pub fn num(&self, n: u64) -> Name {
    Name(Arc::new(NameKind::Num(self.clone(), n)))
  }

  /// A one-component name.
  #[must_use]
  pub fn simple(s: impl Into<ArcString>) -> Name { Name::anon().str(s) }

  /// The parent of this name, if it has one.
  #[must_use]
  pub fn parent(&self) -> Option<&Name> {
    match &*self.0 {
      NameKind::Anon => None,
      NameKind::Str(p, _) | NameKind::Num(p, _) => Some(p),
    }
  }

  /// The number of components.
  #[must_use]
  pub fn len(&self) -> usize {
    let mut n = 0;
    let mut here = self;
    while let Some(p) = here.parent() {
      n += 1;
      here = p
    }
    n
  }

  /// Is this the empty name? (Same as [`is_anon`](Self::is_anon).)
  #[must_use]
  pub fn is_empty(&self) -> bool { self.is_anon() }

  /// Concatenate the components of `other` onto `self`.
  /// `a.b ++ c.d = a.b.c.d`; appending to or of the empty name is the identity.
  #[must_use]
  pub fn append(&self, other: &Name) -> Name {
    match &*other.0 {
      NameKind::Anon => self.clone(),
      NameKind::Str(p, s) => self.append(p).str(s.clone()),
      NameKind::Num(p, n) => self.append(p).num(*n),
    }
  }

  /// Is `self` a (non-strict) prefix of `other`?
  #[must_use]
  pub fn is_prefix_of(&self, other: &Name) -> bool {
    let mut here = other;
    loop {
      if self == here { return true }
      match here.parent() {
        Some(p) => here = p,
        None => return false,
      }
    }
  }

  /// If `pre` is a prefix of `self`, replace it with `new` and return the
  /// result; otherwise `None`. `a.b.c` with prefix `a.b` replaced by `x`
  /// gives `x.c`.
  #[must_use]
  pub fn replace_prefix(&self, pre: &Name, new: &Name) -> Option<Name> {
    if self == pre { return Some(new.clone()) }
    match &*self.0 {
      NameKind::Anon => None,
      NameKind::Str(p, s) => Some(p.replace_prefix(pre, new)?.str(s.clone())),
      NameKind::Num(p, n) => Some(p.replace_prefix(pre, new)?.num(*n)),
    }
  }

  /// The components of this name, root first.
  #[must_use]
  pub fn components(&self) -> Vec<&NameKind> {
    let mut out = vec![];
    let mut here = self;
    while !here.is_anon() {
      out.push(here.kind());
      match here.parent() {
        Some(p) => here = p,
        None => break,
      }
    }
    out.reverse();
    out
  }
}

impl PartialOrd for Name {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// Names are totally ordered: the empty name first, then by parent, then by
/// the final component with string components before numeral ones. This is
/// only used to key ordered maps; it is not a user-visible ordering.
impl Ord for Name {
  fn cmp(&self, other: &Self) -> Ordering {
    if Arc::ptr_eq(&self.0, &other.0) { return Ordering::Equal }
    match (&*self.0, &*other.0) {
      (NameKind::Anon, NameKind::Anon) => Ordering::Equal,
      (NameKind::Anon, _) => Ordering::Less,
      (_, NameKind::Anon) => Ordering::Greater,
      (NameKind::Str(p1, s1), NameKind::Str(p2, s2)) =>
        p1.cmp(p2).then_with(|| s1.cmp(s2)),
      (NameKind::Str(p1, _), NameKind::Num(p2, _)) =>
        p1.cmp(p2).then(Ordering::Less),
      (NameKind::Num(p1, _), NameKind::Str(p2, _)) =>
        p1.cmp(p2).then(Ordering::Greater),
      (NameKind::Num(p1, n1), NameKind::Num(p2, n2)) =>
        p1.cmp(p2).then_with(|| n1.cmp(n2)),
    }
  }
}

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &*self.0 {
      NameKind::Anon => write!(f, "[anonymous]"),
      NameKind::Str(p, s) if p.is_anon() => write!(f, "{s}"),
      NameKind::Str(p, s) => write!(f, "{p}.{s}"),
      NameKind::Num(p, n) if p.is_anon() => write!(f, "{n}"),
      NameKind::Num(p, n) => write!(f, "{p}.{n}"),
    }
  }
}

impl fmt::Debug for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}

/// Parses a dotted name; all-digit components become numeral components.
impl From<&str> for Name {
  fn from(s: &str) -> Name {
    let mut name = Name::anon();
    if s.is_empty() { return name }
    for part in s.split('.') {
      name = match part.parse::<u64>() {
        Ok(n) => name.num(n),
        Err(_) => name.str(part),
      }
    }
    name
  }
}

/// A source of fresh names `_uniq.0`, `_uniq.1`, ...
#[derive(Debug, Clone, Default)]
pub struct NameGen {
  next: u64,
}

static UNIQ: once_cell::sync::Lazy<Name> =
  once_cell::sync::Lazy::new(|| Name::simple("_uniq"));

impl NameGen {
  /// Mint the next unused name.
  pub fn fresh(&mut self) -> Name {
    let n = self.next;
    self.next += 1;
    UNIQ.num(n)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn append_and_prefix() {
    let ab: Name = "a.b".into();
    let cd: Name = "c.d".into();
    let abcd = ab.append(&cd);
    assert_eq!(abcd.to_string(), "a.b.c.d");
    assert!(ab.is_prefix_of(&abcd));
    assert!(!cd.is_prefix_of(&abcd));
    assert!(Name::anon().is_prefix_of(&abcd));
    assert_eq!(abcd.len(), 4);
  }

  #[test]
  fn replace_prefix() {
    let abc: Name = "a.b.c".into();
    let ab: Name = "a.b".into();
    let x = Name::simple("x");
    assert_eq!(abc.replace_prefix(&ab, &x), Some("x.c".into()));
    assert_eq!(abc.replace_prefix(&x, &ab), None);
    assert_eq!(abc.replace_prefix(&abc, &Name::anon()), Some(Name::anon()));
  }

  #[test]
  fn ordering_is_total() {
    let mut names: Vec<Name> =
      ["a", "a.b", "a.c", "b", "a.b.c"].iter().map(|&s| s.into()).collect();
    names.push(Name::simple("a").num(0));
    names.sort();
    for w in names.windows(2) {
      assert!(w[0] < w[1] || w[0] == w[1]);
    }
    let a: Name = "a".into();
    assert!(Name::anon() < a);
    // string components sort before numeral ones under the same parent
    assert!(Name::simple("a").str("z") < Name::simple("a").num(0));
  }

  #[test]
  fn numeric_components_parse() {
    let n: Name = "_notation.5".into();
    assert_eq!(n, Name::simple("_notation").num(5));
    assert_eq!(n.to_string(), "_notation.5");
  }

  #[test]
  fn fresh_names_distinct() {
    let mut generator = NameGen::default();
    let a = generator.fresh();
    let b = generator.fresh();
    assert_ne!(a, b);
    assert_eq!(a.to_string(), "_uniq.0");
    assert_eq!(b.to_string(), "_uniq.1");
  }
}
