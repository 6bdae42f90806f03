//! Pre-expressions and universe levels.
//!
//! A pre-expression is the output of the translation pipeline: a core
//! expression that may still contain [`Choice`](ExprKind::Choice) ambiguity
//! nodes, unresolved constants, and metadata annotations, all to be
//! discharged by the downstream type-directed elaborator. Values are
//! immutable trees behind [`Rc`], so subterms can be shared freely.
//!
//! Metadata ([`ExprKind::Mdata`]) wraps a node with a small ordered
//! key-value map ([`KvMap`]) without altering its logical shape; this is
//! how source positions, field projections, and resolution markers ride
//! along on the tree.

use crate::Name;
use num::BigUint;
use std::fmt;
use std::rc::Rc;

/// How a binder's argument is supplied at application sites.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinderInfo {
  /// `(x : A)`, given explicitly.
  Default,
  /// `{x : A}`, inferred by unification.
  Implicit,
  /// `⦃x : A⦄`, implicit but only when followed by an explicit argument.
  StrictImplicit,
  /// `[x : A]`, inferred by typeclass resolution.
  InstImplicit,
}

/// A universe level expression.
#[derive(Clone, PartialEq, Eq)]
pub struct Level(Rc<LevelKind>);

/// The variants of [`Level`].
#[derive(Debug, PartialEq, Eq)]
pub enum LevelKind {
  /// Level 0, the universe of `Prop`.
  Zero,
  /// The successor of a level.
  Succ(Level),
  /// The maximum of two levels.
  Max(Level, Level),
  /// `imax l1 l2`, which is 0 when `l2` is 0 and `max l1 l2` otherwise.
  Imax(Level, Level),
  /// A universe parameter, named by a `universe` command.
  Param(Name),
  /// A universe metavariable, to be solved downstream.
  Mvar(Name),
}

impl Level {
  /// Level 0.
  #[must_use]
  pub fn zero() -> Level { Level(Rc::new(LevelKind::Zero)) }

  /// The successor of this level.
  #[must_use]
  pub fn succ(self) -> Level { Level(Rc::new(LevelKind::Succ(self))) }

  /// The maximum of two levels.
  #[must_use]
  pub fn max(l1: Level, l2: Level) -> Level { Level(Rc::new(LevelKind::Max(l1, l2))) }

  /// The impredicative maximum of two levels.
  #[must_use]
  pub fn imax(l1: Level, l2: Level) -> Level { Level(Rc::new(LevelKind::Imax(l1, l2))) }

  /// A universe parameter.
  #[must_use]
  pub fn param(name: Name) -> Level { Level(Rc::new(LevelKind::Param(name))) }

  /// A universe metavariable.
  #[must_use]
  pub fn mvar(name: Name) -> Level { Level(Rc::new(LevelKind::Mvar(name))) }

  /// The level `n`, as an `n`-fold successor of zero.
  #[must_use]
  pub fn of_nat(n: u32) -> Level {
    (0..n).fold(Level::zero(), |l, _| l.succ())
  }

  /// The inner node.
  #[must_use]
  pub fn kind(&self) -> &LevelKind { &self.0 }
}

impl fmt::Debug for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind() {
      LevelKind::Zero => write!(f, "0"),
      LevelKind::Succ(l) => write!(f, "(succ {l:?})"),
      LevelKind::Max(l1, l2) => write!(f, "(max {l1:?} {l2:?})"),
      LevelKind::Imax(l1, l2) => write!(f, "(imax {l1:?} {l2:?})"),
      LevelKind::Param(n) => write!(f, "{n}"),
      LevelKind::Mvar(n) => write!(f, "?{n}"),
    }
  }
}

/// A value in a metadata annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KvValue {
  /// A boolean flag.
  Bool(bool),
  /// A natural number.
  Nat(BigUint),
  /// A string.
  Str(String),
  /// A hierarchical name.
  Name(Name),
}

/// A small insertion-ordered key-value map used for metadata annotations.
/// Setting an existing key overwrites its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KvMap(Vec<(Name, KvValue)>);

impl KvMap {
  /// The empty map.
  #[must_use]
  pub fn new() -> KvMap { KvMap::default() }

  fn set(mut self, key: Name, value: KvValue) -> KvMap {
    if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
      entry.1 = value
    } else {
      self.0.push((key, value))
    }
    self
  }

  /// Sets a boolean entry, builder style.
  #[must_use]
  pub fn set_bool(self, key: Name, value: bool) -> KvMap { self.set(key, KvValue::Bool(value)) }

  /// Sets a numeric entry, builder style.
  #[must_use]
  pub fn set_nat(self, key: Name, value: impl Into<BigUint>) -> KvMap {
    self.set(key, KvValue::Nat(value.into()))
  }

  /// Sets a string entry, builder style.
  #[must_use]
  pub fn set_str(self, key: Name, value: impl Into<String>) -> KvMap {
    self.set(key, KvValue::Str(value.into()))
  }

  /// Sets a name entry, builder style.
  #[must_use]
  pub fn set_name(self, key: Name, value: Name) -> KvMap { self.set(key, KvValue::Name(value)) }

  /// Looks up an entry.
  #[must_use]
  pub fn get(&self, key: &Name) -> Option<&KvValue> {
    self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  /// Is the map empty?
  #[must_use]
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// The entries, in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = &(Name, KvValue)> { self.0.iter() }
}

/// A literal value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
  /// A natural number literal.
  Nat(BigUint),
  /// A string literal.
  Str(String),
}

/// A pre-expression. See the [module docs](self).
#[derive(Clone, PartialEq, Eq)]
pub struct Expr(Rc<ExprKind>);

/// The variants of [`Expr`].
#[derive(Debug, PartialEq, Eq)]
pub enum ExprKind {
  /// A bound variable, de Bruijn indexed.
  Bvar(u32),
  /// A free local variable, used for section variables.
  Local(Name),
  /// A constant reference with universe level arguments. An unresolved
  /// identifier is embedded as a constant and flagged through metadata.
  Const(Name, Vec<Level>),
  /// An expression metavariable, standing for a hole.
  Mvar(Name),
  /// A sort at the given level.
  Sort(Level),
  /// Application.
  App(Expr, Expr),
  /// A lambda abstraction: binder info, binder name, domain, body.
  Lambda(BinderInfo, Name, Expr, Expr),
  /// A dependent function type: binder info, binder name, domain, body.
  Pi(BinderInfo, Name, Expr, Expr),
  /// `let name : ty := value in body`.
  Let(Name, Expr, Expr, Expr),
  /// A literal.
  Lit(Literal),
  /// A metadata annotation wrapped around an expression.
  Mdata(KvMap, Expr),
  /// An ambiguity between several interpretations, to be resolved by the
  /// downstream type-directed pass.
  Choice(Box<[Expr]>),
}

impl Expr {
  fn new(k: ExprKind) -> Expr { Expr(Rc::new(k)) }

  /// The inner node.
  #[must_use]
  pub fn kind(&self) -> &ExprKind { &self.0 }

  /// A bound variable.
  #[must_use]
  pub fn bvar(i: u32) -> Expr { Expr::new(ExprKind::Bvar(i)) }

  /// A free local variable.
  #[must_use]
  pub fn local(name: Name) -> Expr { Expr::new(ExprKind::Local(name)) }

  /// A constant reference.
  #[must_use]
  pub fn const_(name: Name, levels: Vec<Level>) -> Expr {
    Expr::new(ExprKind::Const(name, levels))
  }

  /// An expression metavariable.
  #[must_use]
  pub fn mvar(name: Name) -> Expr { Expr::new(ExprKind::Mvar(name)) }

  /// A sort.
  #[must_use]
  pub fn sort(l: Level) -> Expr { Expr::new(ExprKind::Sort(l)) }

  /// An application node.
  #[must_use]
  pub fn app(f: Expr, a: Expr) -> Expr { Expr::new(ExprKind::App(f, a)) }

  /// `f a1 ... an` as a left-associated application spine.
  #[must_use]
  pub fn apps(f: Expr, args: impl IntoIterator<Item = Expr>) -> Expr {
    args.into_iter().fold(f, Expr::app)
  }

  /// A lambda abstraction.
  #[must_use]
  pub fn lam(bi: BinderInfo, name: Name, dom: Expr, body: Expr) -> Expr {
    Expr::new(ExprKind::Lambda(bi, name, dom, body))
  }

  /// A dependent function type.
  #[must_use]
  pub fn pi(bi: BinderInfo, name: Name, dom: Expr, body: Expr) -> Expr {
    Expr::new(ExprKind::Pi(bi, name, dom, body))
  }

  /// A let binding.
  #[must_use]
  pub fn let_(name: Name, ty: Expr, value: Expr, body: Expr) -> Expr {
    Expr::new(ExprKind::Let(name, ty, value, body))
  }

  /// A natural number literal.
  #[must_use]
  pub fn nat(n: impl Into<BigUint>) -> Expr { Expr::new(ExprKind::Lit(Literal::Nat(n.into()))) }

  /// A string literal.
  #[must_use]
  pub fn str(s: impl Into<String>) -> Expr { Expr::new(ExprKind::Lit(Literal::Str(s.into()))) }

  /// Wraps an expression in a metadata annotation. An empty map is the
  /// identity.
  #[must_use]
  pub fn mdata(kv: KvMap, e: Expr) -> Expr {
    if kv.is_empty() { e } else { Expr::new(ExprKind::Mdata(kv, e)) }
  }

  /// An ambiguity node. Panics if `alts` is empty; callers guarantee at
  /// least two alternatives.
  #[must_use]
  pub fn choice(alts: Vec<Expr>) -> Expr {
    assert!(!alts.is_empty(), "choice of zero alternatives");
    Expr::new(ExprKind::Choice(alts.into()))
  }

  /// Strips any metadata annotations off the head of this expression.
  #[must_use]
  pub fn unwrap_annotations(&self) -> &Expr {
    let mut e = self;
    while let ExprKind::Mdata(_, inner) = e.kind() {
      e = inner
    }
    e
  }

  /// Looks up a metadata key anywhere in the annotation chain at the head
  /// of this expression.
  #[must_use]
  pub fn annotation(&self, key: &Name) -> Option<&KvValue> {
    let mut e = self;
    while let ExprKind::Mdata(kv, inner) = e.kind() {
      if let Some(v) = kv.get(key) {
        return Some(v)
      }
      e = inner
    }
    None
  }
}

impl fmt::Debug for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind() {
      ExprKind::Bvar(i) => write!(f, "#{i}"),
      ExprKind::Local(n) => write!(f, "{n}"),
      ExprKind::Const(n, ls) => {
        if ls.is_empty() {
          write!(f, "{n}")
        } else {
          write!(f, "{n}.{{")?;
          for (i, l) in ls.iter().enumerate() {
            if i != 0 {
              write!(f, " ")?
            }
            write!(f, "{l:?}")?
          }
          write!(f, "}}")
        }
      }
      ExprKind::Mvar(n) => write!(f, "?{n}"),
      ExprKind::Sort(l) => write!(f, "(sort {l:?})"),
      ExprKind::App(g, a) => write!(f, "({g:?} {a:?})"),
      ExprKind::Lambda(_, n, d, b) => write!(f, "(fun ({n} : {d:?}) {b:?})"),
      ExprKind::Pi(_, n, d, b) => write!(f, "(pi ({n} : {d:?}) {b:?})"),
      ExprKind::Let(n, t, v, b) => write!(f, "(let ({n} : {t:?} := {v:?}) {b:?})"),
      ExprKind::Lit(Literal::Nat(n)) => write!(f, "{n}"),
      ExprKind::Lit(Literal::Str(s)) => write!(f, "{s:?}"),
      ExprKind::Mdata(kv, e) => {
        write!(f, "(mdata")?;
        for (k, v) in kv.iter() {
          write!(f, " {k}:={v:?}")?
        }
        write!(f, " {e:?})")
      }
      ExprKind::Choice(es) => {
        write!(f, "(choice")?;
        for e in &**es {
          write!(f, " {e:?}")?
        }
        write!(f, ")")
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kvmap_overwrites() {
    let key = Name::simple("row");
    let kv = KvMap::new().set_nat(key.clone(), 1u32).set_nat(key.clone(), 2u32);
    assert_eq!(kv.get(&key), Some(&KvValue::Nat(2u32.into())));
    assert_eq!(kv.iter().count(), 1);
  }

  #[test]
  fn mdata_of_empty_map_is_identity() {
    let e = Expr::local(Name::simple("x"));
    assert_eq!(Expr::mdata(KvMap::new(), e.clone()), e);
  }

  #[test]
  fn annotation_lookup_through_chain() {
    let row = Name::simple("row");
    let field = Name::simple("field");
    let e = Expr::mdata(
      KvMap::new().set_nat(row.clone(), 7u32),
      Expr::mdata(
        KvMap::new().set_name(field.clone(), Name::simple("fst")),
        Expr::bvar(0),
      ),
    );
    assert_eq!(e.annotation(&row), Some(&KvValue::Nat(7u32.into())));
    assert_eq!(e.annotation(&field), Some(&KvValue::Name(Name::simple("fst"))));
    assert_eq!(e.unwrap_annotations(), &Expr::bvar(0));
  }

  #[test]
  fn level_of_nat() {
    assert_eq!(Level::of_nat(0), Level::zero());
    assert_eq!(Level::of_nat(2), Level::zero().succ().succ());
  }
}
