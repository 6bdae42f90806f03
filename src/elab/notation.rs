//! Notation specifications and expansion templates.
//!
//! A `notation` or `reserve notation` command carries a sequence of spec
//! items: literal tokens, expression slots, and binders, each with an
//! optional precedence. [`NotationSpec::parse`] reads them off the syntax
//! tree; [`NotationSpec::resolve`] fills in missing precedences, either
//! from a matching reserved rule or from defaults, producing the
//! [`NotationItem`](crate::grammar::NotationItem)s that go into the
//! parser configuration.
//!
//! A plain `notation` additionally registers a [`NotationExpander`]: the
//! parameter list and the right-hand-side template. When the parser later
//! produces a node of the minted kind, [`NotationExpander::expand`]
//! substitutes the node's children for the parameters and the result is
//! elaborated in place of the original node.

use crate::elab::{ElabError, Result};
use crate::grammar::{NotationItem, NotationRule, Prec};
use crate::syntax::{BuiltinKind, SyntaxKind};
use crate::util::RcExt;
use crate::{ArcString, Name, RbMap, Span, Syntax};
use num::BigUint;
use std::rc::Rc;

/// The expansion side of a registered notation. `params` are positional:
/// the k-th child of a notation node replaces occurrences of the k-th
/// parameter in the template.
#[derive(Clone, Debug)]
pub struct NotationExpander {
  params: Vec<Name>,
  template: Syntax,
}

impl NotationExpander {
  /// Pairs a parameter list with its template.
  #[must_use]
  pub fn new(params: Vec<Name>, template: Syntax) -> Self {
    NotationExpander { params, template }
  }

  /// Substitutes `args` for the parameters in the template, or `None` if
  /// the arity does not match.
  #[must_use]
  pub fn expand(&self, args: &[Syntax]) -> Option<Syntax> {
    if args.len() != self.params.len() {
      return None
    }
    Some(self.subst(&self.template, args))
  }

  fn subst(&self, stx: &Syntax, args: &[Syntax]) -> Syntax {
    match stx {
      Syntax::Ident(i) => match self.params.iter().position(|p| *p == i.name) {
        Some(k) => args[k].clone(),
        None => stx.clone(),
      },
      Syntax::Node(n) => {
        let mut node = RcExt::unwrap(n.clone());
        let new_args = node.args.iter().map(|a| self.subst(a, args)).collect();
        node.args = new_args;
        Syntax::Node(Rc::new(node))
      }
      _ => stx.clone(),
    }
  }
}

/// The expanders known to the elaborator, keyed by minted kind name.
/// Persistent, so reservations claimed inside a section survive in the
/// snapshots that scopes restore.
#[derive(Clone, Debug, Default)]
pub struct NotationTable(RbMap<Name, NotationExpander>);

impl NotationTable {
  /// An empty table.
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Looks up the expander for a minted kind name.
  #[must_use]
  pub fn get(&self, name: &Name) -> Option<&NotationExpander> { self.0.get(name) }

  /// Registers (or replaces) the expander for a minted kind name.
  pub fn register(&mut self, name: Name, exp: NotationExpander) {
    self.0 = self.0.insert(name, exp);
  }
}

/// One item of a notation specification as written, precedence still
/// optional.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecItem {
  /// A literal token.
  Literal {
    /// The token text.
    token: ArcString,
    /// Its precedence, if annotated.
    prec: Option<Prec>,
  },
  /// An expression slot, named for the template.
  Slot {
    /// The parameter name.
    name: Name,
    /// Its precedence, if annotated.
    prec: Option<Prec>,
  },
  /// A binder slot. The name is [`Name::anon`] when the binder is
  /// anonymous.
  Binder(Name),
}

/// A parsed notation specification.
#[derive(Clone, Debug)]
pub struct NotationSpec {
  /// The items, in source order. Folds are not items; see `fold_spans`.
  pub items: Vec<SpecItem>,
  /// Positions of `foldr`/`foldl` items, which are not supported and get
  /// reported then dropped.
  pub fold_spans: Vec<Option<Span>>,
}

fn prec_value(stx: &Syntax, fallback: Span) -> Result<Prec> {
  let pos = stx.get_pos().unwrap_or(fallback);
  let v = stx
    .as_kind(BuiltinKind::Number)
    .and_then(|n| if let [arg] = &*n.args { arg.as_atom() } else { None })
    .and_then(|a| BigUint::parse_bytes(&a.val, 10))
    .ok_or_else(|| ElabError::new_e(pos, "ill-formed precedence"))?;
  let v = u32::try_from(&v).map_err(|_| ElabError::new_e(pos, "precedence too large"))?;
  Ok(Prec(v))
}

impl NotationSpec {
  /// Reads a specification off the item children of a `notation` or
  /// `reserve notation` node.
  pub fn parse(args: &[Syntax], fallback: Span) -> Result<NotationSpec> {
    let mut items = vec![];
    let mut fold_spans = vec![];
    for arg in args {
      let pos = arg.get_pos().unwrap_or(fallback);
      let ill = || ElabError::new_e(pos, "ill-formed notation");
      let n = arg.as_node().ok_or_else(ill)?;
      match n.kind {
        SyntaxKind::Builtin(BuiltinKind::NotaLiteral) => {
          let (tok, prec) = match &*n.args {
            [tok] => (tok, None),
            [tok, prec] => (tok, Some(prec_value(prec, fallback)?)),
            _ => return Err(ill()),
          };
          let tok = tok.as_atom().ok_or_else(ill)?;
          items.push(SpecItem::Literal { token: tok.val.clone(), prec });
        }
        SyntaxKind::Builtin(BuiltinKind::NotaSlot) => {
          let (id, prec) = match &*n.args {
            [id] => (id, None),
            [id, prec] => (id, Some(prec_value(prec, fallback)?)),
            _ => return Err(ill()),
          };
          let id = id.as_ident().ok_or_else(ill)?;
          items.push(SpecItem::Slot { name: id.name.clone(), prec });
        }
        SyntaxKind::Builtin(BuiltinKind::NotaBinder) => {
          let name = match &*n.args {
            [] => Name::anon(),
            [id] => id.as_ident().ok_or_else(ill)?.name.clone(),
            _ => return Err(ill()),
          };
          items.push(SpecItem::Binder(name));
        }
        SyntaxKind::Builtin(BuiltinKind::NotaFold) => fold_spans.push(n.span),
        _ => return Err(ill()),
      }
    }
    Ok(NotationSpec { items, fold_spans })
  }

  /// The template parameters, in item order. An anonymous binder
  /// contributes [`Name::anon`], which no identifier can refer to.
  #[must_use]
  pub fn params(&self) -> Vec<Name> {
    self
      .items
      .iter()
      .filter_map(|item| match item {
        SpecItem::Literal { .. } => None,
        SpecItem::Slot { name, .. } => Some(name.clone()),
        SpecItem::Binder(name) => Some(name.clone()),
      })
      .collect()
  }

  /// Whether this specification matches `rule`, positionally: same item
  /// count, same tokens, and every annotated precedence equal to the
  /// rule's. Unannotated precedences match anything; slot names are
  /// template-local and ignored.
  #[must_use]
  pub fn matches(&self, rule: &NotationRule) -> bool {
    self.items.len() == rule.items.len()
      && self.items.iter().zip(&rule.items).all(|pair| match pair {
        (SpecItem::Literal { token, prec }, NotationItem::Literal { token: t2, prec: p2 }) =>
          token == t2 && prec.map_or(true, |p| p == *p2),
        (SpecItem::Slot { prec, .. }, NotationItem::Slot { prec: p2, .. }) =>
          prec.map_or(true, |p| p == *p2),
        (SpecItem::Binder(_), NotationItem::Binder) => true,
        _ => false,
      })
  }

  /// Fills in missing precedences and produces the parser-facing items.
  /// An unannotated item inherits the precedence of the corresponding
  /// item of `reserved` when one is given; otherwise literals and slots
  /// default to [`Prec::MAX`], except that the trailing slot of a
  /// reservation defaults to 0, which is what makes `reserve notation`
  /// declarations usable by both left- and right-nested claims.
  #[must_use]
  pub fn resolve(&self, reserved: Option<&NotationRule>, is_reservation: bool) -> Vec<NotationItem> {
    let last = self.items.len().checked_sub(1);
    self
      .items
      .iter()
      .enumerate()
      .map(|(k, item)| {
        let inherited = reserved.and_then(|r| match r.items.get(k) {
          Some(NotationItem::Literal { prec, .. } | NotationItem::Slot { prec, .. }) => Some(*prec),
          _ => None,
        });
        match item {
          SpecItem::Literal { token, prec } => NotationItem::Literal {
            token: token.clone(),
            prec: prec.or(inherited).unwrap_or(Prec::MAX),
          },
          SpecItem::Slot { name, prec } => {
            let default =
              if is_reservation && Some(k) == last { Prec(0) } else { Prec::MAX };
            NotationItem::Slot {
              name: name.clone(),
              prec: prec.or(inherited).unwrap_or(default),
            }
          }
          SpecItem::Binder(_) => NotationItem::Binder,
        }
      })
      .collect()
  }
}
