//! Concrete syntax trees, as handed over by the parser.
//!
//! The elaborator does not parse text. It consumes [`Syntax`] trees through
//! a [`CommandSource`](crate::elab::CommandSource) and only ever inspects
//! them structurally: what kind of node is this, what are its children,
//! where is it in the source. Node kinds come in two flavors, and the
//! distinction runs through the whole crate:
//!
//! - [`BuiltinKind`] is the closed set of command, term and auxiliary kinds
//!   this language version ships with. Dispatch on these is a plain `match`.
//! - [`SyntaxKind::Notation`] kinds are minted at elaboration time by
//!   `notation` commands and dispatched through a runtime table, since user
//!   notation extends the grammar while the file is being processed.
//!
//! Identifier leaves carry a `preresolved` slot that the resolution
//! pre-pass fills with candidate interpretations before `to_pexpr` runs.

use crate::{ArcString, Name, Span};
use std::fmt;
use std::rc::Rc;

/// Identifies one user-declared notation. The numeric value is the command
/// counter at the time the notation was declared, so ids are unique for a
/// whole run; [`name`](Self::name) renders the associated kind name
/// `_notation.<n>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NotationId(pub u64);

static NOTATION: once_cell::sync::Lazy<Name> =
  once_cell::sync::Lazy::new(|| Name::simple("_notation"));

impl NotationId {
  /// The minted kind name `_notation.<n>` for this notation.
  #[must_use]
  pub fn name(self) -> Name { NOTATION.num(self.0) }
}

impl fmt::Display for NotationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.name().fmt(f) }
}

/// The fixed set of syntax node kinds known to this language version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuiltinKind {
  // module structure
  /// End of input.
  Eoi,
  /// `end [name]`, closing a `namespace` or `section`.
  End,
  /// `namespace <name>`.
  Namespace,
  /// `section [name]`.
  Section,
  /// `variables <binder groups>`.
  Variables,
  /// `universe <idents>`.
  Universe,
  /// `def`/`theorem`/`example`/`abbreviation`/`constant`/`inductive`/`structure`.
  Declaration,
  /// `notation <spec> := <term>`.
  Notation,
  /// `reserve notation <spec>`.
  ReserveNotation,
  /// `attribute [attrs] <targets>`.
  Attribute,
  /// `open <spec>...`.
  Open,
  /// `export <spec>...`.
  Export,
  /// `#check <term>`.
  Check,
  /// `set_option <name> [value]`.
  SetOption,
  /// `include <idents>`.
  Include,
  /// `init_quot`.
  InitQuot,

  // terms
  /// Application `f a b` (n-ary, folded left).
  App,
  /// `fun <binders>, e` / `λ <binders>, e`.
  Lambda,
  /// `Π <binders>, e` / `∀ <binders>, e`.
  Pi,
  /// Non-dependent arrow `a → b`.
  Arrow,
  /// `let x [: ty] := v in e`.
  Let,
  /// `have [h] : ty := proof, e`.
  Have,
  /// `show ty, from e`.
  Show,
  /// `Prop` / `Type` / `Sort`, with an optional level argument.
  Sort,
  /// A numeral literal (single atom child holding the digits).
  Number,
  /// A string literal (single atom child holding the contents).
  StrLit,
  /// The placeholder `_`.
  Hole,
  /// A parenthesized term (also used for parenthesized levels).
  Paren,
  /// Anonymous constructor `⟨e, ...⟩`.
  AnonCtor,
  /// Structure instance `{ [src .] f := v, ..., ..e }`.
  StructInst,
  /// One `f := v` item inside a structure instance.
  StructInstItem,
  /// One `..e` source inside a structure instance.
  StructInstSource,
  /// `match e, ... with | arms end` (kept opaque for a downstream pass).
  Match,
  /// One `| pats := rhs` arm of a match.
  MatchArm,
  /// Projection `e.1` / `e.fld`.
  Proj,
  /// Explicit-application marker `@f`.
  Explicit,
  /// Inaccessible pattern `.(e)`.
  Inaccessible,
  /// Borrowed marker `@&e`.
  Borrowed,
  /// Parser ambiguity between overloaded interpretations.
  Choice,
  /// Identifier with explicit universes `f.{u v}`.
  IdentUnivs,

  // universe levels
  /// `max l1 l2 ...`.
  LevelMax,
  /// `imax l1 l2 ...`.
  LevelImax,
  /// `l + <numeral>`.
  LevelAdd,

  // binder groups
  /// `(x y : ty)`.
  BinderExplicit,
  /// `{x y : ty}`.
  BinderImplicit,
  /// `[x : ty]` (instance-implicit).
  BinderInstImplicit,
  /// `⦃x y : ty⦄` (strict-implicit).
  BinderStrictImplicit,
  /// `: ty` (in binders, `let`, declaration signatures).
  TypeAscription,

  // declaration pieces
  /// The modifier list of a declaration (`private`, `meta`, doc string, ...).
  DeclModifiers,
  /// A declaration signature: binder groups plus optional result type.
  DeclSig,
  /// One introduction rule of an `inductive`.
  IntroRule,

  // attribute / open pieces
  /// The attribute-name list of an `attribute` command.
  AttrNames,
  /// One `<ns> [as <m>] [(only ...)] [(hiding ...)]` clause of `open`/`export`.
  OpenSpec,
  /// `as <m>` inside an open spec.
  AsClause,
  /// `(only a b c)` inside an open spec.
  OnlyClause,
  /// `(hiding a b c)` inside an open spec.
  HidingClause,

  // notation specs
  /// A literal token in a notation spec, with optional precedence.
  NotaLiteral,
  /// An argument slot in a notation spec, with optional precedence.
  NotaSlot,
  /// A binder slot in a notation spec.
  NotaBinder,
  /// A fold action in a notation spec (recognized but unsupported).
  NotaFold,
}

impl BuiltinKind {
  /// The hierarchical kind name, used in diagnostics like `unknown command: X`.
  #[must_use]
  pub fn name(self) -> &'static str {
    match self {
      BuiltinKind::Eoi => "module.eoi",
      BuiltinKind::End => "command.end",
      BuiltinKind::Namespace => "command.namespace",
      BuiltinKind::Section => "command.section",
      BuiltinKind::Variables => "command.variables",
      BuiltinKind::Universe => "command.universe",
      BuiltinKind::Declaration => "command.declaration",
      BuiltinKind::Notation => "command.notation",
      BuiltinKind::ReserveNotation => "command.reserve_notation",
      BuiltinKind::Attribute => "command.attribute",
      BuiltinKind::Open => "command.open",
      BuiltinKind::Export => "command.export",
      BuiltinKind::Check => "command.#check",
      BuiltinKind::SetOption => "command.set_option",
      BuiltinKind::Include => "command.include",
      BuiltinKind::InitQuot => "command.init_quot",
      BuiltinKind::App => "term.app",
      BuiltinKind::Lambda => "term.lambda",
      BuiltinKind::Pi => "term.pi",
      BuiltinKind::Arrow => "term.arrow",
      BuiltinKind::Let => "term.let",
      BuiltinKind::Have => "term.have",
      BuiltinKind::Show => "term.show",
      BuiltinKind::Sort => "term.sort",
      BuiltinKind::Number => "term.number",
      BuiltinKind::StrLit => "term.string",
      BuiltinKind::Hole => "term.hole",
      BuiltinKind::Paren => "term.paren",
      BuiltinKind::AnonCtor => "term.anonymous_constructor",
      BuiltinKind::StructInst => "term.structure_instance",
      BuiltinKind::StructInstItem => "term.structure_instance_item",
      BuiltinKind::StructInstSource => "term.structure_instance_source",
      BuiltinKind::Match => "term.match",
      BuiltinKind::MatchArm => "term.match_arm",
      BuiltinKind::Proj => "term.projection",
      BuiltinKind::Explicit => "term.explicit",
      BuiltinKind::Inaccessible => "term.inaccessible",
      BuiltinKind::Borrowed => "term.borrowed",
      BuiltinKind::Choice => "term.choice",
      BuiltinKind::IdentUnivs => "term.ident_univs",
      BuiltinKind::LevelMax => "level.max",
      BuiltinKind::LevelImax => "level.imax",
      BuiltinKind::LevelAdd => "level.add",
      BuiltinKind::BinderExplicit => "binder.explicit",
      BuiltinKind::BinderImplicit => "binder.implicit",
      BuiltinKind::BinderInstImplicit => "binder.inst_implicit",
      BuiltinKind::BinderStrictImplicit => "binder.strict_implicit",
      BuiltinKind::TypeAscription => "binder.type_ascription",
      BuiltinKind::DeclModifiers => "declaration.modifiers",
      BuiltinKind::DeclSig => "declaration.sig",
      BuiltinKind::IntroRule => "declaration.intro_rule",
      BuiltinKind::AttrNames => "attribute.names",
      BuiltinKind::OpenSpec => "open.spec",
      BuiltinKind::AsClause => "open.as",
      BuiltinKind::OnlyClause => "open.only",
      BuiltinKind::HidingClause => "open.hiding",
      BuiltinKind::NotaLiteral => "notation_spec.literal",
      BuiltinKind::NotaSlot => "notation_spec.slot",
      BuiltinKind::NotaBinder => "notation_spec.binder",
      BuiltinKind::NotaFold => "notation_spec.fold",
    }
  }

  /// Is this one of the top-level command kinds?
  #[must_use]
  pub fn is_command(self) -> bool {
    matches!(
      self,
      BuiltinKind::Eoi
        | BuiltinKind::End
        | BuiltinKind::Namespace
        | BuiltinKind::Section
        | BuiltinKind::Variables
        | BuiltinKind::Universe
        | BuiltinKind::Declaration
        | BuiltinKind::Notation
        | BuiltinKind::ReserveNotation
        | BuiltinKind::Attribute
        | BuiltinKind::Open
        | BuiltinKind::Export
        | BuiltinKind::Check
        | BuiltinKind::SetOption
        | BuiltinKind::Include
        | BuiltinKind::InitQuot
    )
  }
}

impl fmt::Display for BuiltinKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.name().fmt(f) }
}

/// The kind of a [`SyntaxNode`]: a builtin, or a minted notation kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyntaxKind {
  /// One of the closed set of kinds in [`BuiltinKind`].
  Builtin(BuiltinKind),
  /// A runtime-minted notation kind, dispatched through the notation table.
  Notation(NotationId),
}

impl fmt::Display for SyntaxKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SyntaxKind::Builtin(k) => k.fmt(f),
      SyntaxKind::Notation(id) => id.fmt(f),
    }
  }
}

impl From<BuiltinKind> for SyntaxKind {
  fn from(k: BuiltinKind) -> Self { SyntaxKind::Builtin(k) }
}
impl From<NotationId> for SyntaxKind {
  fn from(id: NotationId) -> Self { SyntaxKind::Notation(id) }
}

/// A terminal token: keyword, punctuation, or the raw text of a literal.
#[derive(Clone, Debug)]
pub struct Atom {
  /// The source location, if known.
  pub span: Option<Span>,
  /// The token text.
  pub val: ArcString,
}

/// An identifier leaf.
#[derive(Clone, Debug)]
pub struct Ident {
  /// The source location, if known.
  pub span: Option<Span>,
  /// The identifier as written: relative, possibly dotted.
  pub name: Name,
  /// Candidate resolutions, filled by the preresolution pass.
  /// Empty both before the pass and for an unresolvable name.
  pub preresolved: Vec<Name>,
}

/// An interior node: a kind and its children.
#[derive(Clone, Debug)]
pub struct SyntaxNode {
  /// The node kind.
  pub kind: SyntaxKind,
  /// The source location of the whole production, if known.
  pub span: Option<Span>,
  /// The children, in source order.
  pub args: Vec<Syntax>,
}

/// A concrete syntax tree.
#[derive(Clone, Debug)]
pub enum Syntax {
  /// A parse hole left by error recovery.
  Missing,
  /// A terminal token.
  Atom(Atom),
  /// An identifier leaf.
  Ident(Box<Ident>),
  /// An interior node. [`Rc`] so notation templates can be cheaply reused.
  Node(Rc<SyntaxNode>),
}

impl Syntax {
  /// Builds an atom with no position.
  #[must_use]
  pub fn atom(val: impl Into<ArcString>) -> Syntax {
    Syntax::Atom(Atom { span: None, val: val.into() })
  }

  /// Builds an identifier with no position and no preresolution.
  #[must_use]
  pub fn ident(name: impl Into<Name>) -> Syntax {
    Syntax::Ident(Box::new(Ident { span: None, name: name.into(), preresolved: vec![] }))
  }

  /// Builds a node with no position.
  #[must_use]
  pub fn node(kind: impl Into<SyntaxKind>, args: Vec<Syntax>) -> Syntax {
    Syntax::Node(Rc::new(SyntaxNode { kind: kind.into(), span: None, args }))
  }

  /// Builds a node with a position.
  #[must_use]
  pub fn node_at(kind: impl Into<SyntaxKind>, span: impl Into<Span>, args: Vec<Syntax>) -> Syntax {
    Syntax::Node(Rc::new(SyntaxNode { kind: kind.into(), span: Some(span.into()), args }))
  }

  /// Attaches a span to this tree's root.
  #[must_use]
  pub fn with_span(self, span: impl Into<Span>) -> Syntax {
    let span = Some(span.into());
    match self {
      Syntax::Missing => Syntax::Missing,
      Syntax::Atom(a) => Syntax::Atom(Atom { span, ..a }),
      Syntax::Ident(mut i) => {
        i.span = span;
        Syntax::Ident(i)
      }
      Syntax::Node(n) => {
        let SyntaxNode { kind, args, .. } = (*n).clone();
        Syntax::Node(Rc::new(SyntaxNode { kind, span, args }))
      }
    }
  }

  /// The kind of this tree, if it is an interior node.
  #[must_use]
  pub fn kind(&self) -> Option<SyntaxKind> {
    if let Syntax::Node(n) = self { Some(n.kind) } else { None }
  }

  /// This tree as an interior node.
  #[must_use]
  pub fn as_node(&self) -> Option<&SyntaxNode> {
    if let Syntax::Node(n) = self { Some(n) } else { None }
  }

  /// This tree as a node of the given builtin kind.
  #[must_use]
  pub fn as_kind(&self, kind: BuiltinKind) -> Option<&SyntaxNode> {
    self.as_node().filter(|n| n.kind == SyntaxKind::Builtin(kind))
  }

  /// This tree as an identifier leaf.
  #[must_use]
  pub fn as_ident(&self) -> Option<&Ident> {
    if let Syntax::Ident(i) = self { Some(i) } else { None }
  }

  /// This tree as an atom.
  #[must_use]
  pub fn as_atom(&self) -> Option<&Atom> {
    if let Syntax::Atom(a) = self { Some(a) } else { None }
  }

  /// The source position of this tree: its own span if it has one, else the
  /// first positioned descendant in source order.
  #[must_use]
  pub fn get_pos(&self) -> Option<Span> {
    match self {
      Syntax::Missing => None,
      Syntax::Atom(a) => a.span,
      Syntax::Ident(i) => i.span,
      Syntax::Node(n) => n.span.or_else(|| n.args.iter().find_map(Syntax::get_pos)),
    }
  }
}

impl fmt::Display for Syntax {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Syntax::Missing => write!(f, "<missing>"),
      Syntax::Atom(a) => write!(f, "{}", a.val),
      Syntax::Ident(i) => write!(f, "{}", i.name),
      Syntax::Node(n) => {
        write!(f, "({}", n.kind)?;
        for arg in &n.args {
          write!(f, " {arg}")?
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
  fn get_pos_finds_first_positioned_child() {
    let stx = Syntax::node(BuiltinKind::App, vec![
      Syntax::ident("f"),
      Syntax::ident("x").with_span(3..4),
      Syntax::ident("y").with_span(5..6),
    ]);
    assert_eq!(stx.get_pos(), Some(Span { start: 3, end: 4 }));
    assert_eq!(Syntax::Missing.get_pos(), None);
    let positioned = Syntax::node_at(BuiltinKind::App, 0..6, vec![]);
    assert_eq!(positioned.get_pos(), Some(Span { start: 0, end: 6 }));
  }

  #[test]
  fn notation_kind_names() {
    assert_eq!(NotationId(3).name().to_string(), "_notation.3");
    assert_eq!(SyntaxKind::from(NotationId(3)).to_string(), "_notation.3");
    assert_eq!(SyntaxKind::from(BuiltinKind::Check).to_string(), "command.#check");
  }
}
