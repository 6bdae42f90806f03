//! The environment boundary: declared names, emitted core commands, and
//! the options table.
//!
//! The elaborator's output side. Name resolution asks exactly one question
//! of the environment, [`contains`](Environment::contains); everything the
//! pipeline produces is appended to an ordered [`CoreCommand`] list that a
//! downstream type-directed elaborator consumes in source order. Commands
//! that the pre-expression pipeline fully supports (`def` and friends)
//! and those it lowers to simpler forms (`constant`/`inductive`/
//! `structure`) land in the same list, interleaved as written.

use crate::{Expr, Name, RbMap};
use bitflags::bitflags;
use std::collections::HashSet;

bitflags! {
  /// Visibility and compilation modifiers on a declaration.
  #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
  pub struct Modifiers: u8 {
    /// A `private` declaration, mangled to be inaccessible outside the file.
    const PRIVATE = 1;
    /// A `protected` declaration, not found by plain `open`.
    const PROTECTED = 2;
    /// A `meta` (unchecked, compiler-internal) declaration.
    const META = 4;
    /// A `noncomputable` declaration, exempt from code generation.
    const NONCOMPUTABLE = 8;
  }
}

impl Modifiers {
  /// Parses one modifier keyword.
  #[must_use]
  pub fn from_keyword(s: &[u8]) -> Option<Modifiers> {
    match s {
      b"private" => Some(Modifiers::PRIVATE),
      b"protected" => Some(Modifiers::PROTECTED),
      b"meta" => Some(Modifiers::META),
      b"noncomputable" => Some(Modifiers::NONCOMPUTABLE),
      _ => None,
    }
  }
}

/// Which flavor of definition-like declaration a [`CoreCommand::Defs`] is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefKind {
  /// `def`.
  Def,
  /// `theorem`.
  Theorem,
  /// `example` (elaborated, never added to the environment).
  Example,
  /// `abbreviation` (a reducible definition).
  Abbreviation,
}

/// A fully elaborated definition-like declaration.
#[derive(Clone, Debug)]
pub struct DefsCommand {
  /// Which declaration keyword introduced this.
  pub kind: DefKind,
  /// Declaration modifiers.
  pub modifiers: Modifiers,
  /// The doc string, if any.
  pub doc: Option<String>,
  /// The fully qualified (and, for `private`, mangled) name.
  pub name: Name,
  /// The universe parameters in scope, outermost first.
  pub univ_params: Vec<Name>,
  /// The declared result type, if written.
  pub ty: Option<Expr>,
  /// The value, as a pre-expression with the binder telescope in front.
  pub value: Expr,
}

/// One elaborated top-level command, in the order the source declared it.
#[derive(Clone, Debug)]
pub enum CoreCommand {
  /// A `def`/`theorem`/`example`/`abbreviation` through the new pipeline.
  Defs(DefsCommand),
  /// A `constant`, lowered to its type telescope.
  Constant {
    /// Declaration modifiers.
    modifiers: Modifiers,
    /// The fully qualified name.
    name: Name,
    /// The universe parameters in scope.
    univ_params: Vec<Name>,
    /// The declared type.
    ty: Expr,
  },
  /// An `inductive`, or a `structure` lowered to its single-constructor
  /// equivalent.
  Inductive {
    /// Declaration modifiers.
    modifiers: Modifiers,
    /// The fully qualified name.
    name: Name,
    /// The universe parameters in scope.
    univ_params: Vec<Name>,
    /// The declared type of the inductive family.
    ty: Expr,
    /// The introduction rules, as (name, type) pairs.
    intro_rules: Vec<(Name, Expr)>,
  },
  /// An `attribute` command applied to resolved targets.
  Attribute {
    /// A `local attribute`, scoped to the current file/section.
    local: bool,
    /// The attribute names.
    attrs: Vec<Name>,
    /// The resolved targets.
    targets: Vec<Name>,
  },
  /// A `#check`, or a bare top-level term; diagnostic only.
  Check(Expr),
  /// `init_quot`, initializing the quotient machinery.
  InitQuot,
}

/// One `open`/`export` clause: `open ns [as prefix] [(only ...)] [(hiding ...)]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenDecl {
  /// The namespace being opened.
  pub ns: Name,
  /// The rename prefix of an `open ... as X`.
  pub as_prefix: Option<Name>,
  /// If present, only these (relative) names are brought into scope.
  pub only: Option<Vec<Name>>,
  /// These (relative) names are excluded.
  pub hiding: Vec<Name>,
}

impl OpenDecl {
  /// A plain `open ns` with no rename or filter.
  #[must_use]
  pub fn plain(ns: Name) -> OpenDecl {
    OpenDecl { ns, as_prefix: None, only: None, hiding: vec![] }
  }
}

/// One recorded `export` command, for consumers of the final environment.
#[derive(Clone, Debug)]
pub struct ExportDecl {
  /// The namespace the export was declared in.
  pub in_ns: Name,
  /// What is being re-exported.
  pub spec: OpenDecl,
}

/// The value of one option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
  /// A boolean option.
  Bool(bool),
  /// A numeric option.
  Nat(u64),
  /// A string option.
  Str(String),
}

impl OptionValue {
  /// The kind of this value, for `set_option` reparse decisions.
  #[must_use]
  pub fn kind_name(&self) -> &'static str {
    match self {
      OptionValue::Bool(_) => "bool",
      OptionValue::Nat(_) => "nat",
      OptionValue::Str(_) => "string",
    }
  }
}

/// The options table. `set_option` consults the current value of an option
/// to decide how to interpret the new one, so every settable option has a
/// default here.
#[derive(Clone, Debug)]
pub struct Options(RbMap<Name, OptionValue>);

/// The bound on commands per run.
pub const MAX_COMMANDS: u64 = 10000;
/// The bound on nested scope depth.
pub const MAX_RECURSION: u64 = 100;

static MAX_COMMANDS_OPT: once_cell::sync::Lazy<Name> =
  once_cell::sync::Lazy::new(|| Name::simple("max_commands"));
static MAX_RECURSION_OPT: once_cell::sync::Lazy<Name> =
  once_cell::sync::Lazy::new(|| Name::simple("max_recursion"));

impl Default for Options {
  fn default() -> Self {
    Options(
      [
        (MAX_COMMANDS_OPT.clone(), OptionValue::Nat(MAX_COMMANDS)),
        (MAX_RECURSION_OPT.clone(), OptionValue::Nat(MAX_RECURSION)),
      ]
      .into_iter()
      .collect(),
    )
  }
}

impl Options {
  /// The option controlling command fuel.
  #[must_use]
  pub fn max_commands_name() -> Name { MAX_COMMANDS_OPT.clone() }

  /// The option controlling scope nesting depth.
  #[must_use]
  pub fn max_recursion_name() -> Name { MAX_RECURSION_OPT.clone() }

  /// Looks up an option.
  #[must_use]
  pub fn get(&self, name: &Name) -> Option<&OptionValue> { self.0.get(name) }

  /// Looks up a numeric option.
  #[must_use]
  pub fn get_nat(&self, name: &Name) -> Option<u64> {
    if let Some(OptionValue::Nat(n)) = self.0.get(name) { Some(*n) } else { None }
  }

  /// Sets an option. The `set_option` command validates the value kind
  /// before calling this; the table itself accepts any replacement.
  pub fn set(&mut self, name: Name, value: OptionValue) {
    self.0 = self.0.insert(name, value)
  }

  /// The command fuel bound.
  #[must_use]
  pub fn max_commands(&self) -> u64 {
    self.get_nat(&MAX_COMMANDS_OPT).unwrap_or(MAX_COMMANDS)
  }

  /// The scope depth bound.
  #[must_use]
  pub fn max_recursion(&self) -> u64 {
    self.get_nat(&MAX_RECURSION_OPT).unwrap_or(MAX_RECURSION)
  }
}

/// The environment: the set of declared names plus the elaborated output.
///
/// Declarations are visible to name resolution as soon as their command is
/// elaborated, including to commands nested in scopes opened afterwards;
/// scope pops never remove them.
#[derive(Debug, Default)]
pub struct Environment {
  declared: HashSet<Name>,
  commands: Vec<CoreCommand>,
  exports: Vec<ExportDecl>,
}

impl Environment {
  /// An empty environment.
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Is this fully qualified name declared?
  #[must_use]
  pub fn contains(&self, name: &Name) -> bool { self.declared.contains(name) }

  /// Registers a declared name, returning false if it was already present.
  pub fn declare(&mut self, name: Name) -> bool { self.declared.insert(name) }

  /// Appends an elaborated command to the output.
  pub fn push_command(&mut self, c: CoreCommand) { self.commands.push(c) }

  /// Records an `export`.
  pub fn push_export(&mut self, e: ExportDecl) { self.exports.push(e) }

  /// The elaborated commands, in source order.
  #[must_use]
  pub fn commands(&self) -> &[CoreCommand] { &self.commands }

  /// The recorded exports, in source order.
  #[must_use]
  pub fn exports(&self) -> &[ExportDecl] { &self.exports }
}
