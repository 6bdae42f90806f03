//! Scope state and identifier resolution.
//!
//! The elaborator's resolution context is a stack of [`ScopeFrame`]s, one
//! per open `namespace`/`section` plus a root frame that is never popped.
//! Each frame records what that scope contributed: `open` declarations,
//! names declared while the scope was current, universe parameters, section
//! variables, and the parser-config snapshot to restore when the scope
//! closes. Everything a frame holds is persistent or cheaply cloned, so
//! pushing and popping scopes is inexpensive.
//!
//! [`ScopeState::resolve`] maps an identifier as written to the candidate
//! fully-qualified names it could denote, in disambiguation priority order.
//! [`ScopeState::preresolve`] runs it over every identifier leaf of a
//! syntax tree, as a pre-pass before `to_pexpr`.

use crate::env::{Environment, OpenDecl};
use crate::syntax::Syntax;
use crate::util::RcExt;
use crate::{BinderInfo, Name, ParserConfig, RbMap, RbSet, Span};
use itertools::Itertools;
use std::rc::Rc;

static ROOT: once_cell::sync::Lazy<Name> =
  once_cell::sync::Lazy::new(|| Name::simple("_root_"));

/// Strips a leading `_root_` namespace escape, if present.
#[must_use]
pub fn root_name(name: &Name) -> Name {
  name.replace_prefix(&ROOT, &Name::anon()).unwrap_or_else(|| name.clone())
}

/// What kind of scope a frame represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
  /// The root frame, present for the whole run.
  Root,
  /// A `namespace N` frame.
  Namespace,
  /// A `section [N]` frame.
  Section,
}

impl ScopeKind {
  /// The keyword for diagnostics.
  #[must_use]
  pub fn descr(self) -> &'static str {
    match self {
      ScopeKind::Root => "module",
      ScopeKind::Namespace => "namespace",
      ScopeKind::Section => "section",
    }
  }
}

/// One variable from a `variables` command, stored unelaborated. The type
/// is re-elaborated per declaration so it can mention variables and
/// universes that were not yet in scope when it was written down.
#[derive(Clone, Debug)]
pub struct VarDecl {
  /// Where the binder was declared.
  pub pos: Option<Span>,
  /// The variable name.
  pub name: Name,
  /// The binder annotation it was declared with.
  pub info: BinderInfo,
  /// The type syntax, a synthesized hole if none was written.
  pub ty: Syntax,
}

/// One entry of the scope stack.
#[derive(Clone, Debug)]
pub struct ScopeFrame {
  /// Namespace, section, or the root.
  pub kind: ScopeKind,
  /// The name a matching `end` must carry: the path a `namespace` appended,
  /// or the optional label of a named `section`.
  pub label: Option<Name>,
  /// The full current namespace while this frame is innermost.
  pub ns: Name,
  /// `open` declarations made in this scope, in declaration order.
  pub opens: Vec<OpenDecl>,
  /// Names declared while this scope was current: the name as written
  /// mapped to its fully qualified (and possibly mangled) form.
  pub declared: RbMap<Name, Name>,
  /// Universe parameters declared in this scope, with their declaration
  /// sites for redeclaration diagnostics.
  pub univs: Vec<(Name, Option<Span>)>,
  /// Section variables, in declaration order.
  pub vars: Vec<VarDecl>,
  /// Variables marked by `include`, threaded into every declaration.
  pub includes: RbSet<Name>,
  /// The parser configuration at scope entry, restored on `end` so
  /// notation declared inside the scope does not leak out.
  pub config: ParserConfig,
}

impl ScopeFrame {
  fn new(kind: ScopeKind, label: Option<Name>, ns: Name, config: ParserConfig) -> Self {
    ScopeFrame {
      kind,
      label,
      ns,
      opens: vec![],
      declared: RbMap::new(),
      univs: vec![],
      vars: vec![],
      includes: RbSet::new(),
      config,
    }
  }
}

/// The scope stack. See the [module docs](self).
#[derive(Clone, Debug)]
pub struct ScopeState {
  frames: Vec<ScopeFrame>,
}

impl Default for ScopeState {
  fn default() -> Self {
    ScopeState {
      frames: vec![ScopeFrame::new(ScopeKind::Root, None, Name::anon(), ParserConfig::new())],
    }
  }
}

impl ScopeState {
  /// A fresh state containing only the root frame.
  #[must_use]
  pub fn new() -> Self { Self::default() }

  fn current(&self) -> &ScopeFrame {
    self.frames.last().expect("the scope stack always has a root frame")
  }

  fn current_mut(&mut self) -> &mut ScopeFrame {
    self.frames.last_mut().expect("the scope stack always has a root frame")
  }

  /// The current namespace.
  #[must_use]
  pub fn ns(&self) -> &Name { &self.current().ns }

  /// How many scopes are open, not counting the root.
  #[must_use]
  pub fn depth(&self) -> usize { self.frames.len() - 1 }

  /// Opens `namespace name`, snapshotting the given parser configuration.
  pub fn push_namespace(&mut self, name: Name, config: ParserConfig) {
    let ns = self.ns().append(&name);
    self.frames.push(ScopeFrame::new(ScopeKind::Namespace, Some(name), ns, config))
  }

  /// Opens `section [label]`, snapshotting the given parser configuration.
  pub fn push_section(&mut self, label: Option<Name>, config: ParserConfig) {
    let ns = self.ns().clone();
    self.frames.push(ScopeFrame::new(ScopeKind::Section, label, ns, config))
  }

  /// Closes the innermost scope and returns its frame, so the caller can
  /// match the `end` label and restore the parser configuration. Names
  /// declared inside the scope are merged into the parent's declared map,
  /// requalified relative to the parent namespace: after `namespace B ...
  /// end` declares `f`, the parent can still refer to it as `B.f`.
  pub fn pop(&mut self) -> ScopeFrame {
    assert!(self.frames.len() > 1, "cannot pop the root scope");
    let frame = self.frames.pop().expect("the scope stack always has a root frame");
    let parent = self.current_mut();
    let rel =
      frame.ns.replace_prefix(&parent.ns, &Name::anon()).unwrap_or_else(Name::anon);
    for (short, full) in frame.declared.iter() {
      parent.declared = parent.declared.insert(rel.append(short), full.clone())
    }
    frame
  }

  /// Records an `open` declaration in the current scope.
  pub fn record_open(&mut self, open: OpenDecl) { self.current_mut().opens.push(open) }

  /// Records a declaration made in the current scope.
  pub fn declare(&mut self, short: Name, full: Name) {
    let frame = self.current_mut();
    frame.declared = frame.declared.insert(short, full)
  }

  /// Registers a universe parameter in the current scope.
  pub fn add_univ(&mut self, name: Name, pos: Option<Span>) {
    self.current_mut().univs.push((name, pos))
  }

  /// The declaration site of a universe declared in the current scope.
  /// Outer scopes are not consulted; redeclaring an outer universe in a
  /// nested scope is allowed and shadows it.
  #[must_use]
  pub fn univ_declared_here(&self, name: &Name) -> Option<&Option<Span>> {
    self.current().univs.iter().find(|(n, _)| n == name).map(|(_, pos)| pos)
  }

  /// Is this universe name visible in any enclosing scope?
  #[must_use]
  pub fn univ_in_scope(&self, name: &Name) -> bool {
    self.frames.iter().any(|f| f.univs.iter().any(|(n, _)| n == name))
  }

  /// All visible universe parameters, outermost scope first, in
  /// declaration order within each scope.
  pub fn univs_in_scope(&self) -> impl Iterator<Item = &Name> {
    self.frames.iter().flat_map(|f| f.univs.iter().map(|(n, _)| n))
  }

  /// Records a section variable in the current scope, replacing a previous
  /// declaration of the same name in this scope.
  pub fn add_var(&mut self, var: VarDecl) {
    let frame = self.current_mut();
    if let Some(slot) = frame.vars.iter_mut().find(|v| v.name == var.name) {
      *slot = var
    } else {
      frame.vars.push(var)
    }
  }

  /// Looks up a visible variable by name, innermost scope first.
  #[must_use]
  pub fn find_var(&self, name: &Name) -> Option<&VarDecl> {
    self.frames.iter().rev().find_map(|f| f.vars.iter().find(|v| v.name == *name))
  }

  /// All visible variables in declaration order, outermost scope first. A
  /// redeclaration in an inner scope replaces the outer variable at its
  /// original position.
  #[must_use]
  pub fn vars_in_scope(&self) -> Vec<&VarDecl> {
    let mut out: Vec<&VarDecl> = vec![];
    for frame in &self.frames {
      for v in &frame.vars {
        if let Some(slot) = out.iter_mut().find(|o| o.name == v.name) {
          *slot = v
        } else {
          out.push(v)
        }
      }
    }
    out
  }

  /// Marks a variable as included in every subsequent declaration.
  pub fn include_var(&mut self, name: Name) {
    let frame = self.current_mut();
    frame.includes = frame.includes.insert(name)
  }

  /// Was this variable name marked by `include` in any enclosing scope?
  #[must_use]
  pub fn is_included(&self, name: &Name) -> bool {
    self.frames.iter().any(|f| f.includes.contains(name))
  }

  /// The candidate fully-qualified names `name` could denote, in
  /// disambiguation priority order:
  ///
  /// 1. A name declared in an enclosing scope resolves to its recorded
  ///    qualified form immediately, innermost scope first. This is the only
  ///    rule that sees not-yet-compiled declarations, and it also resolves
  ///    private names to their mangled form.
  /// 2. The name itself (after stripping a leading `_root_`) if it exists
  ///    in the environment; this candidate has highest priority.
  /// 3. `ns.name` for each plain `open ns`, in declaration order across
  ///    all scopes, subject to the open's `only`/`hiding` filters.
  /// 4. For each `open ns as X` whose prefix `X` matches the name,
  ///    `ns.rest` where `rest` is the name with `X` stripped.
  ///
  /// An empty result is not an error here: the caller embeds the name
  /// unresolved and leaves the diagnostic to the downstream elaborator.
  #[must_use]
  pub fn resolve(&self, env: &Environment, name: &Name) -> Vec<Name> {
    for frame in self.frames.iter().rev() {
      if let Some(full) = frame.declared.get(name) {
        return vec![full.clone()]
      }
    }
    let mut out = vec![];
    let root = root_name(name);
    if env.contains(&root) {
      out.push(root)
    }
    for frame in &self.frames {
      for open in &frame.opens {
        if open.as_prefix.is_some() || !open_allows(open, name) {
          continue
        }
        let cand = open.ns.append(name);
        if env.contains(&cand) {
          out.push(cand)
        }
      }
    }
    for frame in &self.frames {
      for open in &frame.opens {
        let Some(prefix) = &open.as_prefix else { continue };
        let Some(rel) = name.replace_prefix(prefix, &Name::anon()) else { continue };
        if rel.is_anon() || !open_allows(open, &rel) {
          continue
        }
        let cand = open.ns.append(&rel);
        if env.contains(&cand) {
          out.push(cand)
        }
      }
    }
    out.into_iter().unique().collect()
  }

  /// Attaches resolution candidates to every identifier leaf of `stx`,
  /// returning the annotated tree. Binding occurrences are annotated too;
  /// `to_pexpr` ignores the annotation wherever a local is in scope.
  #[must_use]
  pub fn preresolve(&self, env: &Environment, stx: &Syntax) -> Syntax {
    match stx {
      Syntax::Missing | Syntax::Atom(_) => stx.clone(),
      Syntax::Ident(i) => {
        let mut i = (**i).clone();
        i.preresolved = self.resolve(env, &i.name);
        Syntax::Ident(Box::new(i))
      }
      Syntax::Node(n) => {
        let mut node = RcExt::unwrap(n.clone());
        let args = node.args.iter().map(|a| self.preresolve(env, a)).collect();
        node.args = args;
        Syntax::Node(Rc::new(node))
      }
    }
  }
}

fn open_allows(open: &OpenDecl, rel: &Name) -> bool {
  if let Some(only) = &open.only {
    if !only.contains(rel) {
      return false
    }
  }
  !open.hiding.contains(rel)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn env_with(names: &[&str]) -> Environment {
    let mut env = Environment::new();
    for &n in names {
      env.declare(n.into());
    }
    env
  }

  #[test]
  fn open_declaration_order_sets_priority() {
    let env = env_with(&["A.x", "B.x"]);
    let mut st = ScopeState::new();
    st.record_open(OpenDecl::plain("A".into()));
    st.record_open(OpenDecl::plain("B".into()));
    let cands = st.resolve(&env, &"x".into());
    assert_eq!(cands, vec![Name::from("A.x"), Name::from("B.x")]);

    let mut st = ScopeState::new();
    st.record_open(OpenDecl::plain("B".into()));
    st.record_open(OpenDecl::plain("A".into()));
    let cands = st.resolve(&env, &"x".into());
    assert_eq!(cands, vec![Name::from("B.x"), Name::from("A.x")]);
  }

  #[test]
  fn direct_match_outranks_opens() {
    let env = env_with(&["x", "A.x"]);
    let mut st = ScopeState::new();
    st.record_open(OpenDecl::plain("A".into()));
    let cands = st.resolve(&env, &"x".into());
    assert_eq!(cands, vec![Name::from("x"), Name::from("A.x")]);
  }

  #[test]
  fn root_escape_bypasses_opens() {
    let env = env_with(&["foo", "A.foo"]);
    let mut st = ScopeState::new();
    st.record_open(OpenDecl::plain("A".into()));
    let cands = st.resolve(&env, &"_root_.foo".into());
    assert_eq!(cands, vec![Name::from("foo")]);
    // an unknown root escape resolves to nothing rather than falling back
    assert!(st.resolve(&env, &"_root_.bar".into()).is_empty());
  }

  #[test]
  fn declared_names_resolve_before_compilation() {
    let env = env_with(&["A.f"]);
    let mut st = ScopeState::new();
    st.push_namespace("foo".into(), ParserConfig::new());
    st.declare("f".into(), "foo.f".into());
    st.record_open(OpenDecl::plain("A".into()));
    // the scope's own declaration wins over the open, even though the
    // environment only knows A.f
    assert_eq!(st.resolve(&env, &"f".into()), vec![Name::from("foo.f")]);
  }

  #[test]
  fn pop_requalifies_declared_names() {
    let mut st = ScopeState::new();
    st.push_namespace("A".into(), ParserConfig::new());
    st.push_namespace("B".into(), ParserConfig::new());
    st.declare("f".into(), "A.B.f".into());
    st.pop();
    let env = env_with(&[]);
    assert_eq!(st.resolve(&env, &"B.f".into()), vec![Name::from("A.B.f")]);
    st.pop();
    assert_eq!(st.resolve(&env, &"A.B.f".into()), vec![Name::from("A.B.f")]);
    assert_eq!(st.ns(), &Name::anon());
  }

  #[test]
  fn open_as_rename() {
    let env = env_with(&["very.long.ns.thing"]);
    let mut st = ScopeState::new();
    st.record_open(OpenDecl {
      ns: "very.long.ns".into(),
      as_prefix: Some("vl".into()),
      only: None,
      hiding: vec![],
    });
    assert_eq!(st.resolve(&env, &"vl.thing".into()), vec![Name::from("very.long.ns.thing")]);
    // the rename prefix is required
    assert!(st.resolve(&env, &"thing".into()).is_empty());
    // and the bare prefix names nothing
    assert!(st.resolve(&env, &"vl".into()).is_empty());
  }

  #[test]
  fn only_and_hiding_filters() {
    let env = env_with(&["A.x", "A.y", "A.z"]);
    let mut st = ScopeState::new();
    st.record_open(OpenDecl {
      ns: "A".into(),
      as_prefix: None,
      only: Some(vec!["x".into(), "y".into()]),
      hiding: vec!["y".into()],
    });
    assert_eq!(st.resolve(&env, &"x".into()), vec![Name::from("A.x")]);
    assert!(st.resolve(&env, &"y".into()).is_empty());
    assert!(st.resolve(&env, &"z".into()).is_empty());
  }

  #[test]
  fn preresolve_annotates_ident_leaves() {
    use crate::syntax::BuiltinKind;
    let env = env_with(&["A.x"]);
    let mut st = ScopeState::new();
    st.record_open(OpenDecl::plain("A".into()));
    let stx = Syntax::node(BuiltinKind::App, vec![Syntax::ident("x"), Syntax::ident("zzz")]);
    let stx = st.preresolve(&env, &stx);
    let node = stx.as_node().unwrap();
    let x = node.args[0].as_ident().unwrap();
    assert_eq!(x.preresolved, vec![Name::from("A.x")]);
    let zzz = node.args[1].as_ident().unwrap();
    assert!(zzz.preresolved.is_empty());
  }

  #[test]
  fn variable_shadowing_keeps_first_position() {
    let mut st = ScopeState::new();
    let decl = |name: &str, info| VarDecl {
      pos: None,
      name: name.into(),
      info,
      ty: Syntax::Missing,
    };
    st.add_var(decl("a", BinderInfo::Default));
    st.add_var(decl("b", BinderInfo::Default));
    st.push_section(None, ParserConfig::new());
    st.add_var(decl("a", BinderInfo::Implicit));
    let vars = st.vars_in_scope();
    let names: Vec<_> = vars.iter().map(|v| v.name.to_string()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(vars[0].info, BinderInfo::Implicit);
    assert_eq!(st.find_var(&"a".into()).unwrap().info, BinderInfo::Implicit);
    st.pop();
    assert_eq!(st.find_var(&"a".into()).unwrap().info, BinderInfo::Default);
  }
}
